//! Unit propagation.
//!
//! Drives the trail queue, dispatching each newly assigned literal to binary-clause and
//! watched-literal propagation in turn until the queue is empty or a conflict is found.

pub mod assignment;
pub mod binary;
pub mod graph;
pub mod long;
pub mod watch;

pub use assignment::{backtrack, enqueue_assignment, full_restart, restart, Assignment, Trail};
pub use binary::propagate_binary;
pub use graph::{Conflict, ImplGraph, ImplNode, Reason};
pub use long::propagate_long;
pub use watch::{Watch, Watchlists};

use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, Context, ImplGraphP, TrailP, WatchlistsP,
};

/// Propagate all queued assignments until the queue is empty or a conflict is found.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseAllocP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchlistsP,
        BinaryClausesP,
    ),
) -> Result<(), Conflict> {
    loop {
        let lit = match ctx.part_mut(TrailP).pop_queue() {
            Some(lit) => lit,
            None => return Ok(()),
        };

        propagate_binary(ctx.borrow(), lit)?;
        propagate_long(ctx.borrow(), lit)?;
    }
}
