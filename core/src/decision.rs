//! Decision heuristics.

pub mod vsids;

use partial_ref::{partial, PartialRef};

use smtbool_formula::{Lit, Var};

use crate::context::{AssignmentP, Context, ImplGraphP, TheoryP, TrailP, VsidsP};
use crate::prop::{enqueue_assignment, Reason};

/// Make a decision and enqueue it.
///
/// Picks the unassigned variable with the highest VSIDS activity and assigns it to false.
///
/// Returns `false` if no decision was made because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut TheoryP,
        mut TrailP,
        mut VsidsP,
    ),
) -> bool {
    loop {
        let decision_var = match ctx.part_mut(VsidsP).next() {
            Some(var) => var,
            None => return false,
        };

        if ctx.part(AssignmentP).var_value(decision_var).is_some() {
            // Stale heap entries are possible right after a restore; skip already assigned vars
            // instead of re-deciding them.
            continue;
        }

        let decision = Lit::from_var(decision_var, false);

        ctx.part_mut(TrailP).new_decision_level();
        if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
            theory.increase_decision_level();
        }

        enqueue_assignment(ctx.borrow(), decision, Reason::Unit);

        return true;
    }
}

/// Make a variable available for future decisions.
///
/// Called whenever a variable becomes unassigned, whether by backtracking or by a restart.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}

/// Register a newly created variable with the decision heuristic.
///
/// `available` is false for a variable that is already known to have a fixed value (e.g. a
/// restored unit) and thus should not be considered for decisions yet.
pub fn initialize_var(mut ctx: partial!(Context, mut VsidsP), var: Var, available: bool) {
    if available {
        ctx.part_mut(VsidsP).make_available(var);
    }
}

/// Permanently forget a variable, e.g. when it is deleted on checkpoint rollback.
pub fn remove_var(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).remove(var);
}
