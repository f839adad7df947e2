//! Miscellaneous solver state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation flag, checked only at the top of the main search loop.
///
/// Cloning gives another handle to the same underlying flag, so a request can be made from
/// outside an in-progress `solve` call.
#[derive(Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Request that the current or next search stop as soon as it next checks for cancellation.
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a cancellation has been requested.
    pub fn requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a pending cancellation request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Result of the last completed search, if any.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
    UnsatUnderAssumptions,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Top-level solver status.
///
/// Distinct from [`SatState`]: this tracks what operations are currently legal, not just the
/// last result. `Searching` is a transient state the cooperative search loop passes through;
/// a cancellation observed while `Searching` moves to `Interrupted` rather than being treated as
/// an error, and only `pop`/`reset` are legal once `Unsat` has been reached permanently (i.e. at
/// the base decision level).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Status {
    Idle,
    Searching,
    Sat,
    Unknown,
    Unsat,
    Interrupted,
}

impl Default for Status {
    fn default() -> Status {
        Status::Idle
    }
}

impl Status {
    /// Whether the status forbids any further assertion or search until `pop`/`reset`.
    pub fn is_permanently_unsat(&self) -> bool {
        *self == Status::Unsat
    }
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub sat_state: SatState,
    pub status: Status,
    /// Set when a cooperative cancellation has been observed. Checked only at the top of the
    /// main search loop and while the status is `Searching`.
    pub cancelled: bool,
    /// Handle through which a cancellation can be requested; cloned out via
    /// [`crate::solver::Solver::interrupt_handle`].
    pub interrupt: Interrupt,
    /// Whether the status was permanently `Unsat` immediately before the current search's
    /// implicit push, so a clean-interrupt cleanup can tell `clear` and `clear_unsat` apart.
    pub pre_search_was_unsat: bool,
}
