//! Incremental push/pop on top of the Boolean core.
//!
//! A push freezes the current base level, opens its own decision level and returns to it; a pop
//! discards everything asserted since the matching push and returns to the frozen state. This
//! mirrors the `smt_push`/`smt_pop` pair of the system this crate's incremental layer was modeled
//! on: pop backtracks to the decision level recorded at push time, lets the theory undo its own
//! state first, then truncates the variable range back to what it was at push time.

use partial_ref::{partial, PartialRef};

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, PushPopP,
    SolverStateP, TheoryP, TrailP, VariablesP, VsidsP, WatchlistsP,
};
use crate::prop::backtrack;
use crate::state::{SatState, Status};

/// A frozen base-level snapshot, pushed by [`push`] and consumed by [`pop`].
struct Checkpoint {
    /// Decision level active when this checkpoint was taken, i.e. the level [`pop`] must
    /// backtrack to in order to undo everything this push's scope assigned.
    level: usize,
    /// Number of variables that existed when this checkpoint was taken.
    var_count: usize,
    /// Number of long clauses that existed when this checkpoint was taken.
    clause_mark: usize,
    /// Position in the binary clause insertion log when this checkpoint was taken.
    binary_mark: usize,
}

/// Stack of open checkpoints.
#[derive(Default)]
pub struct PushPop {
    checkpoints: Vec<Checkpoint>,
}

impl PushPop {
    /// Current push/pop depth, i.e. number of open checkpoints.
    pub fn depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Decision level at the top of the currently open push/pop stack.
    ///
    /// Everything above this level is search state (decisions, assumption levels) that a full
    /// restart may freely discard; everything at or below it belongs to an open `push` and must
    /// survive one. Zero when no `push` is currently open.
    pub fn floor_level(&self) -> usize {
        self.checkpoints.last().map_or(0, |c| c.level + 1)
    }
}

/// Open a new assertion level.
///
/// Everything loaded after this call can be discarded again with a matching [`pop`]. Opens its
/// own decision level, so a `push` nested under decisions made by an in-progress search (as
/// `start_search`'s implicit push is) unwinds exactly those decisions and nothing from an
/// enclosing push.
pub fn push(
    mut ctx: partial!(
        Context,
        mut PushPopP,
        mut TheoryP,
        mut TrailP,
        BinaryClausesP,
        ClauseDbP,
        VariablesP,
    ),
) {
    let level = ctx.part(TrailP).current_level();
    let var_count = ctx.part(VariablesP).var_count();
    let clause_mark = ctx.part(ClauseDbP).clauses_len();
    let binary_mark = ctx.part(BinaryClausesP).log_mark();

    ctx.part_mut(PushPopP).checkpoints.push(Checkpoint {
        level,
        var_count,
        clause_mark,
        binary_mark,
    });

    ctx.part_mut(TrailP).new_decision_level();

    if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
        theory.push();
    }
}

/// Close the most recent open assertion level, undoing everything asserted since the matching
/// [`push`].
///
/// Returns `false` if there is no open checkpoint to pop.
pub fn pop(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut PushPopP,
        mut ImplGraphP,
        mut TheoryP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
    ),
) -> bool {
    let checkpoint = match ctx.part_mut(PushPopP).checkpoints.pop() {
        Some(checkpoint) => checkpoint,
        None => return false,
    };

    backtrack(ctx.borrow(), checkpoint.level);

    if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
        theory.pop();
    }

    let (clause_db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let watchlists = ctx.part_mut(WatchlistsP);
    clause_db.truncate_clauses(alloc, watchlists, checkpoint.clause_mark);

    ctx.part_mut(BinaryClausesP)
        .truncate_log(checkpoint.binary_mark);

    ctx.part_mut(VsidsP).truncate_var_count(checkpoint.var_count);
    ctx.part_mut(VariablesP)
        .truncate_var_count(checkpoint.var_count);
    ctx.part_mut(WatchlistsP)
        .truncate_var_count(checkpoint.var_count);

    true
}

/// Begin a new search, opening an implicit push so that a clean interrupt can simply pop back to
/// this point.
pub fn start_search(
    mut ctx: partial!(
        Context,
        mut PushPopP,
        mut SolverStateP,
        mut TheoryP,
        BinaryClausesP,
        ClauseDbP,
        VariablesP,
    ),
) {
    let was_unsat = ctx.part(SolverStateP).status.is_permanently_unsat();
    ctx.part_mut(SolverStateP).pre_search_was_unsat = was_unsat;

    push(ctx.borrow());

    if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
        theory.start_search();
    }

    ctx.part_mut(SolverStateP).status = Status::Searching;
}

/// Clean up after a search was cooperatively cancelled mid-way, popping back to the state
/// `start_search`'s implicit push captured.
///
/// Restores `Unsat` if the status was permanently `Unsat` before the search began, else returns to
/// `Idle`.
pub fn cleanup_after_interrupt(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut PushPopP,
        mut SolverStateP,
        mut TheoryP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    if ctx.part(SolverStateP).pre_search_was_unsat {
        clear_unsat(ctx.borrow());
    } else {
        clear(ctx.borrow());
    }
}

/// Clear the current assignment and return to the `Idle` status, discarding anything asserted
/// since the implicit push that `start_search` is expected to perform.
///
/// Used for clean-interrupt cleanup when the last completed search was `Sat` or still `Unknown`.
pub fn clear(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut PushPopP,
        mut SolverStateP,
        mut TheoryP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    pop(ctx.borrow());

    let state = ctx.part_mut(SolverStateP);
    state.sat_state = SatState::Unknown;
    state.status = Status::Idle;
    state.cancelled = false;
}

/// Like [`clear`], but for the case where the last completed search was `Unsat`: the `Unsat`
/// status is restored afterward instead of moving to `Idle`, since an unsatisfiable formula stays
/// unsatisfiable across a clean-interrupt cleanup that only discards the implicit push's content.
pub fn clear_unsat(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut PushPopP,
        mut SolverStateP,
        mut TheoryP,
        mut TrailP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
    ),
) {
    pop(ctx.borrow());

    let state = ctx.part_mut(SolverStateP);
    state.sat_state = SatState::Unsat;
    state.status = Status::Unsat;
    state.cancelled = false;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use crate::clause::Tier;
    use crate::context::{set_var_count, ClauseDbP};
    use crate::load::load_clause;

    #[test]
    fn pop_discards_clauses_and_variables_added_since_push() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);
        load_clause(ctx.borrow(), &lits![1, 2]);

        push(ctx.borrow());

        set_var_count(ctx.borrow(), 5);
        load_clause(ctx.borrow(), &lits![3, 4, 5]);

        assert_eq!(ctx.part(VariablesP).var_count(), 5);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);

        assert!(pop(ctx.borrow()));

        assert_eq!(ctx.part(VariablesP).var_count(), 2);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(BinaryClausesP).count(), 1);
    }

    #[test]
    fn pop_without_a_push_returns_false() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);

        assert!(!pop(ctx.borrow()));
    }

    #[test]
    fn pop_undoes_a_literal_asserted_as_a_unit_clause_inside_the_scope() {
        use smtbool_formula::Var;

        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);
        let x1 = Var::from_index(0);

        push(ctx.borrow());
        load_clause(ctx.borrow(), &lits![1]);
        assert_eq!(ctx.part(AssignmentP).var_value(x1), Some(true));

        push(ctx.borrow());
        load_clause(ctx.borrow(), &lits![-1]);
        assert_eq!(ctx.part(AssignmentP).var_value(x1), Some(false));

        assert!(pop(ctx.borrow()));
        assert_eq!(ctx.part(AssignmentP).var_value(x1), Some(true));

        assert!(pop(ctx.borrow()));
        assert_eq!(ctx.part(AssignmentP).var_value(x1), None);
    }

    #[test]
    fn depth_tracks_open_checkpoints() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);

        assert_eq!(ctx.part(PushPopP).depth(), 0);
        push(ctx.borrow());
        push(ctx.borrow());
        assert_eq!(ctx.part(PushPopP).depth(), 2);
        pop(ctx.borrow());
        assert_eq!(ctx.part(PushPopP).depth(), 1);
    }

    #[test]
    fn clean_interrupt_restores_idle_when_last_result_was_unknown() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);

        start_search(ctx.borrow());
        assert_eq!(ctx.part(SolverStateP).status, Status::Searching);

        cleanup_after_interrupt(ctx.borrow());

        assert_eq!(ctx.part(SolverStateP).status, Status::Idle);
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
        assert_eq!(ctx.part(PushPopP).depth(), 0);
    }

    #[test]
    fn clean_interrupt_restores_unsat_when_already_permanently_unsat() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 1);
        load_clause(ctx.borrow(), &lits![1]);
        load_clause(ctx.borrow(), &lits![-1]);
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);

        ctx.part_mut(SolverStateP).status = Status::Unsat;

        start_search(ctx.borrow());
        cleanup_after_interrupt(ctx.borrow());

        assert_eq!(ctx.part(SolverStateP).status, Status::Unsat);
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }
}
