//! Garbage collection of on-the-fly variables.
//!
//! Theory internalization (see [`crate::translator`]) can introduce fresh Boolean variables
//! while the search is already under way, e.g. one abstraction variable per interface term. Once
//! the search backtracks past the decision level at which such a batch of variables was
//! introduced and none of them are assigned anymore, the whole batch is dead: this module removes
//! it, together with every clause that still mentions it.

use partial_ref::{partial, PartialRef};

use smtbool_formula::Var;

use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, GcCheckpointsP, TheoryP,
    TrailP, VariablesP, VsidsP, WatchlistsP,
};

/// A batch of variables introduced at a given decision level.
struct Checkpoint {
    /// Decision level active when this checkpoint was recorded.
    level: usize,
    /// Number of variables that existed before this checkpoint's batch was introduced.
    var_count: usize,
}

/// Stack of pending on-the-fly variable batches, ordered by introduction time.
#[derive(Default)]
pub struct GcCheckpoints {
    checkpoints: Vec<Checkpoint>,
}

/// Record that every variable from here on is part of a new on-the-fly batch.
///
/// Call this before allocating the variables of the batch.
pub fn checkpoint(mut ctx: partial!(Context, mut GcCheckpointsP, TrailP, VariablesP)) {
    let level = ctx.part(TrailP).current_level();
    let var_count = ctx.part(VariablesP).var_count();

    let checkpoints = &mut ctx.part_mut(GcCheckpointsP).checkpoints;

    if let Some(top) = checkpoints.last() {
        if top.var_count == var_count {
            return;
        }
    }

    checkpoints.push(Checkpoint { level, var_count });
}

/// Try to remove the most recently introduced batches of on-the-fly variables.
///
/// A batch can only be removed once the search has backtracked to at most its introduction level
/// and none of its variables are currently assigned. Removes clauses and binary clauses that
/// still reference a deleted variable.
pub fn collect_garbage_vars(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut GcCheckpointsP,
        mut TheoryP,
        mut VariablesP,
        mut VsidsP,
        mut WatchlistsP,
        TrailP,
    ),
) {
    let current_level = ctx.part(TrailP).current_level();

    let old_var_count = ctx.part(VariablesP).var_count();
    let mut new_var_count = old_var_count;

    loop {
        let segment_var_count = match ctx.part(GcCheckpointsP).checkpoints.last() {
            Some(top) if current_level <= top.level => top.var_count,
            _ => break,
        };

        let segment_unassigned = (segment_var_count..new_var_count).all(|index| {
            ctx.part(AssignmentP)
                .var_value(Var::from_index(index))
                .is_none()
        });

        if !segment_unassigned {
            break;
        }

        ctx.part_mut(GcCheckpointsP).checkpoints.pop();
        new_var_count = segment_var_count;
    }

    if new_var_count == old_var_count {
        return;
    }

    for index in new_var_count..old_var_count {
        let var = Var::from_index(index);
        ctx.part_mut(VsidsP).remove(var);
        if ctx.part(VariablesP).is_atom(var) {
            if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
                theory.atom_deleted(var);
            }
        }
    }

    ctx.part_mut(VariablesP).truncate_var_count(new_var_count);

    remove_garbage_clauses(ctx.borrow(), new_var_count);
    ctx.part_mut(BinaryClausesP)
        .truncate_var_count(new_var_count);
    ctx.part_mut(WatchlistsP).truncate_var_count(new_var_count);
}

/// Delete every long clause that mentions a variable at or beyond `var_count`.
fn remove_garbage_clauses(
    mut ctx: partial!(Context, mut ClauseAllocP, mut ClauseDbP, mut WatchlistsP),
    var_count: usize,
) {
    let (clause_db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let watchlists = ctx.part_mut(WatchlistsP);

    clause_db.truncate_out_of_range(alloc, watchlists, var_count);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use smtbool_formula::Lit;

    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::{backtrack, enqueue_assignment, Reason};

    #[test]
    fn unassigned_batch_is_collected_after_backtracking_past_its_level() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);
        ctx.part_mut(TrailP).new_decision_level();

        checkpoint(ctx.borrow());
        set_var_count(ctx.borrow(), 5);

        assert_eq!(ctx.part(VariablesP).var_count(), 5);

        backtrack(ctx.borrow(), 0);
        collect_garbage_vars(ctx.borrow());

        assert_eq!(ctx.part(VariablesP).var_count(), 2);
    }

    #[test]
    fn assigned_batch_survives_collection() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);
        ctx.part_mut(TrailP).new_decision_level();

        checkpoint(ctx.borrow());
        set_var_count(ctx.borrow(), 3);

        let fresh = Var::from_index(2);
        enqueue_assignment(ctx.borrow(), Lit::from_var(fresh, false), Reason::Unit);

        // Go one level deeper, then only backtrack back to the checkpoint's own level: `fresh`
        // was assigned before that deeper level started, so it's still assigned afterward.
        ctx.part_mut(TrailP).new_decision_level();
        backtrack(ctx.borrow(), 1);
        collect_garbage_vars(ctx.borrow());

        assert_eq!(ctx.part(VariablesP).var_count(), 3);
    }

    #[test]
    fn garbage_clauses_are_removed_with_their_variables() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);
        ctx.part_mut(TrailP).new_decision_level();

        checkpoint(ctx.borrow());
        set_var_count(ctx.borrow(), 5);

        load_clause(ctx.borrow(), &lits![1, 3, 4]);

        backtrack(ctx.borrow(), 0);
        collect_garbage_vars(ctx.borrow());

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(crate::clause::Tier::Irred), 0);
    }
}
