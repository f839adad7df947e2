//! Simplification using unit clauses.

use partial_ref::{partial, PartialRef};

use crate::binary::simplify_binary;
use crate::context::{
    AssignmentP, BinaryClausesP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, TrailP, WatchlistsP,
};

/// Remove all level-0 assignments from the trail.
///
/// Level-0 assignments hold for the remaining lifetime of the search (or, with push/pop, the
/// remaining lifetime of the current base level) and don't need to stay on the trail once fully
/// propagated.
pub fn prove_units(mut ctx: partial!(Context, mut ImplGraphP, mut TrailP)) -> bool {
    let mut new_unit = false;

    if ctx.part(TrailP).current_level() == 0 {
        let (impl_graph, ctx) = ctx.split_part_mut(ImplGraphP);
        let trail = ctx.part_mut(TrailP);

        for &lit in trail.trail() {
            new_unit = true;
            impl_graph.update_removed_unit(lit.var());
        }

        trail.clear();
    }

    new_unit
}

/// Remove satisfied clauses and false literals.
pub fn simplify(
    mut ctx: partial!(
        Context,
        mut BinaryClausesP,
        mut ClauseAllocP,
        mut ClauseDbP,
        mut WatchlistsP,
        AssignmentP,
    ),
) {
    simplify_binary(ctx.borrow());

    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);

    let mut new_lits = vec![];

    db.retain_clauses(alloc, |alloc, cref| {
        let clause = alloc.clause_mut(cref);
        new_lits.clear();
        for &lit in clause.lits() {
            match assignment.lit_value(lit) {
                None => new_lits.push(lit),
                Some(true) => return false,
                Some(false) => (),
            }
        }
        if new_lits.len() < clause.lits().len() {
            match new_lits[..] {
                // Cannot have empty or unit clauses after full propagation. An empty clause would
                // have been a conflict and a unit clause must be satisfied and thus would have been
                // dropped above.
                [] | [_] => unreachable!(),
                [lit_0, lit_1] => {
                    ctx.part_mut(BinaryClausesP)
                        .add_binary_clause([lit_0, lit_1]);
                    false
                }
                ref lits => {
                    clause.lits_mut()[..lits.len()].copy_from_slice(lits);
                    clause.header_mut().set_len(lits.len());
                    true
                }
            }
        } else {
            true
        }
    })
}
