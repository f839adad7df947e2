//! Database for long clauses.
use partial_ref::{partial, PartialRef};

use super::{header::HEADER_LEN, ClauseAlloc, ClauseHeader, ClauseRef};

use crate::context::{AssignmentP, ClauseAllocP, ClauseDbP, Context, ImplGraphP, WatchlistsP};
use crate::prop::{Reason, Watchlists};
use smtbool_formula::Lit;

use std::mem::transmute;

/// Partitions of the clause database.
///
/// The long clauses are partitioned into 4 [`Tier`]s. This follows the approach described by
/// Chanseok Oh in ["Between SAT and UNSAT: The Fundamental Difference in CDCL
/// SAT"](https://doi.org/10.1007/978-3-319-24318-4_23), section 4.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Tier {
    Irred = 0,
    Core = 1,
    Mid = 2,
    Local = 3,
}

impl Tier {
    /// Total number of tiers.
    pub const fn count() -> usize {
        4
    }

    /// Cast an index into the corresponding tier.
    pub unsafe fn from_index(index: usize) -> Tier {
        debug_assert!(index < Tier::count());
        transmute(index as u8)
    }
}

#[derive(Default)]
/// Database for long clauses.
///
/// Removal of clauses from the `clauses` and the `by_tier` fields can be delayed. The clause
/// header's deleted and tier fields need to be checked when iterating over these. `by_tier` may
/// also contain duplicate entries.
pub struct ClauseDb {
    /// May contain deleted clauses, see above
    pub(super) clauses: Vec<ClauseRef>,
    /// May contain deleted and moved clauses, see above
    pub(super) by_tier: [Vec<ClauseRef>; Tier::count()],
    /// These counts should always be up to date
    pub(super) count_by_tier: [usize; Tier::count()],
    /// Size of deleted but not collected clauses
    pub(super) garbage_size: usize,
}

impl ClauseDb {
    /// Total number of long clause slots recorded, including deleted ones.
    ///
    /// A mark taken here can later be passed to [`Self::truncate_clauses`] to discard every
    /// clause added after it.
    pub fn clauses_len(&self) -> usize {
        self.clauses.len()
    }

    /// The number of long clauses of a given tier.
    pub fn count_by_tier(&self, tier: Tier) -> usize {
        self.count_by_tier[tier as usize]
    }

    /// Size of deleted but not yet collected clauses, in multiples of [`smtbool_formula::LitIdx`].
    pub fn garbage_size(&self) -> usize {
        self.garbage_size
    }

    /// Iterate over all non-deleted clauses, allowing each to be rewritten in place or deleted.
    ///
    /// `f` is given mutable access to the clause and returns whether it should be kept. `f` may
    /// shrink a clause with `clause.lits_mut()` and `clause.header_mut().set_len()`, but must not
    /// grow one.
    ///
    /// Takes `self` and `alloc` directly rather than a [`Context`] partial reference so callers can
    /// keep other parts (e.g. the binary clause store) mutably borrowed across the callback.
    pub fn retain_clauses(
        &mut self,
        alloc: &mut ClauseAlloc,
        mut f: impl FnMut(&mut ClauseAlloc, ClauseRef) -> bool,
    ) {
        let crefs: Vec<ClauseRef> = self.clauses.clone();

        for cref in crefs {
            if alloc.header(cref).deleted() {
                continue;
            }
            if !f(alloc, cref) {
                let header = alloc.header_mut(cref);
                header.set_deleted(true);
                self.count_by_tier[header.tier() as usize] -= 1;
                self.garbage_size += header.len() + HEADER_LEN;
            }
        }
    }

    /// Roll back to a previous checkpoint, discarding every clause added since.
    ///
    /// Unlike normal deletion, which leaves a clause watched until it is physically reclaimed
    /// (a clause is always a sound consequence of the formula it was derived from, so letting it
    /// keep propagating until then is safe), a clause discarded by push/pop may depend on
    /// assumptions that pop is in the process of retracting and must stop propagating right away.
    pub fn truncate_clauses(&mut self, alloc: &mut ClauseAlloc, watchlists: &mut Watchlists, keep: usize) {
        for cref in self.clauses.split_off(keep) {
            let header = alloc.header(cref).clone();
            if header.deleted() {
                continue;
            }

            let lits = alloc.clause(cref).lits();
            watchlists.unwatch_clause(cref, [lits[0], lits[1]]);

            alloc.header_mut(cref).set_deleted(true);
            self.count_by_tier[header.tier() as usize] -= 1;
            self.garbage_size += header.len() + HEADER_LEN;
        }
    }

    /// Delete every clause that mentions a variable at or beyond `var_count`, unwatching it
    /// immediately.
    ///
    /// Used when on-the-fly variables are collected: their indices may be reused by later
    /// variables, so a watch left behind for one could otherwise silently fire against an
    /// unrelated clause.
    pub fn truncate_out_of_range(
        &mut self,
        alloc: &mut ClauseAlloc,
        watchlists: &mut Watchlists,
        var_count: usize,
    ) {
        let crefs: Vec<ClauseRef> = self.clauses.clone();

        for cref in crefs {
            if alloc.header(cref).deleted() {
                continue;
            }

            let lits = alloc.clause(cref).lits();
            if lits.iter().all(|lit| lit.index() < var_count) {
                continue;
            }

            watchlists.unwatch_clause(cref, [lits[0], lits[1]]);

            let header = alloc.header_mut(cref);
            header.set_deleted(true);
            self.count_by_tier[header.tier() as usize] -= 1;
            self.garbage_size += header.len() + HEADER_LEN;
        }
    }
}

/// Add a long clause to the database.
pub fn add_clause(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP, mut WatchlistsP),
    header: ClauseHeader,
    lits: &[Lit],
) -> ClauseRef {
    let tier = header.tier();

    let cref = ctx.part_mut(ClauseAllocP).add_clause(header, lits);

    let watched_lits = ctx.part(ClauseAllocP).clause(cref).lits();
    ctx.part_mut(WatchlistsP)
        .watch_clause(cref, [watched_lits[0], watched_lits[1]]);

    let db = ctx.part_mut(ClauseDbP);

    db.clauses.push(cref);
    db.by_tier[tier as usize].push(cref);
    db.count_by_tier[tier as usize] += 1;

    cref
}

/// Change the tier of a long clause.
///
/// This is a noop for a clause already of the specified tier.
pub fn set_clause_tier(
    mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP),
    cref: ClauseRef,
    tier: Tier,
) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let old_tier = alloc.header(cref).tier();
    if old_tier != tier {
        db.count_by_tier[old_tier as usize] -= 1;
        db.count_by_tier[tier as usize] += 1;

        alloc.header_mut(cref).set_tier(tier);
        db.by_tier[tier as usize].push(cref);
    }
}

/// Delete a long clause from the database.
pub fn delete_clause(mut ctx: partial!(Context, mut ClauseDbP, mut ClauseAllocP), cref: ClauseRef) {
    let (alloc, mut ctx) = ctx.split_part_mut(ClauseAllocP);
    let db = ctx.part_mut(ClauseDbP);

    let header = alloc.header_mut(cref);

    debug_assert!(
        !header.deleted(),
        "delete_clause for already deleted clause"
    );

    header.set_deleted(true);

    db.count_by_tier[header.tier() as usize] -= 1;

    db.garbage_size += header.len() + HEADER_LEN;
}

/// Delete a long clause unless it is currently the reason for an assignment.
///
/// Returns whether the clause was deleted.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ClauseAllocP,
        mut ClauseDbP,
        AssignmentP,
        ImplGraphP,
    ),
    cref: ClauseRef,
) -> bool {
    let lit_0 = ctx.part(ClauseAllocP).clause(cref).lits()[0];

    let locked = ctx.part(AssignmentP).lit_value(lit_0) == Some(true)
        && *ctx.part(ImplGraphP).reason(lit_0.var()) == Reason::Long(cref);

    if locked {
        false
    } else {
        delete_clause(ctx.borrow(), cref);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use smtbool_formula::cnf::strategy::*;

    #[test]
    fn set_tiers_and_deletes() {
        let mut ctx = Context::default();

        let mut ctx = ctx.into_partial_ref_mut();

        let clauses = cnf_formula![
            1, 2, 3;
            4, -5, 6;
            -2, 3, -4;
            -3, 5, 2, 7, 5;
        ];

        let tiers = vec![Tier::Irred, Tier::Core, Tier::Mid, Tier::Local];
        let new_tiers = vec![Tier::Irred, Tier::Local, Tier::Local, Tier::Core];

        let mut crefs = vec![];

        for (clause, &tier) in clauses.iter().zip(tiers.iter()) {
            let mut header = ClauseHeader::new();
            header.set_tier(tier);
            let cref = add_clause(ctx.borrow(), header, clause);
            crefs.push(cref);
        }

        for (&cref, &tier) in crefs.iter().rev().zip(new_tiers.iter().rev()) {
            set_clause_tier(ctx.borrow(), cref, tier);
        }

        // We only check presence, as deletion from these lists is delayed
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Irred as usize].contains(&crefs[0]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Core as usize].contains(&crefs[3]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Local as usize].contains(&crefs[1]));
        assert!(ctx.part(ClauseDbP).by_tier[Tier::Local as usize].contains(&crefs[2]));

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 2);

        delete_clause(ctx.borrow(), crefs[0]);
        delete_clause(ctx.borrow(), crefs[2]);

        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Irred), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Core), 1);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Mid), 0);
        assert_eq!(ctx.part(ClauseDbP).count_by_tier(Tier::Local), 1);
    }

    // Garbage collection itself (which invalidates `ClauseRef`s held before it runs) is covered by
    // the proptest in `clause::gc`.
}
