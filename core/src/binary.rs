//! Binary clauses.

use partial_ref::{partial, PartialRef};

use smtbool_formula::Lit;

use crate::context::{AssignmentP, BinaryClausesP, Context, TrailP};

/// Binary clauses.
#[derive(Default)]
pub struct BinaryClauses {
    by_lit: Vec<Vec<Lit>>,
    count: usize,
    /// Insertion-ordered log of every clause added, used to undo a batch of additions in LIFO
    /// order for push/pop.
    log: Vec<[Lit; 2]>,
}

impl BinaryClauses {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.by_lit.resize(count * 2, vec![]);
    }

    /// Drop every binary clause that mentions a variable beyond `count`, shrinking the index.
    ///
    /// Used when on-the-fly variables introduced past a checkpoint are garbage collected.
    pub fn truncate_var_count(&mut self, count: usize) {
        let max_code = count * 2;

        let mut count_lits = 0;
        for v in &mut self.by_lit[..max_code] {
            v.retain(|lit| lit.code() < max_code);
            count_lits += v.len();
        }

        self.by_lit.truncate(max_code);
        self.count = count_lits / 2;

        self.log
            .retain(|lits| lits[0].code() < max_code && lits[1].code() < max_code);
    }

    /// Add a binary clause.
    pub fn add_binary_clause(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            self.by_lit[(!lits[i]).code()].push(lits[i ^ 1]);
        }
        self.count += 1;
        self.log.push(lits);
    }

    /// Current position in the insertion log, to be restored later with [`Self::truncate_log`].
    pub fn log_mark(&self) -> usize {
        self.log.len()
    }

    /// Undo every binary clause added since `mark`, in reverse insertion order.
    ///
    /// A logged clause may already be gone from the index, e.g. a level-0 assignment satisfied
    /// it and [`Self::retain_unassigned`] dropped it permanently; such entries are skipped.
    pub fn truncate_log(&mut self, mark: usize) {
        for lits in self.log.split_off(mark).into_iter().rev() {
            if remove_one(&mut self.by_lit[(!lits[0]).code()], lits[1]) {
                remove_one(&mut self.by_lit[(!lits[1]).code()], lits[0]);
                self.count -= 1;
            }
        }
    }

    /// Implications of a given literal
    pub fn implied(&self, lit: Lit) -> &[Lit] {
        &self.by_lit[lit.code()]
    }

    /// Number of binary clauses.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Drop clauses already satisfied by a top-level assignment.
    ///
    /// `is_true` must reflect the assignment of `!lit` wherever this is queried with the negation
    /// of a literal stored here, i.e. the usual `Assignment::lit_is_true`. Falsified literals are
    /// not expected to still be present, as a clause with a falsified literal is unit and gets
    /// propagated (and removed from here) before this runs.
    pub fn retain_unassigned(&mut self, mut is_true: impl FnMut(Lit) -> bool) {
        let mut new_by_lit: Vec<Vec<Lit>> = vec![vec![]; self.by_lit.len()];

        for code in 0..self.by_lit.len() {
            let lit = Lit::from_code(code);
            if is_true(lit) {
                // Every clause watched here (`!lit v other`) is satisfied by `lit`.
                continue;
            }
            new_by_lit[code] = self.by_lit[code]
                .iter()
                .cloned()
                .filter(|&other| !is_true(other))
                .collect();
        }

        let mut count = 0;
        for v in &new_by_lit {
            count += v.len();
        }

        self.by_lit = new_by_lit;
        self.count = count / 2;
    }
}

/// Remove a single occurrence of `lit` from `list`, as recorded by [`BinaryClauses::add_binary_clause`].
///
/// Returns whether an occurrence was found and removed.
fn remove_one(list: &mut Vec<Lit>, lit: Lit) -> bool {
    match list.iter().rposition(|&other| other == lit) {
        Some(pos) => {
            list.swap_remove(pos);
            true
        }
        None => false,
    }
}

/// Remove binary clauses already satisfied by the level-0 assignment.
///
/// Only useful once all level-0 assignments are fully propagated, as a falsified literal in a
/// binary clause would otherwise still need to trigger propagation.
pub fn simplify_binary(mut ctx: partial!(Context, mut BinaryClausesP, AssignmentP, TrailP)) {
    if ctx.part(TrailP).current_level() != 0 {
        return;
    }

    let (assignment, mut ctx) = ctx.split_part(AssignmentP);

    ctx.part_mut(BinaryClausesP)
        .retain_unassigned(|lit| assignment.lit_is_true(lit));
}
