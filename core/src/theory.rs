//! Abstract interface between the Boolean core and a theory solver.
//!
//! The core never depends on a concrete theory (arithmetic, bit-vectors, equality and
//! uninterpreted functions, arrays). Instead it drives whatever is plugged in through the narrow
//! control surface defined here, and theories push atoms, propagated literals and lemmas back
//! through the same handle. This mirrors the split between `smt_core` and the individual theory
//! solvers in the system this core was modeled on: the core owns the trail, the clause database
//! and the watched-literal index, a theory owns its own state and is only ever told about
//! assignments in trail order.

use partial_ref::{partial, PartialRef};

use smtbool_formula::{Lit, Var};

use crate::context::{
    AssignmentP, ClauseAllocP, Context, ImplGraphP, TheoryP, TrailP, VariablesP,
};
use crate::prop::{Conflict, Reason};

/// Opaque identifier for a theory-provided explanation.
///
/// The core stores this inside a [`crate::prop::Reason::Theory`] or
/// [`crate::prop::Conflict::Theory`] antecedent and only asks the theory to expand it into
/// literals when conflict analysis actually walks that antecedent.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct TheoryReasonId(pub u32);

/// Outcome of a final check, run once Boolean and theory propagation have both saturated.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FinalCheck {
    /// The theory found nothing to add; the current model is a full solution.
    Sat,
    /// The theory asserted new atoms or literals; the core should keep searching.
    Continue,
    /// The theory cannot currently decide satisfiability (e.g. a non-linear fragment).
    Unknown,
}

/// A lemma a theory wants installed in the clause database.
///
/// If produced while the search is between conflicts this is installed immediately; if produced
/// mid-propagation it is pushed onto the lemma queue (see [`crate::incremental`]) and installed
/// between propagation rounds, since installing a clause can change watched lists that are
/// currently being walked.
pub struct TheoryLemma {
    pub lits: Vec<Lit>,
}

/// Control operations the core invokes on a theory solver.
///
/// Implemented once per theory (or by a dispatcher that fans out to several sort-specific
/// theories); the core holds trait objects behind a `Box<dyn TheoryControl>` so that which
/// theories are linked in is a property of how a `Context` is constructed, not of the core crate.
pub trait TheoryControl: TheoryAtoms + ExplainTheoryReason {
    /// Called once before any atoms for this check are created.
    fn start_internalization(&mut self);

    /// Called when the core begins a new search (an implicit push happens alongside this so that
    /// a clean interrupt can simply pop back to this point).
    fn start_search(&mut self);

    /// Notified of newly assigned literals in trail order, exactly once each, via
    /// [`TheoryAtoms::assert_atom`] for literals with an associated atom. After Boolean
    /// propagation has saturated under the atoms asserted so far, the core calls this to let the
    /// theory propagate further Boolean consequences, drained one at a time from the paired
    /// [`TheoryAtoms`] handle via [`TheoryAtoms::next_propagated`]. Returns `false` to signal a
    /// theory conflict; when that happens [`Self::theory_conflict`] must return its reason.
    fn propagate(&mut self) -> bool;

    /// Called after [`Self::propagate`] returned `false`, to retrieve the reason for the
    /// conflict it found.
    fn theory_conflict(&mut self) -> TheoryReasonId;

    /// Called once Boolean and theory propagation have both saturated with no further Boolean
    /// consequences. May add lemmas (e.g. an Ackermann instance) which forces another round of
    /// propagation rather than a final answer.
    fn final_check(&mut self) -> FinalCheck;

    /// The core increased the decision level.
    fn increase_decision_level(&mut self);

    /// The core is backtracking to the given decision level; all theory state for variables
    /// assigned at higher levels must be undone.
    fn backtrack(&mut self, level: usize);

    /// The core is pushing a new assertion level.
    fn push(&mut self);

    /// The core is popping back to the assertion level saved by the matching `push`.
    fn pop(&mut self);

    /// The core is resetting to the empty problem.
    fn reset(&mut self);

    /// An atom tied to a deleted variable is no longer reachable; the theory may forget it.
    fn atom_deleted(&mut self, atom: Var);
}

/// Atom-facing operations, split from [`TheoryControl`] so a theory can be notified of an
/// assignment (`assert_atom`) without re-borrowing the whole control interface.
pub trait TheoryAtoms {
    /// A Boolean variable with an associated theory atom has just been assigned `literal`.
    ///
    /// Returns `false` on a theory conflict (a conflict must already have been recorded via the
    /// paired control handle before returning `false`).
    fn assert_atom(&mut self, atom: Var, literal: Lit) -> bool;

    /// Drain one theory-propagated literal, along with the reason that justifies it.
    ///
    /// Called repeatedly after [`TheoryControl::propagate`] returns `true` until it returns
    /// `None`, each time enqueuing the literal for Boolean propagation before asking for the
    /// next one.
    fn next_propagated(&mut self) -> Option<(Lit, TheoryReasonId)>;
}

/// Expands an opaque [`TheoryReasonId`] antecedent into the literals that imply it.
///
/// Per the causality invariant, every literal returned here must precede the implied literal in
/// the trail.
pub trait ExplainTheoryReason {
    fn expand_explanation(&mut self, reason: TheoryReasonId, out: &mut Vec<Lit>);
}

/// Expand a [`Reason`] into its antecedent literals, consulting the theory for
/// [`Reason::Theory`].
///
/// `out` is overwritten; non-theory reasons that borrow directly from the clause database are
/// copied into it too, so every caller sees a uniform owned slice regardless of antecedent kind.
pub fn expand_reason(
    mut ctx: partial!(Context, mut TheoryP, ClauseAllocP),
    reason: &Reason,
    out: &mut Vec<Lit>,
) {
    out.clear();
    match reason {
        Reason::Theory(id) => {
            if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
                theory.expand_explanation(*id, out);
            }
        }
        other => out.extend_from_slice(other.lits(&ctx.borrow())),
    }
}

/// Expand a [`Conflict`] into its antecedent literals, consulting the theory for
/// [`Conflict::Theory`].
pub fn expand_conflict(
    mut ctx: partial!(Context, mut TheoryP, ClauseAllocP),
    conflict: &Conflict,
    out: &mut Vec<Lit>,
) {
    out.clear();
    match conflict {
        Conflict::Theory(id) => {
            if let Some(theory) = ctx.part_mut(TheoryP).as_mut() {
                theory.expand_explanation(*id, out);
            }
        }
        Conflict::Binary(lits) => out.extend_from_slice(lits),
        Conflict::Long(cref) => {
            out.extend_from_slice(ctx.part(ClauseAllocP).clause(*cref).lits())
        }
    }
}

/// Run one round of theory propagation after Boolean propagation has saturated.
///
/// First notifies the theory of every newly assigned literal with an associated atom via
/// [`TheoryAtoms::assert_atom`], then asks the theory to propagate, then drains every literal it
/// found through [`TheoryAtoms::next_propagated`], enqueuing each for Boolean propagation in turn.
/// The caller is expected to alternate this with Boolean propagation until neither makes further
/// progress.
pub fn propagate_theory(
    mut ctx: partial!(
        Context,
        mut TheoryP,
        mut TrailP,
        mut AssignmentP,
        mut ImplGraphP,
        VariablesP,
    ),
) -> Result<(), Conflict> {
    if ctx.part(TheoryP).is_none() {
        return Ok(());
    }

    loop {
        let next = ctx.part_mut(TrailP).next_for_theory();
        let lit = match next {
            Some(lit) => lit,
            None => break,
        };

        if !ctx.part(VariablesP).is_atom(lit.var()) {
            continue;
        }

        let ok = ctx
            .part_mut(TheoryP)
            .as_mut()
            .unwrap()
            .assert_atom(lit.var(), lit);

        if !ok {
            let reason = ctx.part_mut(TheoryP).as_mut().unwrap().theory_conflict();
            return Err(Conflict::Theory(reason));
        }
    }

    let conflict = match ctx.part_mut(TheoryP).as_mut() {
        Some(theory) => {
            if theory.propagate() {
                None
            } else {
                Some(theory.theory_conflict())
            }
        }
        None => return Ok(()),
    };

    if let Some(reason) = conflict {
        return Err(Conflict::Theory(reason));
    }

    loop {
        let next = match ctx.part_mut(TheoryP).as_mut() {
            Some(theory) => theory.next_propagated(),
            None => None,
        };

        match next {
            Some((lit, reason_id)) => {
                crate::prop::enqueue_assignment(ctx.borrow(), lit, Reason::Theory(reason_id));
            }
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    use partial_ref::IntoPartialRefMut;

    use crate::context::{set_var_count, TheoryP};

    /// A theory that records every atom it is told about (into a shared handle the test keeps),
    /// then propagates a single fixed literal with a fixed reason the first time `propagate` is
    /// called.
    #[derive(Default)]
    struct RecordingTheory {
        asserted: Rc<RefCell<Vec<(Var, Lit)>>>,
        to_propagate: Option<(Lit, TheoryReasonId)>,
        conflict_on_assert: Option<Lit>,
    }

    impl TheoryAtoms for RecordingTheory {
        fn assert_atom(&mut self, atom: Var, literal: Lit) -> bool {
            self.asserted.borrow_mut().push((atom, literal));
            self.conflict_on_assert != Some(literal)
        }

        fn next_propagated(&mut self) -> Option<(Lit, TheoryReasonId)> {
            self.to_propagate.take()
        }
    }

    impl ExplainTheoryReason for RecordingTheory {
        fn expand_explanation(&mut self, _reason: TheoryReasonId, out: &mut Vec<Lit>) {
            out.clear();
        }
    }

    impl TheoryControl for RecordingTheory {
        fn start_internalization(&mut self) {}
        fn start_search(&mut self) {}
        fn propagate(&mut self) -> bool {
            true
        }
        fn theory_conflict(&mut self) -> TheoryReasonId {
            TheoryReasonId(0)
        }
        fn final_check(&mut self) -> FinalCheck {
            FinalCheck::Sat
        }
        fn increase_decision_level(&mut self) {}
        fn backtrack(&mut self, _level: usize) {}
        fn push(&mut self) {}
        fn pop(&mut self) {}
        fn reset(&mut self) {}
        fn atom_deleted(&mut self, _atom: Var) {}
    }

    #[test]
    fn assert_atom_is_called_once_per_trailed_atom() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);

        let atom_var = Var::from_index(0);
        let non_atom_var = Var::from_index(1);
        ctx.part_mut(VariablesP).mark_atom(atom_var);

        let asserted = Rc::new(RefCell::new(Vec::new()));
        *ctx.part_mut(TheoryP) = Some(Box::new(RecordingTheory {
            asserted: asserted.clone(),
            ..RecordingTheory::default()
        }));

        crate::prop::enqueue_assignment(
            ctx.borrow(),
            Lit::from_var(atom_var, false),
            Reason::Unit,
        );
        crate::prop::enqueue_assignment(
            ctx.borrow(),
            Lit::from_var(non_atom_var, false),
            Reason::Unit,
        );

        propagate_theory(ctx.borrow()).unwrap();

        assert_eq!(
            *asserted.borrow(),
            vec![(atom_var, Lit::from_var(atom_var, false))]
        );
    }

    #[test]
    fn propagated_literal_reaches_the_trail() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);

        let propagated_var = Var::from_index(1);
        let propagated_lit = Lit::from_var(propagated_var, true);

        *ctx.part_mut(TheoryP) = Some(Box::new(RecordingTheory {
            to_propagate: Some((propagated_lit, TheoryReasonId(7))),
            ..RecordingTheory::default()
        }));

        propagate_theory(ctx.borrow()).unwrap();

        assert_eq!(ctx.part(AssignmentP).lit_value(propagated_lit), Some(true));
    }
}
