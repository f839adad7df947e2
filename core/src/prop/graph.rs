//! The implication graph.

use partial_ref::{partial, PartialRef};

use crate::clause::ClauseRef;
use crate::context::{ClauseAllocP, Context};
use smtbool_formula::{Lit, LitIdx, Var};
use crate::theory::TheoryReasonId;

/// Assignments that caused a propagation.
///
/// This is the antecedent of an assigned variable. Three variants wrap Boolean reasons (a unit
/// clause, a binary clause, or a longer clause with the implied literal kept at position 0); the
/// fourth wraps an opaque reason handed back by a theory solver, which is only expanded into
/// literals on demand via [`crate::theory::TheoryControl::expand_explanation`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    Unit,
    Binary([Lit; 1]),
    Long(ClauseRef),
    Theory(TheoryReasonId),
}

impl Reason {
    /// The literals that caused the propagation.
    ///
    /// For a [`Reason::Theory`] antecedent the literals are not known without consulting the
    /// theory solver; callers that may encounter theory reasons must use
    /// [`crate::theory::expand_reason`] instead.
    pub fn lits<'out, 'a, 'b>(&'a self, ctx: &'b partial!('b Context, ClauseAllocP)) -> &'out [Lit]
    where
        'a: 'out,
        'b: 'out,
    {
        match self {
            Reason::Unit => &[],
            Reason::Binary(lit) => lit,
            // The propagated literal is always kept at position 0
            Reason::Long(cref) => &ctx.part(ClauseAllocP).clause(*cref).lits()[1..],
            Reason::Theory(_) => &[],
        }
    }

    /// Whether this reason is a theory-provided opaque explanation.
    pub fn is_theory(&self) -> bool {
        matches!(self, Reason::Theory(_))
    }
}

/// Propagation that resulted in a conflict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Long(ClauseRef),
    Theory(TheoryReasonId),
}

impl Conflict {
    /// The literals that caused the conflict.
    ///
    /// For a [`Conflict::Theory`] antecedent the literals are not known without consulting the
    /// theory solver; callers that may encounter theory conflicts must use
    /// [`crate::theory::expand_conflict`] instead.
    pub fn lits<'out, 'a, 'b>(&'a self, ctx: &'b partial!('b Context, ClauseAllocP)) -> &'out [Lit]
    where
        'a: 'out,
        'b: 'out,
    {
        match self {
            Conflict::Binary(lits) => lits,
            Conflict::Long(cref) => ctx.part(ClauseAllocP).clause(*cref).lits(),
            Conflict::Theory(_) => &[],
        }
    }

    /// Whether this conflict is a theory-provided opaque explanation.
    pub fn is_theory(&self) -> bool {
        matches!(self, Conflict::Theory(_))
    }
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
    /// Trail position at which this variable was assigned. Used to put theory-reason hashes and
    /// similar per-assignment bookkeeping back into propagation order.
    pub depth: LitIdx,
}

/// The implication graph.
///
/// This is a DAG having all assigned variables as nodes. It has unit clauses, assumptions and
/// decisions as sources. For each propagated assignment it has incoming edges from the literals
/// whose assignment caused the propagation to happen.
#[derive(Default)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    pub nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(
            count,
            ImplNode {
                reason: Reason::Unit,
                level: 0,
                depth: 0,
            },
        );
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> &Reason {
        &self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Make sure the reason vars are in front of the assigned variable in the trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason
    }

    /// A level-0 assignment was removed from the trail to keep it short.
    ///
    /// The variable stays permanently assigned; only its recorded trail depth becomes stale,
    /// since nothing deeper than level 0 can ever reference it as ordering context again.
    pub fn update_removed_unit(&mut self, var: Var) {
        self.nodes[var.index()].depth = 0;
    }
}
