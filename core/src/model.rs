//! Model reconstruction.

use partial_ref::{partial, PartialRef};

use smtbool_formula::Lit;

use crate::context::{parts::*, Context};
use crate::state::SatState;

/// Assignment of the current formula once the solver state is SAT.
#[derive(Default)]
pub struct Model {
    assignment: Vec<Option<bool>>,
}

impl Model {
    /// Assignment of the model.
    ///
    /// Only valid if the solver state is SAT.
    pub fn assignment(&self) -> &[Option<bool>] {
        &self.assignment
    }

    /// Whether a given literal is true in the model assignment.
    ///
    /// Only valid if the solver state is SAT.
    pub fn lit_is_true(&self, lit: Lit) -> bool {
        self.assignment[lit.index()] == Some(lit.is_positive())
    }
}

/// Copy the current full assignment into the model and mark the solver state SAT.
pub fn reconstruct_model(
    mut ctx: partial!(Context, mut ModelP, mut SolverStateP, AssignmentP),
) {
    let (assignment, mut ctx) = ctx.split_part(AssignmentP);
    let model = ctx.part_mut(ModelP);

    model.assignment.clear();
    model.assignment.extend_from_slice(assignment.assignment());

    ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
}
