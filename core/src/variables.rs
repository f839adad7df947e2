//! Variable metadata.

use smtbool_formula::Var;

/// Metadata tracked for each variable, independent of its Boolean assignment.
#[derive(Clone, Default)]
pub struct VarData {
    /// Whether this variable is the Boolean abstraction of a theory atom.
    pub is_atom: bool,
    /// Whether this variable is currently forced by a standing assumption.
    pub assumed: bool,
}

/// Per-variable metadata, indexed by [`Var`].
#[derive(Default)]
pub struct Variables {
    var_data: Vec<VarData>,
}

impl Variables {
    /// Number of variables currently tracked.
    pub fn var_count(&self) -> usize {
        self.var_data.len()
    }

    /// Grow the tracked variable count, leaving new entries at their default.
    pub fn set_var_count(&mut self, count: usize) {
        if count > self.var_data.len() {
            self.var_data.resize(count, VarData::default());
        }
    }

    /// Drop metadata for variables beyond `count`.
    ///
    /// Used when rolling back to a checkpoint that predates these variables.
    pub fn truncate_var_count(&mut self, count: usize) {
        self.var_data.truncate(count);
    }

    /// Mark a variable as the Boolean abstraction of a theory atom.
    pub fn mark_atom(&mut self, var: Var) {
        self.var_data[var.index()].is_atom = true;
    }

    /// Whether a variable is the Boolean abstraction of a theory atom.
    pub fn is_atom(&self, var: Var) -> bool {
        self.var_data[var.index()].is_atom
    }

    /// Record whether a variable is part of the current assumptions.
    pub fn set_assumed(&mut self, var: Var, assumed: bool) {
        self.var_data[var.index()].assumed = assumed;
    }

    /// Whether a variable is part of the current assumptions.
    pub fn is_assumed(&self, var: Var) -> bool {
        self.var_data[var.index()].assumed
    }
}
