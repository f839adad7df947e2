//! Solver configuration.
//!
//! All tunable parameters for the search loop, the learned-clause database and the theory
//! interaction are collected here rather than scattered as magic numbers through the solver, in
//! keeping with how the rest of the ambient stack (logging, error handling) is centralized.

/// Restart schedule used to decide when to abandon the current partial assignment.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RestartSchedule {
    /// Knuth's reluctant-doubling Luby sequence, scaled by
    /// [`SolverConfig::luby_restart_interval_scale`].
    Luby,
    /// A fixed geometric progression of restart intervals, in the style of early MiniSat
    /// releases: `interval *= factor` after every restart.
    Geometric,
}

/// How the branching literal's decision is chosen once a variable has been picked.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BranchingMode {
    /// Use the saved phase from the last time the variable was assigned (phase saving).
    Default,
    /// Always decide the variable positively.
    Positive,
    /// Always decide the variable negatively.
    Negative,
    /// Ask the theory solver for a preferred polarity before falling back to phase saving.
    TheoryGuided,
}

/// Learned-clause reduction policy.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ReductionStrategy {
    /// Sort learned clauses by activity, keep the upper half unconditionally, and remove
    /// unlocked clauses in the lower half whose activity is below the average.
    ActivityThreshold,
    /// Partition learned clauses into a young and an old generation by recency and remove
    /// unlocked clauses of the old generation with more than a fixed number of unassigned
    /// literals and activity below a linear threshold.
    ZchaffStyle,
}

/// Configurable parameters used during solving.
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic.
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities.
    pub clause_activity_decay: f32,

    /// Number of conflicts between local-tier clause reductions.
    pub reduce_locals_interval: u64,

    /// Number of conflicts between mid-tier clause reductions.
    pub reduce_mids_interval: u64,

    /// Scaling factor for Luby sequence based restarts (number of conflicts).
    pub luby_restart_interval_scale: u64,

    /// Which restart schedule to use.
    pub restart_schedule: RestartSchedule,

    /// Growth factor applied to the restart interval after each restart when using
    /// [`RestartSchedule::Geometric`].
    pub geometric_restart_factor: f64,

    /// Learned-clause reduction policy.
    pub reduction_strategy: ReductionStrategy,

    /// Probability of making a uniformly random decision instead of following the activity
    /// heap.
    pub random_decision_freq: f64,

    /// How a picked variable's polarity is decided.
    pub branching_mode: BranchingMode,

    /// Whether theory-provided lemmas are cached and reused across backtracking instead of
    /// being re-derived.
    pub cache_theory_lemmas: bool,

    /// Maximum number of Ackermann-style congruence lemmas a theory may add per check.
    pub max_ackermann_lemmas: usize,

    /// Maximum number of interface-equality case splits a theory may introduce per check.
    pub max_interface_equalities: usize,

    /// Maximum number of update axioms (array theory) instantiated per check.
    pub max_update_axioms: usize,

    /// Simplification option: eliminate variables defined by an equality during translation.
    pub var_elim: bool,
    /// Simplification option: flatten nested disjunctions into a single clause.
    pub flatten_or: bool,
    /// Simplification option: flatten nested disequalities under negation.
    pub flatten_diseq: bool,
    /// Simplification option: derive implied equalities via equality-graph abstraction.
    pub eq_abstract: bool,
    /// Simplification option: eliminate variables defined by a linear arithmetic equality.
    pub arith_elim: bool,
    /// Simplification option: keep if-then-else terms rather than splitting them eagerly.
    pub keep_ite: bool,
    /// Simplification option: eliminate variables defined by a bit-vector equality.
    pub bv_arith_elim: bool,

    /// Theory option: eagerly assert simplex lemmas instead of deferring to final check.
    pub eager_simplex_lemmas: bool,
    /// Theory option: periodically re-check integer feasibility during the search, not only at
    /// final check.
    pub periodic_integer_check: bool,

    /// Incremental mode bit: allow repeated `check`/`check_with_assumptions` calls.
    pub multiple_checks: bool,
    /// Incremental mode bit: allow `push`/`pop`.
    pub push_pop: bool,
    /// Incremental mode bit: allow cancelling a search and resuming from the pre-search state.
    pub clean_interrupt: bool,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            clause_activity_decay: 0.999,
            reduce_locals_interval: 15000,
            reduce_mids_interval: 10000,
            luby_restart_interval_scale: 128,
            restart_schedule: RestartSchedule::Luby,
            geometric_restart_factor: 1.5,
            reduction_strategy: ReductionStrategy::ActivityThreshold,
            random_decision_freq: 0.0,
            branching_mode: BranchingMode::Default,
            cache_theory_lemmas: true,
            max_ackermann_lemmas: 100,
            max_interface_equalities: 100,
            max_update_axioms: 100,
            var_elim: true,
            flatten_or: true,
            flatten_diseq: true,
            eq_abstract: false,
            arith_elim: true,
            keep_ite: false,
            bv_arith_elim: true,
            eager_simplex_lemmas: false,
            periodic_integer_check: false,
            multiple_checks: true,
            push_pop: true,
            clean_interrupt: true,
        }
    }
}

/// A partial update to the solver configuration.
///
/// Passed to [`crate::context::config_changed`] so parts that derive cached values from the
/// configuration (e.g. the VSIDS decay rate) can be kept in sync without recomputing everything.
#[derive(Default)]
pub struct SolverConfigUpdate;
