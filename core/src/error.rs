//! Structural error taxonomy.
//!
//! Distinguishes recoverable solver status (tracked via [`crate::state::Status`]) from hard
//! structural failures that abort internalization of a formula. A hard failure is always
//! reported as a negative code at the C boundary this core was modeled on; here it is a typed
//! enum returned as `Err` from translator and loader entry points instead.

use thiserror::Error;

/// Structural error raised while internalizing or asserting a formula.
#[derive(Error, Debug)]
pub enum SolverError {
    /// The asserted formula is trivially unsatisfiable (e.g. the empty clause, or a constant
    /// `false` top-level assertion). This is not a bug in the input; callers should treat it the
    /// same as a search concluding `Unsat`.
    #[error("formula is trivially unsatisfiable")]
    TriviallyUnsat,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("ill-typed term")]
    TypeError,

    #[error("formula contains a free variable")]
    FreeVariableInFormula,

    #[error("logic not supported")]
    LogicNotSupported,

    #[error("uninterpreted functions not supported in this configuration")]
    UninterpretedFunctionsNotSupported,

    #[error("arithmetic not supported in this configuration")]
    ArithmeticNotSupported,

    #[error("bitvectors not supported in this configuration")]
    BitvectorNotSupported,

    #[error("function symbols not supported in this configuration")]
    FunctionsNotSupported,

    #[error("quantifiers not supported")]
    QuantifiersNotSupported,

    #[error("formula is not in the integer difference logic fragment")]
    FormulaNotIdl,

    #[error("formula is not in the real difference logic fragment")]
    FormulaNotRdl,

    #[error("nonlinear arithmetic not supported in this configuration")]
    NonlinearNotSupported,

    #[error("arithmetic solver exception: {0}")]
    ArithSolverException(String),

    #[error("bitvector solver exception: {0}")]
    BitvectorSolverException(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "dimacs")]
    #[error(transparent)]
    Dimacs(#[from] smtbool_dimacs::ParserError),
}
