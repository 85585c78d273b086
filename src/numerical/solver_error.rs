use crate::symbolic::derivative_error::DerivativeError;
use thiserror::Error;

/// Error types of the nonlinear solvers
#[derive(Debug, Error)]
pub enum SolverError {
    /// building or evaluating the expressions failed
    #[error(transparent)]
    Derivative(#[from] DerivativeError),
    /// the linear system of an iteration could not be solved
    #[error("linear system could not be solved: {0}")]
    LinearSolve(String),
    /// the iteration budget ran out before the tolerance was met
    #[error("maximum number of iterations ({0}) reached, no solution found")]
    MaxIterationsReached(usize),
    /// solver parameters are out of their valid range
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
    /// the configuration text is not valid TOML
    #[error("configuration could not be parsed: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
