use thiserror::Error;

/// Structural errors of the expression graph.
///
/// Numeric singularities (division by zero, log of a non-positive value) are not errors:
/// they are returned as inf/NaN by evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivativeError {
    /// a Variable references a coordinate the input vector does not have
    #[error("variable index {index} is out of range for an input vector of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// a Linear node has more coefficients than the input vector has coordinates
    #[error("linear node has {coefficients} coefficients but the input vector has length {len}")]
    CoefficientsExceedInput { coefficients: usize, len: usize },
    /// a vector or matrix does not have the shape the operation needs
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// no functions or no variables were given where at least one of each is needed
    #[error("empty system: {0}")]
    EmptySystem(String),
}
