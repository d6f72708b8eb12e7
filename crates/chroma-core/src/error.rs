use thiserror::Error;

use crate::dtype::DType;

/// Error type for tensor operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChromaError {
    /// Operand shapes are incompatible for the attempted operation.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Reshape target does not match the tensor's element count.
    #[error("cannot reshape {numel} elements into {shape:?}")]
    InvalidReshape { numel: usize, shape: Vec<usize> },

    /// Axis index out of range for the tensor's rank.
    #[error("axis {axis} out of range for {ndim}-dimensional tensor")]
    InvalidAxis { axis: usize, ndim: usize },

    /// Operation does not support the tensor's dtype.
    #[error("unsupported dtype: {0}")]
    UnsupportedDType(DType),

    /// Storage-level failure (allocation, byte-length mismatch, access).
    #[error("storage error: {0}")]
    StorageError(String),
}
