//! # chroma-core
//!
//! Core tensor engine for the Chroma colorization stack.
//!
//! Provides the foundational `Tensor` type with:
//! - 32-bit float storage in row-major (batch, height, width, channel) layout
//! - Zero-copy views (reshape shares storage)
//! - Shape-checked elementwise and manipulation operations
//!
//! Forward evaluation only — there is no gradient machinery here.

pub mod dtype;
pub mod error;
pub mod ops;
pub mod shape;
pub mod storage;
pub mod tensor;

pub use dtype::DType;
pub use error::ChromaError;
pub use shape::Shape;
pub use storage::Storage;
pub use tensor::Tensor;

pub type Result<T> = std::result::Result<T, ChromaError>;
