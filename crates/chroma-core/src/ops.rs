//! Tensor operations, implemented as inherent methods on `Tensor`.

pub mod arithmetic;
pub mod manipulation;
