//! Elementwise arithmetic: add, scalar ops, clamp.
//!
//! Binary operations require exactly matching shapes — the colorization
//! topology never relies on broadcasting, so a dimension mismatch here is
//! always a wiring bug and is reported as such.

use crate::dtype::DType;
use crate::error::ChromaError;
use crate::tensor::Tensor;
use crate::Result;

impl Tensor {
    fn f32_data(&self) -> Result<Tensor> {
        if self.dtype() != DType::F32 {
            return Err(ChromaError::UnsupportedDType(self.dtype()));
        }
        Ok(self.contiguous())
    }

    fn binary_op(&self, other: &Tensor, f: impl Fn(f32, f32) -> f32) -> Result<Tensor> {
        if self.shape().dims() != other.shape().dims() {
            return Err(ChromaError::ShapeMismatch {
                expected: self.shape().dims().to_vec(),
                got: other.shape().dims().to_vec(),
            });
        }
        let a = self.f32_data()?;
        let b = other.f32_data()?;
        let a_data = a.as_f32_slice().expect("contiguous f32");
        let b_data = b.as_f32_slice().expect("contiguous f32");
        let result: Vec<f32> = a_data
            .iter()
            .zip(b_data.iter())
            .map(|(&x, &y)| f(x, y))
            .collect();
        Ok(Tensor::from_f32(&result, self.shape().dims()))
    }

    fn unary_op(&self, f: impl Fn(f32) -> f32) -> Result<Tensor> {
        let a = self.f32_data()?;
        let data = a.as_f32_slice().expect("contiguous f32");
        let result: Vec<f32> = data.iter().map(|&x| f(x)).collect();
        Ok(Tensor::from_f32(&result, self.shape().dims()))
    }

    /// Elementwise addition. Shapes must match exactly.
    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(other, |a, b| a + b)
    }

    /// Add a scalar to every element.
    pub fn add_scalar(&self, scalar: f32) -> Result<Tensor> {
        self.unary_op(|x| x + scalar)
    }

    /// Multiply every element by a scalar.
    pub fn mul_scalar(&self, scalar: f32) -> Result<Tensor> {
        self.unary_op(|x| x * scalar)
    }

    /// Clamp every element into `[min, max]`.
    pub fn clamp(&self, min: f32, max: f32) -> Result<Tensor> {
        self.unary_op(|x| x.clamp(min, max))
    }
}
