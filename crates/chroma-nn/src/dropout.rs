//! Dropout — an identity at inference time.

use chroma_core::Tensor;

use crate::module::Module;

/// Dropout layer. The rate is recorded because it is part of the topology
/// description, but inference never masks activations: forward is the
/// identity so repeated passes over the same input stay deterministic.
#[derive(Debug)]
pub struct Dropout {
    rate: f32,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        assert!((0.0..1.0).contains(&rate), "dropout rate must be in [0, 1)");
        Self { rate }
    }

    /// The configured drop rate.
    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl Module for Dropout {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        Ok(input.clone())
    }

    fn parameters(&self) -> Vec<&Tensor> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_at_inference() {
        let dropout = Dropout::new(0.5);
        let input = Tensor::from_f32(&[1.0, -2.0, 3.0], &[3]);
        let a = dropout.forward(&input).unwrap();
        let b = dropout.forward(&input).unwrap();
        assert_eq!(a.as_f32_slice().unwrap(), input.as_f32_slice().unwrap());
        assert_eq!(a.as_f32_slice().unwrap(), b.as_f32_slice().unwrap());
    }

    #[test]
    fn test_no_parameters() {
        let dropout = Dropout::new(0.5);
        assert!(dropout.parameters().is_empty());
        assert_eq!(dropout.rate(), 0.5);
    }
}
