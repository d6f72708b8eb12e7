//! Activation functions.

use chroma_core::{ChromaError, DType, Tensor};

/// Default negative slope for leaky rectification when a block does not
/// override it (the Keras `LeakyReLU()` default).
pub const DEFAULT_LEAKY_SLOPE: f32 = 0.3;

/// ReLU activation: max(0, x)
pub fn relu(input: &Tensor) -> chroma_core::Result<Tensor> {
    if input.dtype() != DType::F32 {
        return Err(ChromaError::UnsupportedDType(input.dtype()));
    }
    input.clamp(0.0, f32::INFINITY)
}

/// Leaky ReLU: x for x >= 0, `negative_slope * x` otherwise.
///
/// Not interchangeable with [`relu`] — which one a block applies is part of
/// the topology, and the residual blocks pin the slope to 0.2 while the
/// downsample stages use [`DEFAULT_LEAKY_SLOPE`].
pub fn leaky_relu(input: &Tensor, negative_slope: f32) -> chroma_core::Result<Tensor> {
    if input.dtype() != DType::F32 {
        return Err(ChromaError::UnsupportedDType(input.dtype()));
    }
    let data = input.contiguous();
    let slice = data.as_f32_slice().expect("contiguous f32");
    let result: Vec<f32> = slice
        .iter()
        .map(|&x| if x >= 0.0 { x } else { negative_slope * x })
        .collect();
    Ok(Tensor::from_f32(&result, input.shape().dims()))
}

/// Tanh activation — bounds the generator output to [-1, 1].
pub fn tanh(input: &Tensor) -> chroma_core::Result<Tensor> {
    if input.dtype() != DType::F32 {
        return Err(ChromaError::UnsupportedDType(input.dtype()));
    }
    let data = input.contiguous();
    let slice = data.as_f32_slice().expect("contiguous f32");
    let result: Vec<f32> = slice.iter().map(|&x| x.tanh()).collect();
    Ok(Tensor::from_f32(&result, input.shape().dims()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu() {
        let t = Tensor::from_f32(&[-1.0, 0.0, 1.0, 2.0], &[4]);
        let r = relu(&t).unwrap();
        assert_eq!(r.as_f32_slice().unwrap(), &[0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_leaky_relu() {
        let t = Tensor::from_f32(&[-2.0, -1.0, 0.0, 3.0], &[4]);
        let r = leaky_relu(&t, 0.2).unwrap();
        let data = r.as_f32_slice().unwrap();
        assert!((data[0] - (-0.4)).abs() < 1e-6);
        assert!((data[1] - (-0.2)).abs() < 1e-6);
        assert_eq!(data[2], 0.0);
        assert_eq!(data[3], 3.0);
    }

    #[test]
    fn test_leaky_differs_from_relu_on_negatives() {
        let t = Tensor::from_f32(&[-1.0], &[1]);
        let r = relu(&t).unwrap();
        let l = leaky_relu(&t, DEFAULT_LEAKY_SLOPE).unwrap();
        assert_eq!(r.get_f32(0), Some(0.0));
        assert!((l.get_f32(0).unwrap() - (-0.3)).abs() < 1e-6);
    }

    #[test]
    fn test_tanh() {
        let t = Tensor::from_f32(&[0.0, 1.0, -1.0], &[3]);
        let r = tanh(&t).unwrap();
        let data = r.as_f32_slice().unwrap();
        assert!((data[0] - 0.0).abs() < 1e-6);
        assert!((data[1] - 1.0f32.tanh()).abs() < 1e-6);
        assert!((data[2] + 1.0f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_tanh_bounded() {
        let t = Tensor::from_f32(&[-100.0, 100.0], &[2]);
        let r = tanh(&t).unwrap();
        let data = r.as_f32_slice().unwrap();
        assert!(data.iter().all(|v| (-1.0..=1.0).contains(v)));
    }
}
