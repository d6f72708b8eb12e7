//! Batch normalization in inference mode.

use chroma_core::{ChromaError, Tensor};

use crate::module::Module;

/// Epsilon folded into the variance before the square root (Keras default).
pub const BATCH_NORM_EPS: f32 = 1e-3;

/// Per-channel batch normalization over the last (channel) axis of an NHWC
/// tensor, using frozen statistics captured at training time.
///
/// `y = gamma * (x - moving_mean) / sqrt(moving_variance + eps) + beta`
///
/// The four statistic vectors are folded into a per-channel `scale` and
/// `shift` once at construction, so the forward pass is a fused
/// multiply-add per element.
#[derive(Debug)]
pub struct BatchNorm2d {
    gamma: Tensor,
    beta: Tensor,
    moving_mean: Tensor,
    moving_variance: Tensor,
    scale: Vec<f32>,
    shift: Vec<f32>,
    channels: usize,
}

impl BatchNorm2d {
    /// Build from the four frozen statistic vectors, each of shape
    /// `[channels]`.
    pub fn from_stats(
        gamma: Tensor,
        beta: Tensor,
        moving_mean: Tensor,
        moving_variance: Tensor,
    ) -> chroma_core::Result<Self> {
        let channels = gamma.numel();
        for t in [&beta, &moving_mean, &moving_variance] {
            if t.numel() != channels {
                return Err(ChromaError::ShapeMismatch {
                    expected: vec![channels],
                    got: t.shape().dims().to_vec(),
                });
            }
        }

        let g = gamma
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(gamma.dtype()))?;
        let b = beta
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(beta.dtype()))?;
        let mean = moving_mean
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(moving_mean.dtype()))?;
        let var = moving_variance
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(moving_variance.dtype()))?;

        let mut scale = Vec::with_capacity(channels);
        let mut shift = Vec::with_capacity(channels);
        for c in 0..channels {
            let inv_std = 1.0 / (var[c] + BATCH_NORM_EPS).sqrt();
            scale.push(g[c] * inv_std);
            shift.push(b[c] - mean[c] * g[c] * inv_std);
        }

        Ok(Self {
            gamma,
            beta,
            moving_mean,
            moving_variance,
            scale,
            shift,
            channels,
        })
    }

    /// Number of normalized channels.
    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl Module for BatchNorm2d {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        let dims = input.shape().dims();
        if dims.last() != Some(&self.channels) {
            return Err(ChromaError::ShapeMismatch {
                expected: vec![self.channels],
                got: dims.to_vec(),
            });
        }

        let data = input.contiguous();
        let x = data
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(data.dtype()))?;

        let mut out = vec![0.0f32; x.len()];
        for (dst, src) in out.chunks_mut(self.channels).zip(x.chunks(self.channels)) {
            for c in 0..self.channels {
                dst[c] = src[c] * self.scale[c] + self.shift[c];
            }
        }

        Ok(Tensor::from_f32(&out, dims))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        vec![
            &self.gamma,
            &self.beta,
            &self.moving_mean,
            &self.moving_variance,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_norm(channels: usize) -> BatchNorm2d {
        BatchNorm2d::from_stats(
            Tensor::ones(&[channels]),
            Tensor::zeros(&[channels], chroma_core::DType::F32),
            Tensor::zeros(&[channels], chroma_core::DType::F32),
            Tensor::ones(&[channels]),
        )
        .unwrap()
    }

    #[test]
    fn test_identity_stats_near_identity() {
        // gamma=1, beta=0, mean=0, var=1: output is x / sqrt(1 + eps).
        let norm = identity_norm(2);
        let input = Tensor::from_f32(&[1.0, -2.0, 0.5, 4.0], &[1, 1, 2, 2]);
        let output = norm.forward(&input).unwrap();
        let data = output.as_f32_slice().unwrap();
        let factor = 1.0 / (1.0f32 + BATCH_NORM_EPS).sqrt();
        for (o, i) in data.iter().zip([1.0, -2.0, 0.5, 4.0]) {
            assert!((o - i * factor).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalizes_per_channel() {
        // Channel 0: mean 2, var 4 -> (x - 2) / sqrt(4 + eps)
        // Channel 1: gamma 3, beta 1 -> 3 * x / sqrt(1 + eps) + 1
        let norm = BatchNorm2d::from_stats(
            Tensor::from_f32(&[1.0, 3.0], &[2]),
            Tensor::from_f32(&[0.0, 1.0], &[2]),
            Tensor::from_f32(&[2.0, 0.0], &[2]),
            Tensor::from_f32(&[4.0, 1.0], &[2]),
        )
        .unwrap();
        let input = Tensor::from_f32(&[6.0, 2.0], &[1, 1, 1, 2]);
        let output = norm.forward(&input).unwrap();
        let data = output.as_f32_slice().unwrap();
        assert!((data[0] - 4.0 / (4.0f32 + BATCH_NORM_EPS).sqrt()).abs() < 1e-5);
        assert!((data[1] - (6.0 / (1.0f32 + BATCH_NORM_EPS).sqrt() + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn test_channel_mismatch() {
        let norm = identity_norm(4);
        let input = Tensor::ones(&[1, 2, 2, 3]);
        assert!(norm.forward(&input).is_err());
    }

    #[test]
    fn test_mismatched_stat_lengths() {
        let result = BatchNorm2d::from_stats(
            Tensor::ones(&[4]),
            Tensor::zeros(&[3], chroma_core::DType::F32),
            Tensor::zeros(&[4], chroma_core::DType::F32),
            Tensor::ones(&[4]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_parameters() {
        let norm = identity_norm(8);
        assert_eq!(norm.parameters().len(), 4);
        assert_eq!(norm.num_parameters(), 32);
    }
}
