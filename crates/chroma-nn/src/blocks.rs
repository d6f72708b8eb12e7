//! Encoder/decoder building blocks: Downsample, Upsample, ResidualBlock.
//!
//! Each block binds its parameters from a [`ParameterSet`] under a dotted
//! prefix (`down0`, `up2.res`, ...), validating every shape before the
//! block exists. Construction either yields a fully-wired block or a
//! [`BuildError`] naming the offending tensor.

use chroma_core::{ChromaError, Tensor};

use crate::activations::{leaky_relu, relu, DEFAULT_LEAKY_SLOPE};
use crate::conv::{Conv2d, ConvTranspose2d};
use crate::dropout::Dropout;
use crate::error::BuildError;
use crate::module::Module;
use crate::norm::BatchNorm2d;
use crate::params::ParameterSet;

/// Negative slope used inside residual blocks.
pub const RESIDUAL_SLOPE: f32 = 0.2;

fn norm_from_params(
    params: &ParameterSet,
    prefix: &str,
    channels: usize,
) -> Result<BatchNorm2d, BuildError> {
    let gamma = params.get_with_shape(&format!("{prefix}.gamma"), &[channels])?;
    let beta = params.get_with_shape(&format!("{prefix}.beta"), &[channels])?;
    let mean = params.get_with_shape(&format!("{prefix}.moving_mean"), &[channels])?;
    let variance = params.get_with_shape(&format!("{prefix}.moving_variance"), &[channels])?;
    Ok(BatchNorm2d::from_stats(
        gamma.clone(),
        beta.clone(),
        mean.clone(),
        variance.clone(),
    )?)
}

/// Encoder stage: strided 4x4 convolution (no bias), optional batch
/// normalization, leaky rectification with the default slope. Halves the
/// spatial resolution.
#[derive(Debug)]
pub struct Downsample {
    conv: Conv2d,
    norm: Option<BatchNorm2d>,
}

impl Downsample {
    /// Bind a stage from `{prefix}.conv.kernel` and, when `normalize`,
    /// the `{prefix}.norm.*` statistics.
    pub fn from_params(
        params: &ParameterSet,
        prefix: &str,
        in_channels: usize,
        out_channels: usize,
        normalize: bool,
    ) -> Result<Self, BuildError> {
        let kernel = params.get_with_shape(
            &format!("{prefix}.conv.kernel"),
            &[4, 4, in_channels, out_channels],
        )?;
        let conv = Conv2d::from_weight(kernel.clone(), None, 2);
        let norm = if normalize {
            Some(norm_from_params(
                params,
                &format!("{prefix}.norm"),
                out_channels,
            )?)
        } else {
            None
        };
        Ok(Self { conv, norm })
    }

    pub fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }
}

impl Module for Downsample {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        let dims = input.shape().dims();
        // Odd extents would desynchronize the mirrored upsample path.
        if dims.len() == 4 && (dims[1] % 2 != 0 || dims[2] % 2 != 0) {
            return Err(ChromaError::ShapeMismatch {
                expected: vec![dims[0], dims[1].next_multiple_of(2), dims[2].next_multiple_of(2), dims[3]],
                got: dims.to_vec(),
            });
        }

        let mut x = self.conv.forward(input)?;
        if let Some(ref norm) = self.norm {
            x = norm.forward(&x)?;
        }
        leaky_relu(&x, DEFAULT_LEAKY_SLOPE)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.conv.parameters();
        if let Some(ref norm) = self.norm {
            params.extend(norm.parameters());
        }
        params
    }
}

/// Decoder stage: transposed 4x4 convolution (no bias), batch
/// normalization, optional dropout, ReLU. Doubles the spatial resolution.
#[derive(Debug)]
pub struct Upsample {
    deconv: ConvTranspose2d,
    norm: BatchNorm2d,
    dropout: Option<Dropout>,
}

impl Upsample {
    /// Bind a stage from `{prefix}.deconv.kernel` and `{prefix}.norm.*`.
    pub fn from_params(
        params: &ParameterSet,
        prefix: &str,
        in_channels: usize,
        out_channels: usize,
        dropout: bool,
    ) -> Result<Self, BuildError> {
        let kernel = params.get_with_shape(
            &format!("{prefix}.deconv.kernel"),
            &[4, 4, out_channels, in_channels],
        )?;
        let deconv = ConvTranspose2d::from_weight(kernel.clone(), None, 2);
        let norm = norm_from_params(params, &format!("{prefix}.norm"), out_channels)?;
        Ok(Self {
            deconv,
            norm,
            dropout: dropout.then(|| Dropout::new(0.5)),
        })
    }

    pub fn out_channels(&self) -> usize {
        self.deconv.out_channels()
    }
}

impl Module for Upsample {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        let x = self.deconv.forward(input)?;
        let x = self.norm.forward(&x)?;
        let x = match self.dropout {
            Some(ref dropout) => dropout.forward(&x)?,
            None => x,
        };
        relu(&x)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.deconv.parameters();
        params.extend(self.norm.parameters());
        params
    }
}

/// Shape-preserving refinement block: two biased 3x3 convolutions, each
/// batch-normalized and leaky-rectified at slope [`RESIDUAL_SLOPE`], with
/// an identity shortcut added before the final rectification.
#[derive(Debug)]
pub struct ResidualBlock {
    conv1: Conv2d,
    norm1: BatchNorm2d,
    conv2: Conv2d,
    norm2: BatchNorm2d,
}

impl ResidualBlock {
    /// Bind from `{prefix}.conv{1,2}.{kernel,bias}` and
    /// `{prefix}.norm{1,2}.*`. Channel count is preserved end to end.
    pub fn from_params(
        params: &ParameterSet,
        prefix: &str,
        channels: usize,
    ) -> Result<Self, BuildError> {
        let bind_conv = |idx: u8| -> Result<Conv2d, BuildError> {
            let kernel = params.get_with_shape(
                &format!("{prefix}.conv{idx}.kernel"),
                &[3, 3, channels, channels],
            )?;
            let bias = params.get_with_shape(&format!("{prefix}.conv{idx}.bias"), &[channels])?;
            Ok(Conv2d::from_weight(kernel.clone(), Some(bias.clone()), 1))
        };

        Ok(Self {
            conv1: bind_conv(1)?,
            norm1: norm_from_params(params, &format!("{prefix}.norm1"), channels)?,
            conv2: bind_conv(2)?,
            norm2: norm_from_params(params, &format!("{prefix}.norm2"), channels)?,
        })
    }

    pub fn channels(&self) -> usize {
        self.conv1.out_channels()
    }
}

impl Module for ResidualBlock {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        let x = self.conv1.forward(input)?;
        let x = self.norm1.forward(&x)?;
        let x = leaky_relu(&x, RESIDUAL_SLOPE)?;
        let x = self.conv2.forward(&x)?;
        let x = self.norm2.forward(&x)?;
        let x = x.add(input)?;
        leaky_relu(&x, RESIDUAL_SLOPE)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = self.conv1.parameters();
        params.extend(self.norm1.parameters());
        params.extend(self.conv2.parameters());
        params.extend(self.norm2.parameters());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_norm(out: &mut Vec<(String, Tensor)>, prefix: &str, channels: usize) {
        let zeros = Tensor::zeros(&[channels], chroma_core::DType::F32);
        out.push((format!("{prefix}.gamma"), Tensor::ones(&[channels])));
        out.push((format!("{prefix}.beta"), zeros.clone()));
        out.push((format!("{prefix}.moving_mean"), zeros));
        out.push((format!("{prefix}.moving_variance"), Tensor::ones(&[channels])));
    }

    fn down_params(prefix: &str, cin: usize, cout: usize, normalize: bool) -> ParameterSet {
        let mut t = vec![(
            format!("{prefix}.conv.kernel"),
            Tensor::zeros(&[4, 4, cin, cout], chroma_core::DType::F32),
        )];
        if normalize {
            push_norm(&mut t, &format!("{prefix}.norm"), cout);
        }
        ParameterSet::from_tensors(t)
    }

    fn res_params(prefix: &str, channels: usize) -> Vec<(String, Tensor)> {
        let mut t = Vec::new();
        for idx in 1..=2 {
            t.push((
                format!("{prefix}.conv{idx}.kernel"),
                Tensor::zeros(&[3, 3, channels, channels], chroma_core::DType::F32),
            ));
            t.push((
                format!("{prefix}.conv{idx}.bias"),
                Tensor::zeros(&[channels], chroma_core::DType::F32),
            ));
            push_norm(&mut t, &format!("{prefix}.norm{idx}"), channels);
        }
        t
    }

    #[test]
    fn test_downsample_halves() {
        let params = down_params("down1", 3, 8, true);
        let block = Downsample::from_params(&params, "down1", 3, 8, true).unwrap();
        let out = block.forward(&Tensor::ones(&[1, 8, 8, 3])).unwrap();
        assert_eq!(out.shape().dims(), &[1, 4, 4, 8]);
        assert_eq!(block.out_channels(), 8);
    }

    #[test]
    fn test_downsample_without_norm() {
        let params = down_params("down0", 3, 8, false);
        let block = Downsample::from_params(&params, "down0", 3, 8, false).unwrap();
        assert_eq!(block.parameters().len(), 1);
        assert!(block.forward(&Tensor::ones(&[1, 4, 4, 3])).is_ok());
    }

    #[test]
    fn test_downsample_rejects_odd_extent() {
        let params = down_params("down1", 3, 8, true);
        let block = Downsample::from_params(&params, "down1", 3, 8, true).unwrap();
        assert!(block.forward(&Tensor::ones(&[1, 7, 8, 3])).is_err());
    }

    #[test]
    fn test_downsample_missing_kernel() {
        let params = ParameterSet::from_tensors([]);
        let err = Downsample::from_params(&params, "down1", 3, 8, true).unwrap_err();
        assert!(matches!(err, BuildError::MissingParameter { .. }));
    }

    #[test]
    fn test_downsample_kernel_shape_checked() {
        let params = down_params("down1", 4, 8, true);
        let err = Downsample::from_params(&params, "down1", 3, 8, true).unwrap_err();
        assert!(matches!(err, BuildError::ParameterShape { .. }));
    }

    #[test]
    fn test_upsample_doubles() {
        let mut t = vec![(
            "up0.deconv.kernel".to_string(),
            Tensor::zeros(&[4, 4, 4, 8], chroma_core::DType::F32),
        )];
        push_norm(&mut t, "up0.norm", 4);
        let params = ParameterSet::from_tensors(t);
        let block = Upsample::from_params(&params, "up0", 8, 4, true).unwrap();
        let out = block.forward(&Tensor::ones(&[1, 2, 2, 8])).unwrap();
        assert_eq!(out.shape().dims(), &[1, 4, 4, 4]);
        assert_eq!(block.out_channels(), 4);
    }

    #[test]
    fn test_residual_zero_weights_is_rectified_shortcut() {
        // All-zero convolutions with identity statistics reduce the block
        // to leaky_relu(x, 0.2) through the shortcut.
        let params = ParameterSet::from_tensors(res_params("res", 2));
        let block = ResidualBlock::from_params(&params, "res", 2).unwrap();
        let input = Tensor::from_f32(&[1.0, -1.0, 0.5, -0.5], &[1, 1, 2, 2]);
        let out = block.forward(&input).unwrap();
        let data = out.as_f32_slice().unwrap();
        assert!((data[0] - 1.0).abs() < 1e-6);
        assert!((data[1] + 0.2).abs() < 1e-6);
        assert!((data[2] - 0.5).abs() < 1e-6);
        assert!((data[3] + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_residual_transforms_with_nonzero_weights() {
        let mut t = res_params("res", 1);
        for (name, tensor) in &mut t {
            if name.ends_with(".kernel") {
                *tensor = Tensor::full(&[3, 3, 1, 1], 0.1);
            }
        }
        let params = ParameterSet::from_tensors(t);
        let block = ResidualBlock::from_params(&params, "res", 1).unwrap();
        let input = Tensor::ones(&[1, 3, 3, 1]);
        let out = block.forward(&input).unwrap();
        let shortcut = leaky_relu(&input, RESIDUAL_SLOPE).unwrap();
        assert_ne!(
            out.as_f32_slice().unwrap(),
            shortcut.as_f32_slice().unwrap()
        );
    }

    #[test]
    fn test_residual_preserves_shape() {
        let params = ParameterSet::from_tensors(res_params("res", 4));
        let block = ResidualBlock::from_params(&params, "res", 4).unwrap();
        let out = block.forward(&Tensor::ones(&[1, 6, 6, 4])).unwrap();
        assert_eq!(out.shape().dims(), &[1, 6, 6, 4]);
        assert_eq!(block.channels(), 4);
    }

    #[test]
    fn test_residual_parameter_count() {
        let params = ParameterSet::from_tensors(res_params("res", 2));
        let block = ResidualBlock::from_params(&params, "res", 2).unwrap();
        // 2 convs (kernel + bias) + 2 norms (4 stats each)
        assert_eq!(block.parameters().len(), 12);
    }
}
