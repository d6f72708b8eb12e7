//! The colorization generator: a fixed encoder-decoder topology with skip
//! connections and interleaved residual refinement.
//!
//! The encoder halves resolution at each stage while widening channels;
//! the decoder mirrors it, concatenating each upsampled tensor with the
//! encoder output of matching resolution before refining it. A final
//! transposed convolution restores full resolution and a tanh bounds the
//! output to [-1, 1].

use chroma_core::{ChromaError, Tensor};

use crate::activations::tanh;
use crate::blocks::{Downsample, ResidualBlock, Upsample};
use crate::conv::ConvTranspose2d;
use crate::error::BuildError;
use crate::module::Module;
use crate::params::ParameterSet;

/// Channel plan and residual thresholds for the generator.
///
/// The default mirrors the shipped colorization network; alternate plans
/// exist mostly for tests that need a cheaper topology.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Output channels of each encoder stage, shallow to deep.
    pub down_channels: Vec<usize>,
    /// Output channels of each decoder stage. One fewer than the encoder:
    /// the deepest encoder output enters the decoder directly, and the
    /// final transposed convolution provides the last doubling.
    pub up_channels: Vec<usize>,
    /// Encoder stages gain a residual block while their width is at or
    /// below this.
    pub encoder_residual_max: usize,
    /// Decoder stages gain a residual block while their post-concatenation
    /// width is at or below this.
    pub decoder_residual_max: usize,
    /// Channels of the network input.
    pub input_channels: usize,
    /// Channels of the network output.
    pub output_channels: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            down_channels: vec![64, 128, 256, 512, 512],
            up_channels: vec![512, 512, 256, 128],
            encoder_residual_max: 512,
            decoder_residual_max: 1024,
            input_channels: 3,
            output_channels: 3,
        }
    }
}

impl GeneratorConfig {
    fn validate(&self) -> Result<(), BuildError> {
        if self.down_channels.is_empty() {
            return Err(BuildError::Config("encoder has no stages".into()));
        }
        if self.up_channels.len() + 1 != self.down_channels.len() {
            return Err(BuildError::Config(format!(
                "decoder has {} stages, encoder with {} stages requires {}",
                self.up_channels.len(),
                self.down_channels.len(),
                self.down_channels.len() - 1
            )));
        }
        if self.input_channels == 0 || self.output_channels == 0 {
            return Err(BuildError::Config("channel counts must be positive".into()));
        }
        if self
            .down_channels
            .iter()
            .chain(&self.up_channels)
            .any(|&c| c == 0)
        {
            return Err(BuildError::Config("stage widths must be positive".into()));
        }
        Ok(())
    }

    /// Every input extent must be divisible by this for the skip pairing
    /// to line up: one halving per encoder stage.
    pub fn stride_factor(&self) -> usize {
        1 << self.down_channels.len()
    }

    /// A complete [`ParameterSet`] for this plan with all weights zero and
    /// identity normalization statistics. Forwarding any input through the
    /// resulting generator yields zeros, which makes wiring verifiable
    /// without a trained artifact.
    pub fn zeroed_parameters(&self) -> ParameterSet {
        let mut tensors: Vec<(String, Tensor)> = Vec::new();
        let zeros = |shape: &[usize]| Tensor::zeros(shape, chroma_core::DType::F32);
        let push_norm = |tensors: &mut Vec<(String, Tensor)>, prefix: &str, c: usize| {
            tensors.push((format!("{prefix}.gamma"), Tensor::ones(&[c])));
            tensors.push((format!("{prefix}.beta"), zeros(&[c])));
            tensors.push((format!("{prefix}.moving_mean"), zeros(&[c])));
            tensors.push((format!("{prefix}.moving_variance"), Tensor::ones(&[c])));
        };
        let push_res = |tensors: &mut Vec<(String, Tensor)>, prefix: &str, c: usize| {
            for idx in 1..=2 {
                tensors.push((format!("{prefix}.conv{idx}.kernel"), zeros(&[3, 3, c, c])));
                tensors.push((format!("{prefix}.conv{idx}.bias"), zeros(&[c])));
                push_norm(tensors, &format!("{prefix}.norm{idx}"), c);
            }
        };

        let mut in_ch = self.input_channels;
        for (i, &out_ch) in self.down_channels.iter().enumerate() {
            tensors.push((format!("down{i}.conv.kernel"), zeros(&[4, 4, in_ch, out_ch])));
            if i > 0 {
                push_norm(&mut tensors, &format!("down{i}.norm"), out_ch);
            }
            if out_ch <= self.encoder_residual_max {
                push_res(&mut tensors, &format!("down{i}.res"), out_ch);
            }
            in_ch = out_ch;
        }

        let skips = &self.down_channels;
        for (j, &out_ch) in self.up_channels.iter().enumerate() {
            tensors.push((format!("up{j}.deconv.kernel"), zeros(&[4, 4, out_ch, in_ch])));
            push_norm(&mut tensors, &format!("up{j}.norm"), out_ch);
            let cat_ch = out_ch + skips[skips.len() - 2 - j];
            if cat_ch <= self.decoder_residual_max {
                push_res(&mut tensors, &format!("up{j}.res"), cat_ch);
            }
            in_ch = cat_ch;
        }

        tensors.push((
            "final.kernel".to_string(),
            zeros(&[4, 4, self.output_channels, in_ch]),
        ));
        tensors.push(("final.bias".to_string(), zeros(&[self.output_channels])));

        ParameterSet::from_tensors(tensors)
    }
}

#[derive(Debug)]
struct DownStage {
    block: Downsample,
    res: Option<ResidualBlock>,
}

#[derive(Debug)]
struct UpStage {
    block: Upsample,
    res: Option<ResidualBlock>,
}

/// The assembled generator. Immutable after construction; `forward` can be
/// called concurrently from multiple threads.
#[derive(Debug)]
pub struct Generator {
    downs: Vec<DownStage>,
    ups: Vec<UpStage>,
    final_deconv: ConvTranspose2d,
    config: GeneratorConfig,
}

impl Generator {
    /// Assemble the topology described by `config`, binding every layer's
    /// parameters from `params`. Fails without side effects if any tensor
    /// is missing or mis-shaped.
    pub fn from_params(config: GeneratorConfig, params: &ParameterSet) -> Result<Self, BuildError> {
        config.validate()?;

        let mut downs = Vec::with_capacity(config.down_channels.len());
        let mut in_ch = config.input_channels;
        for (i, &out_ch) in config.down_channels.iter().enumerate() {
            let prefix = format!("down{i}");
            let block = Downsample::from_params(params, &prefix, in_ch, out_ch, i > 0)?;
            let res = if out_ch <= config.encoder_residual_max {
                Some(ResidualBlock::from_params(
                    params,
                    &format!("{prefix}.res"),
                    out_ch,
                )?)
            } else {
                None
            };
            downs.push(DownStage { block, res });
            in_ch = out_ch;
        }

        let mut ups = Vec::with_capacity(config.up_channels.len());
        for (j, &out_ch) in config.up_channels.iter().enumerate() {
            let prefix = format!("up{j}");
            let block = Upsample::from_params(params, &prefix, in_ch, out_ch, j == 0)?;
            let skip_ch = config.down_channels[config.down_channels.len() - 2 - j];
            let cat_ch = out_ch + skip_ch;
            let res = if cat_ch <= config.decoder_residual_max {
                Some(ResidualBlock::from_params(
                    params,
                    &format!("{prefix}.res"),
                    cat_ch,
                )?)
            } else {
                None
            };
            ups.push(UpStage { block, res });
            in_ch = cat_ch;
        }

        let kernel =
            params.get_with_shape("final.kernel", &[4, 4, config.output_channels, in_ch])?;
        let bias = params.get_with_shape("final.bias", &[config.output_channels])?;
        let final_deconv = ConvTranspose2d::from_weight(kernel.clone(), Some(bias.clone()), 2);

        tracing::debug!(
            down_stages = downs.len(),
            up_stages = ups.len(),
            "generator assembled"
        );

        Ok(Self {
            downs,
            ups,
            final_deconv,
            config,
        })
    }

    /// The channel plan this generator was assembled from.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn check_input(&self, input: &Tensor) -> chroma_core::Result<()> {
        let dims = input.shape().dims();
        let factor = self.config.stride_factor();
        let ok = dims.len() == 4
            && dims[3] == self.config.input_channels
            && dims[1] > 0
            && dims[2] > 0
            && dims[1] % factor == 0
            && dims[2] % factor == 0;
        if !ok {
            return Err(ChromaError::ShapeMismatch {
                expected: vec![dims.first().copied().unwrap_or(1), factor, factor, self.config.input_channels],
                got: dims.to_vec(),
            });
        }
        Ok(())
    }
}

impl Module for Generator {
    /// Full forward pass: `[batch, h, w, in]` to `[batch, h, w, out]` with
    /// every value in [-1, 1]. Both extents must be divisible by
    /// [`GeneratorConfig::stride_factor`].
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        self.check_input(input)?;

        let mut x = input.clone();
        let mut skips: Vec<Tensor> = Vec::with_capacity(self.downs.len());
        for (i, stage) in self.downs.iter().enumerate() {
            x = stage.block.forward(&x)?;
            if let Some(ref res) = stage.res {
                x = res.forward(&x)?;
            }
            tracing::trace!(stage = i, shape = ?x.shape(), "encoder stage");
            skips.push(x.clone());
        }

        // Deepest skip is the decoder input; the rest pair up in reverse.
        for (j, (stage, skip)) in self
            .ups
            .iter()
            .zip(skips.iter().rev().skip(1))
            .enumerate()
        {
            x = stage.block.forward(&x)?;
            x = Tensor::cat(&[&x, skip], -1)?;
            if let Some(ref res) = stage.res {
                x = res.forward(&x)?;
            }
            tracing::trace!(stage = j, shape = ?x.shape(), "decoder stage");
        }

        let x = self.final_deconv.forward(&x)?;
        tanh(&x)
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = Vec::new();
        for stage in &self.downs {
            params.extend(stage.block.parameters());
            if let Some(ref res) = stage.res {
                params.extend(res.parameters());
            }
        }
        for stage in &self.ups {
            params.extend(stage.block.parameters());
            if let Some(ref res) = stage.res {
                params.extend(res.parameters());
            }
        }
        params.extend(self.final_deconv.parameters());
        params
    }
}
