//! The end-to-end colorizer.

use std::time::Instant;

use image::{DynamicImage, Rgb32FImage, RgbImage};

use chroma_nn::{BuildError, Generator, GeneratorConfig, Module, ParameterSet};

use crate::config::ColorizerConfig;
use crate::convert::{self, ChannelOrder};
use crate::error::PipelineError;

/// A ready-to-serve colorization pipeline.
///
/// Construction loads the parameter artifact and assembles the generator
/// exactly once; any missing or mis-shaped tensor fails here, never during
/// a call. The assembled pipeline is immutable, so one instance behind an
/// `Arc` serves concurrent [`colorize`](Self::colorize) calls.
pub struct Colorizer {
    generator: Generator,
    input_size: u32,
    channel_order: ChannelOrder,
}

impl std::fmt::Debug for Colorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Colorizer")
            .field("input_size", &self.input_size)
            .field("channel_order", &self.channel_order)
            .finish_non_exhaustive()
    }
}

impl Colorizer {
    /// Load the artifact named by `config` and assemble the pipeline.
    pub fn new(config: ColorizerConfig) -> Result<Self, PipelineError> {
        let start = Instant::now();
        let params = ParameterSet::load(&config.weights_path)?;
        let mut colorizer = Self::from_parameters(config.generator, &params, config.input_size)?;
        colorizer.channel_order = config.channel_order;
        tracing::info!(
            path = %config.weights_path.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "colorizer ready"
        );
        Ok(colorizer)
    }

    /// Assemble from an already-loaded parameter set.
    pub fn from_parameters(
        generator: GeneratorConfig,
        params: &ParameterSet,
        input_size: u32,
    ) -> Result<Self, PipelineError> {
        let factor = generator.stride_factor();
        if input_size == 0 || input_size as usize % factor != 0 {
            return Err(PipelineError::Build(BuildError::Config(format!(
                "working resolution {input_size} is not divisible by the stride factor {factor}"
            ))));
        }
        let generator = Generator::from_params(generator, params)?;
        Ok(Self {
            generator,
            input_size,
            channel_order: ChannelOrder::default(),
        })
    }

    /// The assembled generator.
    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Square working resolution of the forward pass.
    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Colorize one image.
    ///
    /// The input is resized to the working resolution for the forward pass
    /// and the result is resized back, so the output always matches the
    /// input dimensions. Values are the generator's native [-1, 1] floats;
    /// use [`colorize_rgb8`](Self::colorize_rgb8) for display bytes.
    pub fn colorize(&self, image: &DynamicImage) -> Result<Rgb32FImage, PipelineError> {
        let start = Instant::now();
        let (width, height) = (image.width(), image.height());

        let input = convert::image_to_tensor(image, self.input_size, self.channel_order)?;
        let output = self.generator.forward(&input)?;
        let working = convert::tensor_to_image(&output, self.channel_order)?;
        let result = if (working.width(), working.height()) == (width, height) {
            working
        } else {
            convert::resize_image(&working, width, height)
        };

        tracing::debug!(
            width,
            height,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "colorized image"
        );
        Ok(result)
    }

    /// [`colorize`](Self::colorize) followed by the [-1, 1] to 8-bit
    /// mapping.
    pub fn colorize_rgb8(&self, image: &DynamicImage) -> Result<RgbImage, PipelineError> {
        Ok(convert::to_rgb8(&self.colorize(image)?))
    }
}
