//! Pipeline configuration.

use std::path::PathBuf;

use chroma_nn::GeneratorConfig;

use crate::convert::ChannelOrder;

/// Default working resolution of the shipped network.
pub const DEFAULT_INPUT_SIZE: u32 = 256;

/// Configuration for a [`crate::Colorizer`].
#[derive(Debug, Clone)]
pub struct ColorizerConfig {
    /// Path to the safetensors parameter artifact.
    pub weights_path: PathBuf,
    /// Square working resolution every input is resized to before the
    /// forward pass. Must be divisible by the generator's stride factor.
    pub input_size: u32,
    /// Channel order the parameters were trained against.
    pub channel_order: ChannelOrder,
    /// Channel plan of the generator to assemble.
    pub generator: GeneratorConfig,
}

impl ColorizerConfig {
    /// Configuration with the default working resolution and channel plan.
    pub fn new(weights_path: impl Into<PathBuf>) -> Self {
        Self {
            weights_path: weights_path.into(),
            input_size: DEFAULT_INPUT_SIZE,
            channel_order: ChannelOrder::default(),
            generator: GeneratorConfig::default(),
        }
    }

    /// Override the working resolution.
    pub fn with_input_size(mut self, input_size: u32) -> Self {
        self.input_size = input_size;
        self
    }

    /// Override the channel order.
    pub fn with_channel_order(mut self, channel_order: ChannelOrder) -> Self {
        self.channel_order = channel_order;
        self
    }

    /// Override the generator channel plan.
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }
}
