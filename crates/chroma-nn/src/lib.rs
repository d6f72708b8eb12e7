//! # chroma-nn
//!
//! Inference-only neural network layers for the Chroma colorization engine:
//! convolutional primitives, the Downsample/Upsample/Residual building
//! blocks, the fixed encoder-decoder generator topology, and the frozen
//! parameter store that feeds it.

pub mod activations;
pub mod blocks;
pub mod conv;
pub mod dropout;
pub mod error;
pub mod generator;
pub mod module;
pub mod norm;
pub mod params;

pub use blocks::{Downsample, ResidualBlock, Upsample};
pub use conv::{Conv2d, ConvTranspose2d};
pub use dropout::Dropout;
pub use error::BuildError;
pub use generator::{Generator, GeneratorConfig};
pub use module::Module;
pub use norm::BatchNorm2d;
pub use params::ParameterSet;
