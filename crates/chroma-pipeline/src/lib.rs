//! # chroma-pipeline
//!
//! Image-in, image-out colorization: decode, resize to the network's
//! working resolution, run the generator, and resize the result back to
//! the caller's dimensions. The [`Colorizer`] loads its parameter artifact
//! once at construction and then serves concurrent calls.

pub mod colorizer;
pub mod config;
pub mod convert;
pub mod error;

pub use colorizer::Colorizer;
pub use config::ColorizerConfig;
pub use convert::ChannelOrder;
pub use error::PipelineError;
