//! Pipeline-level errors.

use thiserror::Error;

use chroma_core::ChromaError;
use chroma_nn::BuildError;

/// Everything that can go wrong between an input image and a colorized
/// output. Initialization failures wrap [`BuildError`]; per-call failures
/// are input problems or tensor-level compute errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Topology assembly or parameter loading failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The input bytes could not be decoded as an image.
    #[error("failed to decode input image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input decoded but has a zero extent.
    #[error("input image has degenerate dimensions {width}x{height}")]
    DegenerateImage { width: u32, height: u32 },

    /// Tensor computation failed during the forward pass.
    #[error("inference failed: {0}")]
    Compute(#[from] ChromaError),
}
