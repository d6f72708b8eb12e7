//! Initialization-time errors: topology configuration and parameter loading.

use std::path::PathBuf;

use thiserror::Error;

use chroma_core::ChromaError;

/// Errors raised while assembling the topology or binding its parameters.
///
/// These are fatal to pipeline initialization but recoverable by the caller
/// (e.g., retry with a different artifact path). Per-call computation errors
/// use [`chroma_core::ChromaError`] instead.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Parameter artifact could not be read from disk.
    #[error("failed to read parameter artifact {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parameter artifact is not a valid safetensors file, or holds a dtype
    /// the engine cannot widen to f32.
    #[error("failed to parse parameter artifact {path}: {detail}")]
    ArtifactFormat { path: PathBuf, detail: String },

    /// The loaded set has no tensor under a layer identifier the topology
    /// requires. Binding fails fast — the topology is never partially built.
    #[error("parameter set is missing layer identifier `{name}`")]
    MissingParameter { name: String },

    /// A bound tensor exists but its shape disagrees with the topology.
    #[error("parameter `{name}` has shape {got:?}, topology expects {expected:?}")]
    ParameterShape {
        name: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// The stage configuration itself is inconsistent (skip pairing,
    /// channel bookkeeping). Detected once at assembly.
    #[error("invalid topology configuration: {0}")]
    Config(String),

    /// Tensor-level failure while materializing the topology.
    #[error(transparent)]
    Core(#[from] ChromaError),
}
