use std::fmt;

/// Element type of a tensor.
///
/// The inference engine computes exclusively in `F32`; `F64` exists for
/// host-side construction convenience and is widened on ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub fn element_size(&self) -> usize {
        match self {
            DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    /// Bytes needed to store `n` elements.
    pub fn storage_bytes(&self, n: usize) -> usize {
        n * self.element_size()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}
