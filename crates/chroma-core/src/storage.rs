use std::sync::Arc;

use crate::{ChromaError, DType, Result};

/// Backing storage for tensor data.
///
/// Storage is reference-counted (`Arc`) so multiple tensors can share the same
/// underlying data (e.g., reshape views, or layer weights referenced from a
/// loaded parameter set).
#[derive(Debug, Clone)]
pub struct Storage {
    data: Arc<Vec<u8>>,
    dtype: DType,
    /// Number of logical elements (not bytes).
    numel: usize,
}

impl Storage {
    /// Allocate new zeroed storage for `numel` elements of the given dtype.
    pub fn zeros(dtype: DType, numel: usize) -> Self {
        let nbytes = dtype.storage_bytes(numel);
        Self {
            data: Arc::new(vec![0u8; nbytes]),
            dtype,
            numel,
        }
    }

    /// Create storage from raw bytes.
    pub fn from_bytes(dtype: DType, numel: usize, bytes: Vec<u8>) -> Result<Self> {
        let expected = dtype.storage_bytes(numel);
        if bytes.len() != expected {
            return Err(ChromaError::StorageError(format!(
                "expected {} bytes for {} elements of {}, got {}",
                expected,
                numel,
                dtype,
                bytes.len()
            )));
        }
        Ok(Self {
            data: Arc::new(bytes),
            dtype,
            numel,
        })
    }

    /// Create storage from a slice of f32 values.
    pub fn from_f32(data: &[f32]) -> Self {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self {
            data: Arc::new(bytes),
            dtype: DType::F32,
            numel: data.len(),
        }
    }

    /// Create storage from a slice of f64 values.
    pub fn from_f64(data: &[f64]) -> Self {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self {
            data: Arc::new(bytes),
            dtype: DType::F64,
            numel: data.len(),
        }
    }

    /// Get the dtype of this storage.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Size in bytes.
    pub fn nbytes(&self) -> usize {
        self.data.len()
    }

    /// Get a read-only reference to the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the raw bytes.
    /// Clones the underlying data if there are other references (copy-on-write).
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Interpret storage as a slice of f32 values.
    /// Returns None if dtype is not F32.
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        if self.dtype != DType::F32 {
            return None;
        }
        if self.numel == 0 {
            return Some(&[]);
        }
        Some(bytemuck::cast_slice(self.as_bytes()))
    }

    /// Interpret storage as a mutable slice of f32 values (copy-on-write).
    pub fn as_f32_slice_mut(&mut self) -> Option<&mut [f32]> {
        if self.dtype != DType::F32 {
            return None;
        }
        if self.numel == 0 {
            return Some(&mut []);
        }
        Some(bytemuck::cast_slice_mut(self.as_bytes_mut()))
    }

    /// Interpret storage as a slice of f64 values.
    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        if self.dtype != DType::F64 {
            return None;
        }
        if self.numel == 0 {
            return Some(&[]);
        }
        Some(bytemuck::cast_slice(self.as_bytes()))
    }

    /// Whether this storage is uniquely owned (no other Arc references).
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.data) == 1
    }
}
