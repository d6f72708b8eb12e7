//! Frozen parameter storage.
//!
//! A [`ParameterSet`] is the on-disk/in-memory bridge between a training
//! artifact and the assembled topology: a flat map from layer identifiers
//! (e.g. `down0.conv.kernel`, `up2.norm.moving_variance`) to tensors.
//! Artifacts are safetensors files; f16 and bf16 payloads are widened to
//! f32 on load since the engine computes in f32 throughout.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use chroma_core::Tensor;

use crate::error::BuildError;

/// An ordered map of named parameter tensors.
#[derive(Debug)]
pub struct ParameterSet {
    tensors: BTreeMap<String, Tensor>,
}

impl ParameterSet {
    /// Build a set from already-materialized tensors.
    pub fn from_tensors(tensors: impl IntoIterator<Item = (String, Tensor)>) -> Self {
        Self {
            tensors: tensors.into_iter().collect(),
        }
    }

    /// Load a parameter artifact from a safetensors file.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let bytes = fs::read(path).map_err(|source| BuildError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = SafeTensors::deserialize(&bytes).map_err(|e| BuildError::ArtifactFormat {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let mut tensors = BTreeMap::new();
        for (name, view) in parsed.tensors() {
            let data = widen_to_f32(&view).ok_or_else(|| BuildError::ArtifactFormat {
                path: path.to_path_buf(),
                detail: format!("tensor `{name}` has unsupported dtype {:?}", view.dtype()),
            })?;
            tensors.insert(name, Tensor::from_f32(&data, view.shape()));
        }

        tracing::debug!(
            path = %path.display(),
            tensors = tensors.len(),
            "loaded parameter artifact"
        );
        Ok(Self { tensors })
    }

    /// Write the set to a safetensors file, always as f32.
    pub fn save(&self, path: &Path) -> Result<(), BuildError> {
        // TensorView borrows raw bytes, so materialize every tensor first.
        let mut buffers: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::with_capacity(self.tensors.len());
        for (name, tensor) in &self.tensors {
            let data = tensor.contiguous();
            let slice = data
                .as_f32_slice()
                .ok_or_else(|| chroma_core::ChromaError::UnsupportedDType(data.dtype()))?;
            let mut bytes = Vec::with_capacity(slice.len() * 4);
            for v in slice {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            buffers.push((name.clone(), tensor.shape().dims().to_vec(), bytes));
        }

        let views = buffers
            .iter()
            .map(|(name, shape, bytes)| {
                TensorView::new(Dtype::F32, shape.clone(), bytes).map(|v| (name.clone(), v))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BuildError::ArtifactFormat {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        let serialized =
            safetensors::serialize(views, &None).map_err(|e| BuildError::ArtifactFormat {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;

        fs::write(path, serialized).map_err(|source| BuildError::ArtifactIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up a tensor, failing with the missing identifier.
    pub fn get(&self, name: &str) -> Result<&Tensor, BuildError> {
        self.tensors
            .get(name)
            .ok_or_else(|| BuildError::MissingParameter {
                name: name.to_string(),
            })
    }

    /// Look up a tensor and verify its shape against what the topology
    /// expects at that position.
    pub fn get_with_shape(&self, name: &str, expected: &[usize]) -> Result<&Tensor, BuildError> {
        let tensor = self.get(name)?;
        if tensor.shape().dims() != expected {
            return Err(BuildError::ParameterShape {
                name: name.to_string(),
                expected: expected.to_vec(),
                got: tensor.shape().dims().to_vec(),
            });
        }
        Ok(tensor)
    }

    /// Whether the set holds a tensor under this identifier.
    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    /// Identifiers in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

fn widen_to_f32(view: &TensorView<'_>) -> Option<Vec<f32>> {
    let bytes = view.data();
    match view.dtype() {
        Dtype::F32 => Some(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        Dtype::F16 => Some(
            bytes
                .chunks_exact(2)
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
        ),
        Dtype::BF16 => Some(
            bytes
                .chunks_exact(2)
                .map(|b| half::bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
        ),
        _ => None,
    }
}
