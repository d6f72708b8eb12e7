use std::fmt;

use smallvec::SmallVec;

use crate::dtype::DType;
use crate::error::ChromaError;
use crate::shape::Shape;
use crate::storage::Storage;
use crate::Result;

/// A multi-dimensional array — the fundamental data structure in Chroma.
///
/// Tensors are f32 buffers in row-major layout; the colorization network
/// uses the NHWC (batch, height, width, channel) convention throughout.
/// Reshape produces zero-copy views sharing the same storage.
///
/// # Examples
///
/// ```
/// use chroma_core::Tensor;
///
/// let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
/// assert_eq!(t.shape().dims(), &[2, 2]);
/// assert_eq!(t.numel(), 4);
///
/// // Reshape (zero-copy view)
/// let flat = t.reshape(&[4]).unwrap();
/// assert_eq!(flat.shape().dims(), &[4]);
/// ```
#[derive(Clone)]
pub struct Tensor {
    storage: Storage,
    shape: Shape,
    strides: SmallVec<[usize; 4]>,
    offset: usize,
}

impl Tensor {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a tensor from f32 data with the given shape.
    pub fn from_f32(data: &[f32], shape: &[usize]) -> Self {
        let s = Shape::new(shape);
        assert_eq!(
            s.numel(),
            data.len(),
            "Shape {:?} requires {} elements, got {}",
            shape,
            s.numel(),
            data.len()
        );
        let strides = s.contiguous_strides();
        Self {
            storage: Storage::from_f32(data),
            shape: s,
            strides,
            offset: 0,
        }
    }

    /// Create a tensor of zeros with the given shape and dtype.
    pub fn zeros(shape: &[usize], dtype: DType) -> Self {
        let s = Shape::new(shape);
        let strides = s.contiguous_strides();
        Self {
            storage: Storage::zeros(dtype, s.numel()),
            shape: s,
            strides,
            offset: 0,
        }
    }

    /// Create a tensor of ones (f32).
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    /// Create a tensor filled with a constant (f32).
    pub fn full(shape: &[usize], value: f32) -> Self {
        let s = Shape::new(shape);
        let data: Vec<f32> = vec![value; s.numel()];
        Self::from_f32(&data, shape)
    }

    /// Create a tensor with random values from standard normal distribution N(0,1).
    pub fn randn(shape: &[usize]) -> Self {
        use rand::Rng;
        let s = Shape::new(shape);
        let numel = s.numel();
        let mut rng = rand::thread_rng();
        // Box-Muller transform for normal distribution
        let data: Vec<f32> = (0..numel)
            .map(|_| {
                let u1: f32 = rng.gen_range(1e-7f32..1.0f32);
                let u2: f32 = rng.gen_range(0.0f32..std::f32::consts::TAU);
                (-2.0 * u1.ln()).sqrt() * u2.cos()
            })
            .collect();
        Self::from_f32(&data, shape)
    }

    /// Create a tensor from pre-built Storage and shape.
    pub fn from_storage(storage: Storage, shape: &[usize]) -> Result<Self> {
        let s = Shape::new(shape);
        if storage.numel() != s.numel() {
            return Err(ChromaError::StorageError(format!(
                "storage holds {} elements, shape {:?} requires {}",
                storage.numel(),
                shape,
                s.numel()
            )));
        }
        let strides = s.contiguous_strides();
        Ok(Self {
            storage,
            shape: s,
            strides,
            offset: 0,
        })
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Shape of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// Data type.
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Strides (in elements, not bytes).
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Whether this tensor is contiguous in memory (row-major).
    pub fn is_contiguous(&self) -> bool {
        self.strides == self.shape.contiguous_strides() && self.offset == 0
    }

    // =========================================================================
    // Data access
    // =========================================================================

    /// Get the underlying f32 data as a slice (contiguous tensors only).
    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        if !self.is_contiguous() {
            return None;
        }
        self.storage.as_f32_slice()
    }

    /// Get a mutable f32 slice (contiguous, copy-on-write).
    pub fn as_f32_slice_mut(&mut self) -> Option<&mut [f32]> {
        if !self.is_contiguous() {
            return None;
        }
        self.storage.as_f32_slice_mut()
    }

    /// Get a single f32 element by flat index.
    pub fn get_f32(&self, flat_index: usize) -> Option<f32> {
        let slice = self.storage.as_f32_slice()?;
        let physical = self.flat_to_physical(flat_index)?;
        slice.get(physical).copied()
    }

    /// Convert flat logical index to physical storage index.
    fn flat_to_physical(&self, flat_index: usize) -> Option<usize> {
        if self.shape.is_scalar() {
            return if flat_index == 0 {
                Some(self.offset)
            } else {
                None
            };
        }

        if flat_index >= self.numel() {
            return None;
        }

        let mut remaining = flat_index;
        let mut physical = self.offset;
        let contiguous_strides = self.shape.contiguous_strides();

        for (i, &cs) in contiguous_strides.iter().enumerate() {
            let idx = remaining / cs;
            remaining %= cs;
            physical += idx * self.strides[i];
        }

        Some(physical)
    }

    // =========================================================================
    // Shape operations (zero-copy views)
    // =========================================================================

    /// Reshape the tensor (zero-copy if contiguous).
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Tensor> {
        let resolved = self.shape.resolve_reshape(new_shape).ok_or_else(|| {
            ChromaError::InvalidReshape {
                numel: self.numel(),
                shape: new_shape.iter().map(|&d| d.unsigned_abs()).collect(),
            }
        })?;

        if !self.is_contiguous() {
            return Err(ChromaError::StorageError(
                "cannot reshape non-contiguous tensor (call .contiguous() first)".into(),
            ));
        }

        let strides = resolved.contiguous_strides();
        Ok(Tensor {
            storage: self.storage.clone(), // Arc clone — shared data
            shape: resolved,
            strides,
            offset: self.offset,
        })
    }

    /// Return a contiguous copy of this tensor if it isn't already contiguous.
    pub fn contiguous(&self) -> Tensor {
        if self.is_contiguous() {
            return self.clone();
        }

        let numel = self.numel();
        let mut data = vec![0.0f32; numel];
        for (i, slot) in data.iter_mut().enumerate() {
            *slot = self
                .get_f32(i)
                .expect("contiguous: index out of bounds during copy");
        }
        Tensor::from_f32(&data, self.shape.dims())
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tensor(shape={}, dtype={}, contiguous={})",
            self.shape,
            self.dtype(),
            self.is_contiguous(),
        )
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(data) = self.as_f32_slice() {
            if self.numel() <= 20 {
                write!(f, "tensor({:?}, shape={})", data, self.shape)
            } else {
                write!(
                    f,
                    "tensor([{:.4}, {:.4}, ..., {:.4}], shape={})",
                    data[0],
                    data[1],
                    data[self.numel() - 1],
                    self.shape
                )
            }
        } else {
            write!(f, "tensor(shape={}, dtype={})", self.shape, self.dtype())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.numel(), 6);
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.is_contiguous());
    }

    #[test]
    fn test_zeros() {
        let t = Tensor::zeros(&[3, 4], DType::F32);
        assert_eq!(t.numel(), 12);
        let data = t.as_f32_slice().unwrap();
        assert!(data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_full() {
        let t = Tensor::full(&[2, 2], 0.5);
        let data = t.as_f32_slice().unwrap();
        assert_eq!(data, &[0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_reshape() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let r = t.reshape(&[3, 2]).unwrap();
        assert_eq!(r.shape().dims(), &[3, 2]);
        assert_eq!(r.as_f32_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_reshape_infer() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let r = t.reshape(&[-1, 2]).unwrap();
        assert_eq!(r.shape().dims(), &[3, 2]);
    }

    #[test]
    fn test_reshape_shares_storage() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[1, 2, 2, 1]);
        let v = t.reshape(&[2, 2]).unwrap();
        assert_eq!(v.get_f32(3), Some(4.0));
        // Both views observe the same underlying bytes
        assert_eq!(t.as_f32_slice().unwrap(), v.as_f32_slice().unwrap());
    }

    #[test]
    fn test_reshape_bad_target() {
        let t = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        assert!(t.reshape(&[3, 2]).is_err());
    }

    #[test]
    fn test_from_storage_mismatch() {
        let s = Storage::from_f32(&[1.0, 2.0, 3.0]);
        assert!(Tensor::from_storage(s, &[2, 2]).is_err());
    }

    #[test]
    fn test_randn_shape() {
        let t = Tensor::randn(&[4, 4]);
        assert_eq!(t.numel(), 16);
        assert!(t.as_f32_slice().unwrap().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_debug_display() {
        let t = Tensor::from_f32(&[1.0, 2.0], &[2]);
        let debug = format!("{:?}", t);
        assert!(debug.contains("Tensor"));
        assert!(debug.contains("f32"));

        let display = format!("{}", t);
        assert!(display.contains("tensor"));
    }
}
