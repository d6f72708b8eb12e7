//! Tensor manipulation: concatenation.

use crate::error::ChromaError;
use crate::tensor::Tensor;
use crate::Result;

impl Tensor {
    /// Concatenate tensors along a given axis.
    ///
    /// All tensors must have the same shape except along `axis`. Negative
    /// axes count from the back, so `-1` is the channel axis in NHWC —
    /// the only concatenation the skip connections perform.
    pub fn cat(tensors: &[&Tensor], axis: isize) -> Result<Tensor> {
        if tensors.is_empty() {
            return Err(ChromaError::StorageError("cat: empty tensor list".into()));
        }
        let first = tensors[0];
        let ndim = first.ndim();
        if ndim == 0 {
            return Err(ChromaError::StorageError(
                "cat: cannot concatenate scalars".into(),
            ));
        }

        let axis = if axis < 0 {
            let resolved = ndim as isize + axis;
            if resolved < 0 {
                return Err(ChromaError::InvalidAxis {
                    axis: axis.unsigned_abs(),
                    ndim,
                });
            }
            resolved as usize
        } else {
            axis as usize
        };
        if axis >= ndim {
            return Err(ChromaError::InvalidAxis { axis, ndim });
        }

        // Validate shapes match on all non-cat axes
        for t in &tensors[1..] {
            if t.ndim() != ndim {
                return Err(ChromaError::ShapeMismatch {
                    expected: first.shape().dims().to_vec(),
                    got: t.shape().dims().to_vec(),
                });
            }
            for d in 0..ndim {
                if d != axis && t.shape().dims()[d] != first.shape().dims()[d] {
                    return Err(ChromaError::ShapeMismatch {
                        expected: first.shape().dims().to_vec(),
                        got: t.shape().dims().to_vec(),
                    });
                }
            }
        }

        // Compute output shape
        let mut out_shape: Vec<usize> = first.shape().dims().to_vec();
        let cat_dim: usize = tensors.iter().map(|t| t.shape().dims()[axis]).sum();
        out_shape[axis] = cat_dim;

        let numel: usize = out_shape.iter().product();
        let mut result = vec![0.0f32; numel];

        let outer: usize = out_shape[..axis].iter().product();
        let inner: usize = out_shape[axis + 1..].iter().product();

        let mut cat_offset = 0;
        for t in tensors {
            let t_cont = t.contiguous();
            let t_data = t_cont
                .as_f32_slice()
                .ok_or(ChromaError::UnsupportedDType(t.dtype()))?;
            let t_axis_size = t.shape().dims()[axis];

            for o in 0..outer {
                for a in 0..t_axis_size {
                    let src_start = (o * t_axis_size + a) * inner;
                    let dst_start = (o * cat_dim + (cat_offset + a)) * inner;
                    result[dst_start..dst_start + inner]
                        .copy_from_slice(&t_data[src_start..src_start + inner]);
                }
            }
            cat_offset += t_axis_size;
        }

        Ok(Tensor::from_f32(&result, &out_shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cat_channel_axis() {
        // Two NHWC maps, 1x2x2 spatial, 1 and 2 channels
        let a = Tensor::from_f32(&[1.0, 2.0, 3.0, 4.0], &[1, 2, 2, 1]);
        let b = Tensor::from_f32(
            &[10.0, 11.0, 20.0, 21.0, 30.0, 31.0, 40.0, 41.0],
            &[1, 2, 2, 2],
        );
        let c = Tensor::cat(&[&a, &b], -1).unwrap();
        assert_eq!(c.shape().dims(), &[1, 2, 2, 3]);
        assert_eq!(
            c.as_f32_slice().unwrap(),
            &[1.0, 10.0, 11.0, 2.0, 20.0, 21.0, 3.0, 30.0, 31.0, 4.0, 40.0, 41.0]
        );
    }

    #[test]
    fn test_cat_first_axis() {
        let a = Tensor::from_f32(&[1.0, 2.0], &[1, 2]);
        let b = Tensor::from_f32(&[3.0, 4.0], &[1, 2]);
        let c = Tensor::cat(&[&a, &b], 0).unwrap();
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.as_f32_slice().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_cat_mismatched_spatial() {
        let a = Tensor::zeros(&[1, 2, 2, 1], crate::DType::F32);
        let b = Tensor::zeros(&[1, 3, 2, 1], crate::DType::F32);
        let err = Tensor::cat(&[&a, &b], -1).unwrap_err();
        assert!(matches!(err, ChromaError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_cat_bad_axis() {
        let a = Tensor::zeros(&[2, 2], crate::DType::F32);
        assert!(Tensor::cat(&[&a, &a], 5).is_err());
        assert!(Tensor::cat(&[&a, &a], -3).is_err());
    }

    #[test]
    fn test_cat_empty() {
        assert!(Tensor::cat(&[], 0).is_err());
    }
}
