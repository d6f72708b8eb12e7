//! Convolution layers — strided `Conv2d` and transposed `ConvTranspose2d`.
//!
//! Both operate on NHWC tensors and implement "same" padding exactly:
//! a strided convolution produces `ceil(input / stride)` spatial output and
//! a transposed convolution produces `input * stride`. Skip-connection
//! concatenation depends on these sizes matching, so the pad split follows
//! the TensorFlow convention (floor of the total on the low side).

use chroma_core::{ChromaError, Tensor};

use crate::module::Module;

/// 2D convolution with "same" padding.
///
/// Input shape: `[batch, h, w, in_channels]`
/// Kernel shape: `[kh, kw, in_channels, out_channels]`
/// Output shape: `[batch, ceil(h/stride), ceil(w/stride), out_channels]`
#[derive(Debug)]
pub struct Conv2d {
    kernel: Tensor,
    bias: Option<Tensor>,
    in_channels: usize,
    out_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    stride: usize,
}

impl Conv2d {
    /// Create a Conv2d from pre-existing kernel and optional bias tensors.
    ///
    /// Kernel shape: `[kh, kw, in_channels, out_channels]`
    /// Bias shape: `[out_channels]`
    pub fn from_weight(kernel: Tensor, bias: Option<Tensor>, stride: usize) -> Self {
        let dims = kernel.shape().dims();
        assert_eq!(dims.len(), 4, "Conv2d kernel must be 4D");
        assert!(stride > 0, "Conv2d stride must be positive");
        if let Some(ref b) = bias {
            assert_eq!(b.numel(), dims[3], "Conv2d bias length must match out_channels");
        }
        Self {
            kernel_h: dims[0],
            kernel_w: dims[1],
            in_channels: dims[2],
            out_channels: dims[3],
            kernel,
            bias,
            stride,
        }
    }

    /// Kernel tensor.
    pub fn kernel(&self) -> &Tensor {
        &self.kernel
    }

    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Stride.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Spatial output size for a given input size: `ceil(input / stride)`.
    pub fn output_size(&self, in_h: usize, in_w: usize) -> (usize, usize) {
        (
            in_h.div_ceil(self.stride),
            in_w.div_ceil(self.stride),
        )
    }

    /// Total "same" padding for one spatial dimension.
    fn pad_total(&self, input: usize, output: usize, kernel: usize) -> usize {
        ((output - 1) * self.stride + kernel).saturating_sub(input)
    }
}

impl Module for Conv2d {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        let data = input.contiguous();
        let dims = data.shape().dims().to_vec();
        if dims.len() != 4 || dims[3] != self.in_channels || dims[1] == 0 || dims[2] == 0 {
            return Err(ChromaError::ShapeMismatch {
                expected: vec![0, 0, 0, self.in_channels],
                got: dims,
            });
        }

        let (batch, in_h, in_w) = (dims[0], dims[1], dims[2]);
        let (out_h, out_w) = self.output_size(in_h, in_w);
        let pad_top = self.pad_total(in_h, out_h, self.kernel_h) / 2;
        let pad_left = self.pad_total(in_w, out_w, self.kernel_w) / 2;

        let x = data
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(data.dtype()))?;
        let k = self.kernel.contiguous();
        let k_data = k
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(self.kernel.dtype()))?;
        let bias = match self.bias {
            Some(ref b) => {
                let b_cont = b.contiguous();
                Some(
                    b_cont
                        .as_f32_slice()
                        .ok_or_else(|| ChromaError::UnsupportedDType(b.dtype()))?
                        .to_vec(),
                )
            }
            None => None,
        };

        let (cin, cout) = (self.in_channels, self.out_channels);
        let mut output = vec![0.0f32; batch * out_h * out_w * cout];
        let mut acc = vec![0.0f32; cout];

        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    acc.fill(0.0);

                    for kh in 0..self.kernel_h {
                        let ih = oh * self.stride + kh;
                        let Some(ih) = ih.checked_sub(pad_top) else { continue };
                        if ih >= in_h {
                            continue;
                        }
                        for kw in 0..self.kernel_w {
                            let iw = ow * self.stride + kw;
                            let Some(iw) = iw.checked_sub(pad_left) else { continue };
                            if iw >= in_w {
                                continue;
                            }

                            let x_base = ((b * in_h + ih) * in_w + iw) * cin;
                            let k_base = (kh * self.kernel_w + kw) * cin * cout;
                            for ic in 0..cin {
                                let xv = x[x_base + ic];
                                if xv == 0.0 {
                                    continue;
                                }
                                let k_row = &k_data[k_base + ic * cout..k_base + (ic + 1) * cout];
                                for (oc, &kv) in k_row.iter().enumerate() {
                                    acc[oc] += xv * kv;
                                }
                            }
                        }
                    }

                    let o_base = ((b * out_h + oh) * out_w + ow) * cout;
                    if let Some(ref bias) = bias {
                        for oc in 0..cout {
                            output[o_base + oc] = acc[oc] + bias[oc];
                        }
                    } else {
                        output[o_base..o_base + cout].copy_from_slice(&acc);
                    }
                }
            }
        }

        Ok(Tensor::from_f32(&output, &[batch, out_h, out_w, cout]))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = vec![&self.kernel];
        if let Some(ref b) = self.bias {
            params.push(b);
        }
        params
    }
}

/// Transposed 2D convolution with "same" padding — the upsampling inverse
/// of [`Conv2d`]'s striding.
///
/// Input shape: `[batch, h, w, in_channels]`
/// Kernel shape: `[kh, kw, out_channels, in_channels]`
/// Output shape: `[batch, h * stride, w * stride, out_channels]`
#[derive(Debug)]
pub struct ConvTranspose2d {
    kernel: Tensor,
    bias: Option<Tensor>,
    in_channels: usize,
    out_channels: usize,
    kernel_h: usize,
    kernel_w: usize,
    stride: usize,
}

impl ConvTranspose2d {
    /// Create a ConvTranspose2d from pre-existing kernel and optional bias.
    ///
    /// Kernel shape: `[kh, kw, out_channels, in_channels]`
    /// Bias shape: `[out_channels]`
    pub fn from_weight(kernel: Tensor, bias: Option<Tensor>, stride: usize) -> Self {
        let dims = kernel.shape().dims();
        assert_eq!(dims.len(), 4, "ConvTranspose2d kernel must be 4D");
        assert!(stride > 0, "ConvTranspose2d stride must be positive");
        if let Some(ref b) = bias {
            assert_eq!(
                b.numel(),
                dims[2],
                "ConvTranspose2d bias length must match out_channels"
            );
        }
        Self {
            kernel_h: dims[0],
            kernel_w: dims[1],
            out_channels: dims[2],
            in_channels: dims[3],
            kernel,
            bias,
            stride,
        }
    }

    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Stride.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Spatial output size for a given input size: `input * stride`.
    pub fn output_size(&self, in_h: usize, in_w: usize) -> (usize, usize) {
        (in_h * self.stride, in_w * self.stride)
    }
}

impl Module for ConvTranspose2d {
    fn forward(&self, input: &Tensor) -> chroma_core::Result<Tensor> {
        let data = input.contiguous();
        let dims = data.shape().dims().to_vec();
        if dims.len() != 4 || dims[3] != self.in_channels {
            return Err(ChromaError::ShapeMismatch {
                expected: vec![0, 0, 0, self.in_channels],
                got: dims,
            });
        }

        let (batch, in_h, in_w) = (dims[0], dims[1], dims[2]);
        let (out_h, out_w) = self.output_size(in_h, in_w);
        // Gradient of a same-padded forward conv mapping out -> in.
        let pad_top = self.kernel_h.saturating_sub(self.stride) / 2;
        let pad_left = self.kernel_w.saturating_sub(self.stride) / 2;

        let x = data
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(data.dtype()))?;
        let k = self.kernel.contiguous();
        let k_data = k
            .as_f32_slice()
            .ok_or_else(|| ChromaError::UnsupportedDType(self.kernel.dtype()))?;
        let bias = match self.bias {
            Some(ref b) => {
                let b_cont = b.contiguous();
                Some(
                    b_cont
                        .as_f32_slice()
                        .ok_or_else(|| ChromaError::UnsupportedDType(b.dtype()))?
                        .to_vec(),
                )
            }
            None => None,
        };

        let (cin, cout) = (self.in_channels, self.out_channels);
        let mut output = vec![0.0f32; batch * out_h * out_w * cout];
        let mut acc = vec![0.0f32; cout];

        for b in 0..batch {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    acc.fill(0.0);

                    for kh in 0..self.kernel_h {
                        // oh + pad_top = ih * stride + kh
                        let Some(t) = (oh + pad_top).checked_sub(kh) else { continue };
                        if t % self.stride != 0 {
                            continue;
                        }
                        let ih = t / self.stride;
                        if ih >= in_h {
                            continue;
                        }
                        for kw in 0..self.kernel_w {
                            let Some(t) = (ow + pad_left).checked_sub(kw) else { continue };
                            if t % self.stride != 0 {
                                continue;
                            }
                            let iw = t / self.stride;
                            if iw >= in_w {
                                continue;
                            }

                            let x_base = ((b * in_h + ih) * in_w + iw) * cin;
                            let k_base = (kh * self.kernel_w + kw) * cout * cin;
                            for oc in 0..cout {
                                let k_row = &k_data[k_base + oc * cin..k_base + (oc + 1) * cin];
                                let mut sum = 0.0f32;
                                for (ic, &kv) in k_row.iter().enumerate() {
                                    sum += x[x_base + ic] * kv;
                                }
                                acc[oc] += sum;
                            }
                        }
                    }

                    let o_base = ((b * out_h + oh) * out_w + ow) * cout;
                    if let Some(ref bias) = bias {
                        for oc in 0..cout {
                            output[o_base + oc] = acc[oc] + bias[oc];
                        }
                    } else {
                        output[o_base..o_base + cout].copy_from_slice(&acc);
                    }
                }
            }
        }

        Ok(Tensor::from_f32(&output, &[batch, out_h, out_w, cout]))
    }

    fn parameters(&self) -> Vec<&Tensor> {
        let mut params = vec![&self.kernel];
        if let Some(ref b) = self.bias {
            params.push(b);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv2d_same_padding_stride1() {
        // 3x3 ones kernel over 4x4 ones input: corners see 4 taps,
        // edges 6, interior 9.
        let kernel = Tensor::ones(&[3, 3, 1, 1]);
        let conv = Conv2d::from_weight(kernel, None, 1);
        let input = Tensor::ones(&[1, 4, 4, 1]);
        let output = conv.forward(&input).unwrap();
        assert_eq!(output.shape().dims(), &[1, 4, 4, 1]);
        let data = output.as_f32_slice().unwrap();
        assert_eq!(data[0], 4.0); // corner
        assert_eq!(data[1], 6.0); // edge
        assert_eq!(data[5], 9.0); // interior
    }

    #[test]
    fn test_conv2d_stride2_halves() {
        let kernel = Tensor::ones(&[4, 4, 1, 1]);
        let conv = Conv2d::from_weight(kernel, None, 2);
        let input = Tensor::ones(&[1, 4, 4, 1]);
        let output = conv.forward(&input).unwrap();
        assert_eq!(output.shape().dims(), &[1, 2, 2, 1]);
        // Every 4x4 window loses one padded row/column on each side: 3x3 taps.
        let data = output.as_f32_slice().unwrap();
        assert!(data.iter().all(|&v| v == 9.0), "got {data:?}");
    }

    #[test]
    fn test_conv2d_output_size_ceil() {
        let kernel = Tensor::ones(&[4, 4, 1, 1]);
        let conv = Conv2d::from_weight(kernel, None, 2);
        assert_eq!(conv.output_size(256, 256), (128, 128));
        assert_eq!(conv.output_size(5, 7), (3, 4));
    }

    #[test]
    fn test_conv2d_bias() {
        let kernel = Tensor::zeros(&[3, 3, 1, 2], chroma_core::DType::F32);
        let bias = Tensor::from_f32(&[1.5, -2.0], &[2]);
        let conv = Conv2d::from_weight(kernel, Some(bias), 1);
        let input = Tensor::ones(&[1, 2, 2, 1]);
        let output = conv.forward(&input).unwrap();
        let data = output.as_f32_slice().unwrap();
        for px in data.chunks(2) {
            assert_eq!(px, &[1.5, -2.0]);
        }
    }

    #[test]
    fn test_conv2d_channel_mismatch() {
        let kernel = Tensor::ones(&[3, 3, 2, 4]);
        let conv = Conv2d::from_weight(kernel, None, 1);
        let input = Tensor::ones(&[1, 4, 4, 3]);
        assert!(conv.forward(&input).is_err());
    }

    #[test]
    fn test_deconv_doubles() {
        let kernel = Tensor::ones(&[4, 4, 1, 1]);
        let deconv = ConvTranspose2d::from_weight(kernel, None, 2);
        let input = Tensor::ones(&[1, 2, 2, 1]);
        let output = deconv.forward(&input).unwrap();
        assert_eq!(output.shape().dims(), &[1, 4, 4, 1]);
    }

    #[test]
    fn test_deconv_scatter_values() {
        // 1x4 ones kernel, stride 2, input row [1, 2]:
        // out row 0 gathers [a*k1, a*k2 + b*k0, a*k3 + b*k1, b*k2],
        // out row 1 has no kernel tap aligned vertically.
        let kernel = Tensor::ones(&[1, 4, 1, 1]);
        let deconv = ConvTranspose2d::from_weight(kernel, None, 2);
        let input = Tensor::from_f32(&[1.0, 2.0], &[1, 1, 2, 1]);
        let output = deconv.forward(&input).unwrap();
        assert_eq!(output.shape().dims(), &[1, 2, 4, 1]);
        let data = output.as_f32_slice().unwrap();
        assert_eq!(&data[..4], &[1.0, 3.0, 3.0, 2.0]);
        assert_eq!(&data[4..], &[0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deconv_bias() {
        let kernel = Tensor::zeros(&[4, 4, 3, 1], chroma_core::DType::F32);
        let bias = Tensor::from_f32(&[0.1, 0.2, 0.3], &[3]);
        let deconv = ConvTranspose2d::from_weight(kernel, Some(bias), 2);
        let input = Tensor::ones(&[1, 2, 2, 1]);
        let output = deconv.forward(&input).unwrap();
        assert_eq!(output.shape().dims(), &[1, 4, 4, 3]);
        let data = output.as_f32_slice().unwrap();
        for px in data.chunks(3) {
            assert!((px[0] - 0.1).abs() < 1e-6);
            assert!((px[2] - 0.3).abs() < 1e-6);
        }
    }

    #[test]
    fn test_down_up_resolution_roundtrip() {
        let conv = Conv2d::from_weight(Tensor::ones(&[4, 4, 1, 1]), None, 2);
        let deconv = ConvTranspose2d::from_weight(Tensor::ones(&[4, 4, 1, 1]), None, 2);
        let input = Tensor::ones(&[1, 8, 6, 1]);
        let down = conv.forward(&input).unwrap();
        assert_eq!(down.shape().dims(), &[1, 4, 3, 1]);
        let up = deconv.forward(&down).unwrap();
        assert_eq!(up.shape().dims(), &[1, 8, 6, 1]);
    }

    #[test]
    fn test_parameters() {
        let conv = Conv2d::from_weight(
            Tensor::ones(&[3, 3, 2, 4]),
            Some(Tensor::zeros(&[4], chroma_core::DType::F32)),
            1,
        );
        assert_eq!(conv.parameters().len(), 2);
        assert_eq!(conv.num_parameters(), 3 * 3 * 2 * 4 + 4);

        let deconv = ConvTranspose2d::from_weight(Tensor::ones(&[4, 4, 8, 2]), None, 2);
        assert_eq!(deconv.parameters().len(), 1);
        assert_eq!(deconv.out_channels(), 8);
        assert_eq!(deconv.in_channels(), 2);
    }
}
