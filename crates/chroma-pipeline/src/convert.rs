//! Conversions between images and NHWC tensors.
//!
//! Inputs enter the network as `[1, size, size, 3]` tensors in [0, 1];
//! outputs leave it in the generator's native [-1, 1] range and stay there
//! until [`to_rgb8`] maps them onto display bytes.

use image::imageops::FilterType;
use image::{DynamicImage, Rgb32FImage, RgbImage};

use chroma_core::Tensor;

use crate::error::PipelineError;

/// Channel order the network's parameters were trained against. Decoded
/// images are always RGB; a `Bgr` network gets its channels swapped on
/// the way in and back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

fn swap_rb(data: &mut [f32]) {
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

/// Decode-agnostic preprocessing: RGB conversion, bilinear resize to the
/// square working resolution, [0, 1] scaling, channel reordering.
pub fn image_to_tensor(
    image: &DynamicImage,
    size: u32,
    order: ChannelOrder,
) -> Result<Tensor, PipelineError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PipelineError::DegenerateImage { width, height });
    }

    let rgb = image.to_rgb32f();
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);
    let mut data = resized.into_raw();
    if order == ChannelOrder::Bgr {
        swap_rb(&mut data);
    }
    Ok(Tensor::from_f32(&data, &[1, size as usize, size as usize, 3]))
}

/// Reinterpret a `[1, h, w, 3]` tensor as an RGB f32 image, values
/// untouched apart from undoing any channel reordering.
pub fn tensor_to_image(tensor: &Tensor, order: ChannelOrder) -> Result<Rgb32FImage, PipelineError> {
    let dims = tensor.shape().dims();
    if dims.len() != 4 || dims[0] != 1 || dims[3] != 3 {
        return Err(PipelineError::Compute(
            chroma_core::ChromaError::ShapeMismatch {
                expected: vec![1, 0, 0, 3],
                got: dims.to_vec(),
            },
        ));
    }

    let (h, w) = (dims[1], dims[2]);
    let data = tensor.contiguous();
    let slice = data
        .as_f32_slice()
        .ok_or_else(|| chroma_core::ChromaError::UnsupportedDType(data.dtype()))?;
    let mut raw = slice.to_vec();
    if order == ChannelOrder::Bgr {
        swap_rb(&mut raw);
    }
    Rgb32FImage::from_raw(w as u32, h as u32, raw).ok_or_else(|| {
        PipelineError::Compute(chroma_core::ChromaError::StorageError(
            "tensor length disagrees with image dimensions".into(),
        ))
    })
}

/// Resize an f32 image to the given dimensions (bilinear).
pub fn resize_image(image: &Rgb32FImage, width: u32, height: u32) -> Rgb32FImage {
    image::imageops::resize(image, width, height, FilterType::Triangle)
}

/// Map a [-1, 1] f32 image onto 8-bit RGB: `(v * 0.5 + 0.5) * 255`,
/// rounded and clamped.
pub fn to_rgb8(image: &Rgb32FImage) -> RgbImage {
    let mut out = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        for c in 0..3 {
            let v = (src.0[c] * 0.5 + 0.5) * 255.0;
            dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
