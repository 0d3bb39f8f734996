//! Conversions between 8-bit rasters and the normalized float tensors the
//! extractor consumes.

use crate::{
    errors::{self, Error},
    Dims,
};
use burn::tensor::{backend::Backend, Tensor, TensorData};

// Fixed per-channel constants the extractor was trained with
pub(crate) const MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
pub(crate) const STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalizes an image into a `[1, 3, H, W]` tensor.
pub(crate) fn to_tensor<B: Backend>(img: &image::RgbImage, device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = img.dimensions();
    let (width, height) = (width as usize, height as usize);

    let mut data = vec![0.0f32; 3 * height * width];
    for (x, y, pixel) in img.enumerate_pixels() {
        for channel in 0..3 {
            data[channel * height * width + y as usize * width + x as usize] =
                (f32::from(pixel[channel]) / 255.0 - MEAN_RGB[channel]) / STD_RGB[channel];
        }
    }

    Tensor::from_data(TensorData::new(data, [1, 3, height, width]), device)
}

/// Reverses the normalization of `to_tensor` and clamps into the displayable
/// range. This is the last step of a transfer run.
pub(crate) fn from_tensor<B: Backend>(tensor: Tensor<B, 4>) -> Result<image::RgbImage, Error> {
    let dims = tensor.dims();
    let [batch, channels, height, width] = dims;
    if batch != 1 || channels != 3 {
        return Err(Error::ShapeMismatch(errors::ShapeMismatch {
            expected: "[1, 3, H, W]",
            got: dims.to_vec(),
        }));
    }

    let data = tensor.into_data().convert::<f32>();
    let values = data
        .to_vec::<f32>()
        .expect("tensor data was just converted to f32");

    let mut img = image::RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let mut pixel = [0u8; 3];
            for (channel, value) in pixel.iter_mut().enumerate() {
                let v = values[channel * height * width + y * width + x] * STD_RGB[channel]
                    + MEAN_RGB[channel];
                *value = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
            img.put_pixel(x as u32, y as u32, image::Rgb(pixel));
        }
    }

    Ok(img)
}

pub(crate) fn dims_of(img: &image::RgbImage) -> Dims {
    let (width, height) = img.dimensions();
    Dims { width, height }
}

#[cfg(test)]
mod test {
    use super::{from_tensor, to_tensor};
    use crate::CpuBackend;
    use burn::backend::ndarray::NdArrayDevice;

    // normalize -> denormalize must reproduce the raster exactly up to
    // quantization
    #[test]
    fn denormalize_inverts_normalize() {
        let img = image::RgbImage::from_fn(7, 5, |x, y| {
            image::Rgb([
                (x * 37 + y * 11) as u8,
                (x * 3 + y * 89) as u8,
                255 - (x * 29) as u8,
            ])
        });

        let tensor = to_tensor::<CpuBackend>(&img, &NdArrayDevice::Cpu);
        let restored = from_tensor(tensor).unwrap();

        assert_eq!(restored.dimensions(), img.dimensions());
        for (a, b) in img.pixels().zip(restored.pixels()) {
            for channel in 0..3 {
                let diff = i16::from(a[channel]) - i16::from(b[channel]);
                assert!(diff.abs() <= 1, "channel drifted by {}", diff);
            }
        }
    }

    #[test]
    fn rejects_wrong_channel_count() {
        use burn::tensor::Tensor;

        let tensor = Tensor::<CpuBackend, 4>::zeros([1, 4, 2, 2], &NdArrayDevice::Cpu);
        assert!(from_tensor(tensor).is_err());
    }
}
