//! Shared image preprocessing utilities
//!
//! Every stage of the cutout pipeline works at one canonical square
//! resolution; this module owns the resize and the tensor conversion so the
//! processor and the inference backend agree on the coordinate space.

use image::{imageops, DynamicImage, RgbImage};
use ndarray::Array4;

/// Image preprocessing for segmentation inference
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Resize an image to the canonical square resolution as RGB
    ///
    /// Plain (non-aspect-preserving) resize; the model was trained on square
    /// inputs produced the same way.
    #[must_use]
    pub fn to_canonical(image: &DynamicImage, canonical_size: u32) -> RgbImage {
        let rgb = image.to_rgb8();
        if rgb.dimensions() == (canonical_size, canonical_size) {
            return rgb;
        }
        imageops::resize(
            &rgb,
            canonical_size,
            canonical_size,
            imageops::FilterType::Triangle,
        )
    }

    /// Convert a canonical RGB image to an NCHW float tensor scaled to `[0, 1]`
    #[must_use]
    pub fn to_tensor(image: &RgbImage) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match the image size
        for (x, y, pixel) in image.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = f32::from(pixel[0]) / 255.0;
            tensor[[0, 1, y as usize, x as usize]] = f32::from(pixel[1]) / 255.0;
            tensor[[0, 2, y as usize, x as usize]] = f32::from(pixel[2]) / 255.0;
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb(color));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_canonical_resize() {
        let image = solid_image(100, 50, [10, 20, 30]);
        let canonical = ImagePreprocessor::to_canonical(&image, 640);
        assert_eq!(canonical.dimensions(), (640, 640));
    }

    #[test]
    fn test_canonical_passthrough() {
        let image = solid_image(640, 640, [10, 20, 30]);
        let canonical = ImagePreprocessor::to_canonical(&image, 640);
        assert_eq!(canonical.dimensions(), (640, 640));
        assert_eq!(canonical.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_tensor_layout_and_scaling() {
        let image = solid_image(4, 4, [255, 128, 0]).to_rgb8();
        let tensor = ImagePreprocessor::to_tensor(&image);
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 2, 3]] - 128.0 / 255.0).abs() < 1e-3);
        assert!((tensor[[0, 2, 3, 1]]).abs() < 1e-6);
    }
}
