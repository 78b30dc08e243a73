//! Core types shared by the segmentation and cutout stages

use crate::error::{Result, ShoecutError};
use image::ImageBuffer;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in canonical pixel coordinates (xyxy)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
    /// Right edge
    pub x2: f32,
    /// Bottom edge
    pub y2: f32,
}

/// Integer pixel rectangle with a half-open upper bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl PixelRect {
    /// Rectangle width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min
    }

    /// Rectangle height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min
    }
}

impl BoundingBox {
    /// Create a new bounding box from xyxy corners
    #[must_use]
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Box area in squared pixels (zero for inverted boxes)
    #[must_use]
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection-over-union with another box
    #[must_use]
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Convert to an integer crop rectangle clamped to the image bounds
    ///
    /// Coordinates are truncated toward zero and the upper bound is half-open.
    /// Returns `None` when the clamped rectangle has zero area; callers skip
    /// such boxes instead of producing out-of-range crops.
    #[must_use]
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> Option<PixelRect> {
        let x_min = (self.x1 as i64).clamp(0, i64::from(image_width)) as u32;
        let y_min = (self.y1 as i64).clamp(0, i64::from(image_height)) as u32;
        let x_max = (self.x2 as i64).clamp(0, i64::from(image_width)) as u32;
        let y_max = (self.y2 as i64).clamp(0, i64::from(image_height)) as u32;

        if x_max <= x_min || y_max <= y_min {
            return None;
        }

        Some(PixelRect {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

/// One detected object instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    /// Class index assigned by the model
    pub class_id: usize,
    /// Detection confidence in `[0, 1]`
    pub confidence: f32,
    /// Bounding box in canonical pixel coordinates
    pub bbox: BoundingBox,
}

/// Per-pixel boolean grid marking where one detected object lives
///
/// Stored as one byte per pixel, 255 for foreground and 0 for background,
/// row-major at the canonical resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceMask {
    /// Mask data, one byte per pixel (0 or 255)
    pub data: Vec<u8>,
    /// Mask dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl InstanceMask {
    /// Create a mask from raw bytes
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError::Processing` when the byte count does not match
    /// the dimensions.
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(ShoecutError::processing(format!(
                "mask byte count {} does not match {}x{} grid",
                data.len(),
                dimensions.0,
                dimensions.1
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Create an all-background mask
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize],
            dimensions: (width, height),
        }
    }

    /// Mask width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    /// Mask height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Whether the pixel at (x, y) is foreground
    #[must_use]
    pub fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.width() || y >= self.height() {
            return false;
        }
        let index = (y * self.width() + x) as usize;
        self.data.get(index).copied().unwrap_or(0) != 0
    }

    /// Mark the pixel at (x, y) as foreground
    pub fn set(&mut self, x: u32, y: u32) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        let index = (y * self.width() + x) as usize;
        if let Some(value) = self.data.get_mut(index) {
            *value = 255;
        }
    }

    /// Number of foreground pixels
    #[must_use]
    pub fn coverage(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Pixel-wise logical OR of all given masks
    ///
    /// The aggregate of an empty selection is an all-background mask, so an
    /// image without any target-class instance still yields a (fully
    /// transparent) combined cutout.
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError::Processing` when mask dimensions disagree.
    pub fn union<'a, I>(masks: I, dimensions: (u32, u32)) -> Result<Self>
    where
        I: IntoIterator<Item = &'a InstanceMask>,
    {
        let mut aggregate = Self::empty(dimensions.0, dimensions.1);
        for mask in masks {
            if mask.dimensions != dimensions {
                return Err(ShoecutError::processing(format!(
                    "cannot combine {}x{} mask into {}x{} aggregate",
                    mask.width(),
                    mask.height(),
                    dimensions.0,
                    dimensions.1
                )));
            }
            for (dst, src) in aggregate.data.iter_mut().zip(&mask.data) {
                *dst |= src;
            }
        }
        Ok(aggregate)
    }

    /// Convert the mask to a grayscale image
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError::Processing` when the buffer cannot be built.
    pub fn to_image(&self) -> Result<ImageBuffer<image::Luma<u8>, Vec<u8>>> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| ShoecutError::processing("Failed to create image from mask data"))
    }
}

/// Output of one segmentation call: detections with their parallel masks
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    /// Detected instances, in detection order
    pub detections: Vec<Detection>,
    /// One mask per detection, same order
    pub masks: Vec<InstanceMask>,
}

impl Segmentation {
    /// Indices of detections belonging to the given class
    #[must_use]
    pub fn class_indices(&self, class_id: usize) -> Vec<usize> {
        self.detections
            .iter()
            .enumerate()
            .filter(|(_, d)| d.class_id == class_id)
            .map(|(i, _)| i)
            .collect()
    }
}
