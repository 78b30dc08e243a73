//! Cutout generation: mask application, cropping, PNG export
//!
//! Given one input image and a segmentation backend, produces one PNG with
//! the union of all target-class instances plus one cropped PNG per
//! instance, each with a transparent background.

use crate::config::CutoutConfig;
use crate::error::{Result, ShoecutError};
use crate::inference::Segmenter;
use crate::types::{InstanceMask, PixelRect, Segmentation};
use crate::utils::ImagePreprocessor;
use chrono::{DateTime, Utc};
use image::{imageops, Rgba, RgbaImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Stage timings for one cutout run (milliseconds)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutoutTimings {
    /// Image decode and canonical resize
    pub decode_ms: u64,
    /// Model inference including output decoding
    pub inference_ms: u64,
    /// Mask application, cropping and file writes
    pub compositing_ms: u64,
    /// End-to-end duration
    pub total_ms: u64,
}

/// Outcome of one cutout run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoutResult {
    /// Files written, aggregate first
    pub written: Vec<PathBuf>,
    /// Number of target-class instances detected
    pub instances: usize,
    /// Stage timings
    pub timings: CutoutTimings,
    /// When the run finished
    pub processed_at: DateTime<Utc>,
}

/// Cutout processor driving segmentation and mask application
pub struct CutoutProcessor {
    config: CutoutConfig,
    segmenter: Box<dyn Segmenter>,
}

impl CutoutProcessor {
    /// Create a processor backed by the ONNX segmenter
    #[cfg(feature = "onnx")]
    #[must_use]
    pub fn new(config: CutoutConfig) -> Self {
        let segmenter = Box::new(crate::backends::OnnxSegmenter::new(config.clone()));
        Self { config, segmenter }
    }

    /// Create a processor with a custom segmentation backend
    #[must_use]
    pub fn with_segmenter(config: CutoutConfig, segmenter: Box<dyn Segmenter>) -> Self {
        Self { config, segmenter }
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &CutoutConfig {
        &self.config
    }

    /// Process one image file and write all cutout PNGs
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError` for:
    /// - Unreadable or undecodable input
    /// - Model loading and inference failures
    /// - Output directory or file write failures
    #[instrument(skip_all, fields(input = %input_path.as_ref().display()))]
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<CutoutResult> {
        let input_path = input_path.as_ref();
        let total_start = Instant::now();
        let mut timings = CutoutTimings::default();

        let stem = input_stem(input_path)?;
        std::fs::create_dir_all(&self.config.output_dir).map_err(|e| {
            ShoecutError::file_io_error("create output directory", &self.config.output_dir, e)
        })?;

        // Decode and bring to the canonical resolution
        let decode_start = Instant::now();
        let image = image::open(input_path)?;
        let canonical = ImagePreprocessor::to_canonical(&image, self.config.canonical_size);
        timings.decode_ms = decode_start.elapsed().as_millis() as u64;

        // Segment
        let inference_start = Instant::now();
        if !self.segmenter.is_initialized() {
            self.segmenter.initialize()?;
        }
        let segmentation = self.segmenter.segment(&canonical)?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        // Composite and write
        let compositing_start = Instant::now();
        let written = self.write_cutouts(&canonical, &segmentation, &stem)?;
        timings.compositing_ms = compositing_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        let instances = segmentation.class_indices(self.config.target_class).len();
        info!(
            instances,
            files = written.len(),
            total_ms = timings.total_ms,
            "cutout run complete"
        );

        Ok(CutoutResult {
            written,
            instances,
            timings,
            processed_at: Utc::now(),
        })
    }

    /// Write the aggregate cutout plus one cropped cutout per instance
    fn write_cutouts(
        &self,
        canonical: &RgbImage,
        segmentation: &Segmentation,
        stem: &str,
    ) -> Result<Vec<PathBuf>> {
        let indices = segmentation.class_indices(self.config.target_class);
        debug!(
            detections = segmentation.detections.len(),
            target_instances = indices.len(),
            "applying masks"
        );

        let mut written = Vec::with_capacity(indices.len() + 1);

        let selected: Vec<&InstanceMask> = indices
            .iter()
            .map(|&i| {
                segmentation
                    .masks
                    .get(i)
                    .ok_or_else(|| ShoecutError::processing("mask missing for detection"))
            })
            .collect::<Result<_>>()?;

        let aggregate = InstanceMask::union(
            selected.iter().copied(),
            (canonical.width(), canonical.height()),
        )?;
        let aggregate_path = self
            .config
            .output_dir
            .join(format!("{stem}_all_shoes.png"));
        save_png(&composite_cutout(canonical, &aggregate)?, &aggregate_path)?;
        written.push(aggregate_path);

        for (position, &index) in indices.iter().enumerate() {
            let detection = segmentation
                .detections
                .get(index)
                .ok_or_else(|| ShoecutError::processing("detection missing for mask"))?;
            let mask = segmentation
                .masks
                .get(index)
                .ok_or_else(|| ShoecutError::processing("mask missing for detection"))?;

            let Some(rect) = detection
                .bbox
                .to_pixel_rect(canonical.width(), canonical.height())
            else {
                warn!(
                    instance = position + 1,
                    "skipping degenerate bounding box"
                );
                continue;
            };

            let cutout = composite_cutout(canonical, mask)?;
            let cropped = crop_to_rect(&cutout, rect);
            let path = self
                .config
                .output_dir
                .join(format!("{stem}_{}.png", position + 1));
            save_png(&cropped, &path)?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Output file stem: the input file name up to its first dot
fn input_stem(path: &Path) -> Result<String> {
    let stem = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .unwrap_or_default();

    if stem.is_empty() {
        return Err(ShoecutError::processing(format!(
            "cannot derive an output stem from '{}'",
            path.display()
        )));
    }
    Ok(stem.to_string())
}

/// Apply a mask to the image and derive the transparency channel
///
/// Background pixels are zeroed first; a pixel is opaque when the sum of its
/// three color channels is positive afterwards. A pure black pixel inside
/// the mask therefore stays transparent.
fn composite_cutout(image: &RgbImage, mask: &InstanceMask) -> Result<RgbaImage> {
    if mask.dimensions != image.dimensions() {
        return Err(ShoecutError::processing(format!(
            "mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }

    let mut cutout = RgbaImage::new(image.width(), image.height());
    for (x, y, pixel) in image.enumerate_pixels() {
        let masked = if mask.is_set(x, y) {
            [pixel[0], pixel[1], pixel[2]]
        } else {
            [0, 0, 0]
        };
        let alpha = if u32::from(masked[0]) + u32::from(masked[1]) + u32::from(masked[2]) > 0 {
            255
        } else {
            0
        };
        cutout.put_pixel(x, y, Rgba([masked[0], masked[1], masked[2], alpha]));
    }
    Ok(cutout)
}

/// Crop an RGBA image to a pixel rectangle (half-open bounds)
fn crop_to_rect(image: &RgbaImage, rect: PixelRect) -> RgbaImage {
    imageops::crop_imm(image, rect.x_min, rect.y_min, rect.width(), rect.height()).to_image()
}

/// Save an RGBA image as PNG
fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .map_err(|e| ShoecutError::processing(format!("Failed to write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    #[test]
    fn test_input_stem_takes_first_dot() {
        assert_eq!(input_stem(Path::new("photo.jpg")).unwrap(), "photo");
        assert_eq!(input_stem(Path::new("dir/photo.tar.gz")).unwrap(), "photo");
        assert_eq!(input_stem(Path::new("noext")).unwrap(), "noext");
        assert!(input_stem(Path::new(".hidden")).is_err());
    }

    #[test]
    fn test_composite_alpha_follows_color_sum() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgb([200, 0, 0]));
        image.put_pixel(1, 0, image::Rgb([0, 0, 0])); // black foreground
        image.put_pixel(0, 1, image::Rgb([50, 60, 70]));

        let mut mask = InstanceMask::empty(2, 2);
        mask.set(0, 0);
        mask.set(1, 0);

        let cutout = composite_cutout(&image, &mask).unwrap();
        assert_eq!(cutout.get_pixel(0, 0).0, [200, 0, 0, 255]);
        // inside the mask but color sum is zero
        assert_eq!(cutout.get_pixel(1, 0).0, [0, 0, 0, 0]);
        // outside the mask
        assert_eq!(cutout.get_pixel(0, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_composite_rejects_dimension_mismatch() {
        let image = RgbImage::new(4, 4);
        let mask = InstanceMask::empty(2, 2);
        assert!(composite_cutout(&image, &mask).is_err());
    }

    #[test]
    fn test_crop_dimensions() {
        let image = RgbaImage::new(640, 640);
        let rect = BoundingBox::new(10.0, 10.0, 50.0, 60.0)
            .to_pixel_rect(640, 640)
            .unwrap();
        let cropped = crop_to_rect(&image, rect);
        assert_eq!(cropped.dimensions(), (40, 50));
    }
}
