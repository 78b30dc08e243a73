//! Segmentation backend abstraction

use crate::error::Result;
use crate::types::Segmentation;
use image::RgbImage;

/// Trait for instance segmentation backends
///
/// The input image is expected at the canonical square resolution; the
/// returned masks and boxes live in the same coordinate space. Keeping the
/// seam here lets tests drive the cutout pipeline with a deterministic fake
/// instead of a trained model.
pub trait Segmenter {
    /// Load the model and prepare the backend for inference
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Session construction failures
    fn initialize(&mut self) -> Result<()>;

    /// Detect and segment all instances in the image
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Inference failures
    /// - Output decoding errors (unexpected tensor layout)
    fn segment(&mut self, image: &RgbImage) -> Result<Segmentation>;

    /// Check whether the backend is ready for inference
    fn is_initialized(&self) -> bool;
}
