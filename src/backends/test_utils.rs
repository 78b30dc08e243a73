//! Deterministic segmentation backend for tests
//!
//! Mirrors the real backend's lifecycle (explicit initialization, errors when
//! used uninitialized) while returning a preset result, so the cutout
//! pipeline can be exercised without a trained model.

use crate::error::{Result, ShoecutError};
use crate::inference::Segmenter;
use crate::types::Segmentation;
use image::RgbImage;

/// Segmenter returning a fixed, preconfigured result for every image
pub struct StaticSegmenter {
    result: Segmentation,
    fail_on_segment: bool,
    initialized: bool,
}

impl StaticSegmenter {
    /// Create a backend that always returns the given segmentation
    #[must_use]
    pub fn new(result: Segmentation) -> Self {
        Self {
            result,
            fail_on_segment: false,
            initialized: false,
        }
    }

    /// Create a backend whose `segment` call always fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            result: Segmentation::default(),
            fail_on_segment: true,
            initialized: false,
        }
    }
}

impl Segmenter for StaticSegmenter {
    fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn segment(&mut self, _image: &RgbImage) -> Result<Segmentation> {
        if !self.initialized {
            return Err(ShoecutError::inference("backend not initialized"));
        }
        if self.fail_on_segment {
            return Err(ShoecutError::inference("static backend configured to fail"));
        }
        Ok(self.result.clone())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_segmenter_lifecycle() {
        let mut backend = StaticSegmenter::new(Segmentation::default());
        assert!(!backend.is_initialized());

        let image = RgbImage::new(4, 4);
        assert!(backend.segment(&image).is_err());

        backend.initialize().unwrap();
        assert!(backend.is_initialized());
        let result = backend.segment(&image).unwrap();
        assert!(result.detections.is_empty());
    }

    #[test]
    fn test_failing_segmenter() {
        let mut backend = StaticSegmenter::failing();
        backend.initialize().unwrap();
        let image = RgbImage::new(4, 4);
        assert!(backend.segment(&image).is_err());
    }
}
