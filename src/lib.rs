#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Shoecut
//!
//! A small shoe-image pipeline: scrape stock-photo sites for training
//! images, clean known bad assets out of the scraped folder, drive a
//! segmentation-model training run, and cut detected shoes out of photos
//! with transparent backgrounds using the trained model via ONNX Runtime.
//!
//! The four stages are independent entry points that share nothing at
//! runtime beyond folder conventions; data flows one way from scraping
//! through (external) labeling and training to cutout generation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shoecut::{extract_cutouts, CutoutConfig};
//!
//! # fn example() -> shoecut::Result<()> {
//! let config = CutoutConfig::builder()
//!     .model_path("final_model.onnx")
//!     .output_dir("Resultat")
//!     .build()?;
//! let result = extract_cutouts("photo.jpg", &config)?;
//! println!("{} cutouts written", result.written.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `onnx` (default): ONNX Runtime segmentation backend
//! - `cli` (default): command-line interface and progress reporting

pub mod backends;
pub mod clean;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod cutout;
pub mod error;
pub mod inference;
pub mod scrape;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod train;
pub mod types;
pub mod utils;

// Public API exports
#[cfg(feature = "onnx")]
pub use backends::OnnxSegmenter;
pub use backends::StaticSegmenter;
pub use clean::{CleanSummary, FolderCleaner};
pub use config::{
    CleanConfig, CutoutConfig, CutoutConfigBuilder, ScrapeConfig, TrainConfig, CANONICAL_SIZE,
    SHOE_CLASS,
};
pub use cutout::{CutoutProcessor, CutoutResult, CutoutTimings};
pub use error::{Result, ShoecutError};
pub use inference::Segmenter;
pub use scrape::{ImageScraper, ScrapeSummary};
pub use train::TrainingRun;
pub use types::{BoundingBox, Detection, InstanceMask, PixelRect, Segmentation};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::TracingConfig;

/// Cut every detected shoe out of an image file
///
/// Convenience wrapper building an ONNX-backed [`CutoutProcessor`] for a
/// single run. Writes one combined cutout plus one cropped cutout per
/// detected instance into the configured output directory.
///
/// # Errors
///
/// Returns `ShoecutError` for unreadable input, model loading failures,
/// inference failures, or output write failures.
#[cfg(feature = "onnx")]
pub fn extract_cutouts<P: AsRef<std::path::Path>>(
    image_path: P,
    config: &CutoutConfig,
) -> Result<CutoutResult> {
    let mut processor = CutoutProcessor::new(config.clone());
    processor.process_file(image_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs_are_consistent() {
        // the cleaner and the scraper operate on the same folder
        assert_eq!(
            CleanConfig::default().image_dir,
            ScrapeConfig::default().output_dir
        );
        // training and inference share the canonical resolution
        assert_eq!(TrainConfig::default().image_size, CANONICAL_SIZE);
        assert_eq!(CutoutConfig::default().canonical_size, CANONICAL_SIZE);
    }
}
