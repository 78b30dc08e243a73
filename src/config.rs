//! Explicit per-entry-point configuration
//!
//! Each pipeline stage receives its configuration at construction time.
//! Defaults carry the fixed values the pipeline has always used (folder
//! names, seed URLs, training hyperparameters, detection thresholds).

use crate::error::{Result, ShoecutError};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::PathBuf;

/// Canonical square resolution every image is resized to before inference
pub const CANONICAL_SIZE: u32 = 640;

/// Class index of the shoe category in the trained model
pub const SHOE_CLASS: usize = 0;

/// Browser-spoofing user agent sent with every page request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.36";

/// Configuration for the web scraper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Destination folder, cleared and recreated before every run
    pub output_dir: PathBuf,
    /// Seed search pages to fetch before pagination expansion
    pub seed_urls: Vec<String>,
    /// Page numbers appended to paginating domains
    pub page_range: Range<u32>,
    /// User agent header sent with every request
    pub user_agent: String,
    /// Render progress bars during the run
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Shoes"),
            seed_urls: vec![
                "https://www.shutterstock.com/fr/search/shoes?consentChanged=true&image_type=photo"
                    .to_string(),
                "https://fr.freepik.com/search?format=search&last_filter=query&last_value=shoes&query=shoes&type=photo"
                    .to_string(),
                "https://fr.dreamstime.com/photos-images/shoes.html".to_string(),
                "https://www.pexels.com/fr-fr/chercher/shoes/".to_string(),
            ],
            page_range: 2..25,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            show_progress: false,
        }
    }
}

/// Configuration for the duplicate cleaner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Folder of scraped images to scan
    pub image_dir: PathBuf,
    /// Known bad assets; relative paths resolve against `image_dir`
    pub blocklist: Vec<PathBuf>,
}

impl CleanConfig {
    /// Blocklist entries resolved against the image folder
    #[must_use]
    pub fn resolved_blocklist(&self) -> Vec<PathBuf> {
        self.blocklist
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.image_dir.join(p)
                }
            })
            .collect()
    }
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("Shoes"),
            blocklist: vec![
                PathBuf::from("3160.jpg"),
                PathBuf::from("2990.jpg"),
                PathBuf::from("2034.jpg"),
            ],
        }
    }
}

/// Configuration for one training run
///
/// Training internals (loss, optimizer, checkpointing) belong to the external
/// model tooling; this struct only carries the fixed run parameters handed to
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Trainer executable resolved through `PATH`
    pub trainer_bin: String,
    /// Pretrained checkpoint the run starts from
    pub base_weights: String,
    /// Dataset descriptor consumed by the trainer
    pub dataset: PathBuf,
    /// Batch size
    pub batch_size: u32,
    /// Number of epochs
    pub epochs: u32,
    /// Square image size used during training
    pub image_size: u32,
    /// Compute device identifier
    pub device: String,
    /// Directory holding the rotating error log
    pub error_log_dir: PathBuf,
    /// File name prefix of the rotating error log
    pub error_log_name: String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            trainer_bin: "yolo".to_string(),
            base_weights: "yolov8n-seg.pt".to_string(),
            dataset: PathBuf::from("conf_yaml.yaml"),
            batch_size: 8,
            epochs: 40,
            image_size: CANONICAL_SIZE,
            device: "cpu".to_string(),
            error_log_dir: PathBuf::from("."),
            error_log_name: "log-error.log".to_string(),
        }
    }
}

/// Configuration for the cutout (inference + masking) stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CutoutConfig {
    /// Trained segmentation model read from the working directory
    pub model_path: PathBuf,
    /// Folder receiving the generated PNG files
    pub output_dir: PathBuf,
    /// Class whose instances are exported
    pub target_class: usize,
    /// Minimum detection confidence
    pub confidence_threshold: f32,
    /// IoU threshold for non-maximum suppression
    pub iou_threshold: f32,
    /// Probability above which a mask pixel counts as foreground
    pub mask_threshold: f32,
    /// Square resolution images are resized to before inference
    pub canonical_size: u32,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
}

impl CutoutConfig {
    /// Create a new cutout configuration builder
    #[must_use]
    pub fn builder() -> CutoutConfigBuilder {
        CutoutConfigBuilder::new()
    }
}

impl Default for CutoutConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("final_model.onnx"),
            output_dir: PathBuf::from("Resultat"),
            target_class: SHOE_CLASS,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            mask_threshold: 0.5,
            canonical_size: CANONICAL_SIZE,
            intra_threads: 0,
        }
    }
}

/// Builder for [`CutoutConfig`]
pub struct CutoutConfigBuilder {
    config: CutoutConfig,
}

impl CutoutConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CutoutConfig::default(),
        }
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model_path = path.into();
        self
    }

    #[must_use]
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn target_class(mut self, class: usize) -> Self {
        self.config.target_class = class;
        self
    }

    #[must_use]
    pub fn confidence_threshold(mut self, threshold: f32) -> Self {
        self.config.confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn iou_threshold(mut self, threshold: f32) -> Self {
        self.config.iou_threshold = threshold;
        self
    }

    #[must_use]
    pub fn mask_threshold(mut self, threshold: f32) -> Self {
        self.config.mask_threshold = threshold;
        self
    }

    #[must_use]
    pub fn canonical_size(mut self, size: u32) -> Self {
        self.config.canonical_size = size;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Build the cutout configuration
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError::InvalidConfig` for thresholds outside `[0, 1]`
    /// or a zero canonical size.
    pub fn build(self) -> Result<CutoutConfig> {
        for (name, value) in [
            ("confidence threshold", self.config.confidence_threshold),
            ("IoU threshold", self.config.iou_threshold),
            ("mask threshold", self.config.mask_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ShoecutError::invalid_config(format!(
                    "{name} must be within 0.0-1.0, got {value}"
                )));
            }
        }
        if self.config.canonical_size == 0 {
            return Err(ShoecutError::invalid_config("canonical size must be > 0"));
        }
        Ok(self.config)
    }
}

impl Default for CutoutConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
