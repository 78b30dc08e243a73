//! Shoe pipeline CLI
//!
//! `shoecut scrape` / `clean` / `train` / `cutout <image>`: one subcommand
//! per pipeline stage, sharing nothing at runtime beyond folder conventions.

use crate::{
    clean::FolderCleaner,
    config::{CleanConfig, ScrapeConfig, TrainConfig},
    scrape::ImageScraper,
    tracing_config::TracingConfig,
    train::TrainingRun,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Shoe image pipeline
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "shoecut")]
pub struct Cli {
    #[command(subcommand)]
    pub command: PipelineCommand,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// One subcommand per pipeline stage
#[derive(Subcommand)]
pub enum PipelineCommand {
    /// Scrape stock-photo search pages and download every image found
    Scrape {
        /// Destination folder, cleared and recreated first
        #[arg(short, long, default_value = "Shoes")]
        output_dir: PathBuf,
    },
    /// Delete images that exactly match the blocklist of known bad assets
    Clean {
        /// Folder of scraped images to scan
        #[arg(short, long, default_value = "Shoes")]
        image_dir: PathBuf,
    },
    /// Run one training pass over the labeled dataset
    Train {
        /// Dataset descriptor consumed by the trainer
        #[arg(long, default_value = "conf_yaml.yaml")]
        dataset: PathBuf,

        /// Pretrained checkpoint the run starts from
        #[arg(long, default_value = "yolov8n-seg.pt")]
        weights: String,
    },
    /// Cut every detected shoe out of one image
    #[cfg(feature = "onnx")]
    Cutout {
        /// Input image
        image: PathBuf,

        /// Trained segmentation model
        #[arg(short, long, default_value = "final_model.onnx")]
        model: PathBuf,

        /// Folder receiving the generated PNG files
        #[arg(short, long, default_value = "Resultat")]
        output_dir: PathBuf,

        /// Minimum detection confidence
        #[arg(long, default_value_t = 0.5)]
        confidence: f32,
    },
}

pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The training command persists errors to the rotating log file; every
    // other command logs to the console only.
    let mut tracing_config = TracingConfig::new().with_verbosity(cli.verbose);
    if matches!(cli.command, PipelineCommand::Train { .. }) {
        let defaults = TrainConfig::default();
        tracing_config =
            tracing_config.with_error_log(defaults.error_log_dir, defaults.error_log_name);
    }
    let _guard = tracing_config
        .init()
        .context("Failed to initialize tracing")?;

    match cli.command {
        PipelineCommand::Scrape { output_dir } => {
            let config = ScrapeConfig {
                output_dir,
                show_progress: true,
                ..ScrapeConfig::default()
            };
            info!("Scraping into {}", config.output_dir.display());
            let summary = ImageScraper::new(config)?.run().await?;
            println!(
                "Downloaded {} image(s) from {} unique source(s) across {} page(s)",
                summary.downloaded, summary.unique_sources, summary.pages_visited
            );
        },
        PipelineCommand::Clean { image_dir } => {
            let config = CleanConfig {
                image_dir,
                ..CleanConfig::default()
            };
            let summary = FolderCleaner::new(config).run()?;
            println!("Deleted {} duplicate(s)", summary.deleted);
        },
        PipelineCommand::Train { dataset, weights } => {
            let config = TrainConfig {
                dataset,
                base_weights: weights,
                ..TrainConfig::default()
            };
            TrainingRun::new(config).run()?;
            println!("Training run finished");
        },
        #[cfg(feature = "onnx")]
        PipelineCommand::Cutout {
            image,
            model,
            output_dir,
            confidence,
        } => {
            let config = crate::config::CutoutConfig::builder()
                .model_path(model)
                .output_dir(output_dir)
                .confidence_threshold(confidence)
                .build()?;
            let mut processor = crate::cutout::CutoutProcessor::new(config);
            let result = processor.process_file(&image)?;
            println!(
                "Wrote {} file(s) for {} detected shoe(s)",
                result.written.len(),
                result.instances
            );
        },
    }

    Ok(())
}
