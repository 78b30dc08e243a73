//! Training run orchestration
//!
//! Training internals (loss, optimizer, checkpointing) are entirely the
//! model tooling's business; this module only assembles the fixed run
//! parameters, spawns the trainer executable, and waits for it. Failures are
//! surfaced as typed errors and recorded by the CLI's rotating error log.

use crate::config::TrainConfig;
use crate::error::{Result, ShoecutError};
use std::process::Command;
use tracing::{debug, error, info};

/// One segmentation-model training run with fixed parameters
pub struct TrainingRun {
    config: TrainConfig,
}

impl TrainingRun {
    /// Create a new training run
    #[must_use]
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// The argument vector handed to the trainer executable
    #[must_use]
    pub fn command_args(&self) -> Vec<String> {
        vec![
            "segment".to_string(),
            "train".to_string(),
            format!("model={}", self.config.base_weights),
            format!("data={}", self.config.dataset.display()),
            format!("batch={}", self.config.batch_size),
            format!("epochs={}", self.config.epochs),
            format!("imgsz={}", self.config.image_size),
            format!("device={}", self.config.device),
        ]
    }

    /// Spawn the trainer and wait for it to finish
    ///
    /// # Errors
    ///
    /// Returns `ShoecutError::InvalidConfig` when the dataset descriptor is
    /// missing and `ShoecutError::Model` when the trainer cannot be spawned
    /// or exits unsuccessfully.
    pub fn run(&self) -> Result<()> {
        if !self.config.dataset.exists() {
            return Err(ShoecutError::invalid_config(format!(
                "dataset descriptor '{}' not found",
                self.config.dataset.display()
            )));
        }

        let args = self.command_args();
        info!(
            trainer = %self.config.trainer_bin,
            epochs = self.config.epochs,
            batch = self.config.batch_size,
            device = %self.config.device,
            "starting training run"
        );
        debug!(?args, "trainer invocation");

        let status = Command::new(&self.config.trainer_bin)
            .args(&args)
            .status()
            .map_err(|e| {
                let err = ShoecutError::model(format!(
                    "Failed to spawn trainer '{}': {e}",
                    self.config.trainer_bin
                ));
                error!(error = %err, "training run failed");
                err
            })?;

        if !status.success() {
            let err = ShoecutError::model(format!(
                "trainer '{}' exited with {status}",
                self.config.trainer_bin
            ));
            error!(error = %err, "training run failed");
            return Err(err);
        }

        info!("training run finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_command_args_carry_fixed_run_parameters() {
        let run = TrainingRun::new(TrainConfig::default());
        let args = run.command_args();
        assert_eq!(args[0], "segment");
        assert_eq!(args[1], "train");
        assert!(args.contains(&"model=yolov8n-seg.pt".to_string()));
        assert!(args.contains(&"data=conf_yaml.yaml".to_string()));
        assert!(args.contains(&"batch=8".to_string()));
        assert!(args.contains(&"epochs=40".to_string()));
        assert!(args.contains(&"imgsz=640".to_string()));
        assert!(args.contains(&"device=cpu".to_string()));
    }

    #[test]
    fn test_missing_dataset_is_invalid_config() {
        let run = TrainingRun::new(TrainConfig {
            dataset: PathBuf::from("definitely/not/here.yaml"),
            ..TrainConfig::default()
        });
        assert!(matches!(
            run.run(),
            Err(ShoecutError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unspawnable_trainer_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("data.yaml");
        std::fs::write(&dataset, "names:\n  0: shoe\n").unwrap();

        let run = TrainingRun::new(TrainConfig {
            trainer_bin: "shoecut-trainer-that-does-not-exist".to_string(),
            dataset,
            ..TrainConfig::default()
        });
        assert!(matches!(run.run(), Err(ShoecutError::Model(_))));
    }
}
