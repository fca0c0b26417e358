//! Training configuration, loadable from a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strapdown_core::DatasetStore;

use crate::baseline::DEFAULT_LEARNING_RATE;
use crate::callbacks::DEFAULT_PATIENCE;
use crate::checkpoint::CheckpointNaming;
use crate::error::{Result, RunError};
use crate::run::ResumeRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub model_name: String,
    pub checkpoint_root: PathBuf,
    /// Directory holding `{dataset_stem}_train.safetensors` and `_test`.
    pub dataset_dir: PathBuf,
    pub dataset_stem: String,
    /// Epochs to run in this invocation, on top of any resumed epoch.
    pub max_epochs: usize,
    pub batch_size: usize,
    /// Checkpoint cadence in epochs.
    pub save_freq: usize,
    pub patience: usize,
    pub min_delta: f64,
    pub learning_rate: f64,
    /// Version to resume. `None` starts a fresh run.
    pub resume: Option<usize>,
    /// Checkpoint position within the resumed version, latest when unset.
    pub resume_position: Option<usize>,
    pub naming: CheckpointNaming,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            model_name: "strapdown".to_string(),
            checkpoint_root: PathBuf::from("checkpoints"),
            dataset_dir: PathBuf::from("data"),
            dataset_stem: "imu".to_string(),
            max_epochs: 10,
            batch_size: 32,
            save_freq: 1,
            patience: DEFAULT_PATIENCE,
            min_delta: 0.0,
            learning_rate: DEFAULT_LEARNING_RATE,
            resume: None,
            resume_position: None,
            naming: CheckpointNaming::default(),
        }
    }
}

impl TrainConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn with_checkpoint_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.checkpoint_root = root.into();
        self
    }

    pub fn with_dataset(mut self, dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        self.dataset_dir = dir.into();
        self.dataset_stem = stem.into();
        self
    }

    pub fn with_max_epochs(mut self, epochs: usize) -> Self {
        self.max_epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_save_freq(mut self, every: usize) -> Self {
        self.save_freq = every;
        self
    }

    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_resume(mut self, version: usize, position: Option<usize>) -> Self {
        self.resume = Some(version);
        self.resume_position = position;
        self
    }

    pub fn with_naming(mut self, naming: CheckpointNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_name.is_empty() {
            return Err(RunError::config("model name must not be empty"));
        }
        if self.model_name.contains(['/', '\\']) {
            return Err(RunError::config(format!(
                "model name {:?} must not contain path separators",
                self.model_name
            )));
        }
        if self.batch_size == 0 {
            return Err(RunError::config("batch size must be positive"));
        }
        if self.save_freq == 0 {
            return Err(RunError::config("save frequency must be positive"));
        }
        if self.patience == 0 {
            return Err(RunError::config("patience must be positive"));
        }
        if !(self.min_delta.is_finite() && self.min_delta >= 0.0) {
            return Err(RunError::config("min_delta must be a non-negative number"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RunError::config("learning rate must be positive"));
        }
        if self.naming.width == 0 || self.naming.extension.is_empty() {
            return Err(RunError::config("checkpoint naming needs a width and an extension"));
        }
        if self.resume.is_none() && self.resume_position.is_some() {
            return Err(RunError::config("resume position given without a version"));
        }
        Ok(())
    }

    pub fn resume_request(&self) -> Option<ResumeRequest> {
        self.resume.map(|version| ResumeRequest {
            version,
            position: self.resume_position,
        })
    }

    pub fn dataset_store(&self) -> DatasetStore {
        DatasetStore::new(&self.dataset_dir, &self.dataset_stem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.save_freq, 1);
        assert_eq!(config.patience, 5);
        assert_eq!(config.naming.width, 2);
        assert_eq!(config.naming.extension, "safetensors");
        assert!(config.validate().is_ok());
        assert!(config.resume_request().is_none());
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "model_name": "modelA", "max_epochs": 3, "resume": 2, "naming": {{ "width": 3, "extension": "ckpt" }} }}"#
        )
        .unwrap();

        let config = TrainConfig::from_file(file.path()).unwrap();
        assert_eq!(config.model_name, "modelA");
        assert_eq!(config.max_epochs, 3);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.naming, CheckpointNaming::new(3, "ckpt"));
        assert_eq!(config.resume_request(), Some(ResumeRequest::latest(2)));
    }

    #[test]
    fn test_validation() {
        assert!(TrainConfig::new("").validate().is_err());
        assert!(TrainConfig::new("a/b").validate().is_err());
        assert!(TrainConfig::default().with_batch_size(0).validate().is_err());
        assert!(TrainConfig::default().with_save_freq(0).validate().is_err());
        assert!(TrainConfig::default().with_learning_rate(-1.0).validate().is_err());

        let mut config = TrainConfig::default();
        config.resume_position = Some(1);
        assert!(matches!(config.validate().unwrap_err(), RunError::Configuration(_)));
    }

    #[test]
    fn test_dataset_store_paths() {
        let store = TrainConfig::default().with_dataset("out", "euroc").dataset_store();
        assert_eq!(store.train_path, PathBuf::from("out/euroc_train.safetensors"));
        assert_eq!(store.test_path, PathBuf::from("out/euroc_test.safetensors"));
    }
}
