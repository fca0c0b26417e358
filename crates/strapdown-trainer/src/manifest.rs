//! Per-version run manifest (`run.json`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const MANIFEST_FILE: &str = "run.json";

/// Losses and checkpoint of one completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub train_loss: Option<f64>,
    pub validation_loss: Option<f64>,
    /// Set when weights were written for this epoch.
    pub checkpoint: Option<PathBuf>,
}

impl EpochRecord {
    pub fn new(epoch: usize) -> Self {
        Self {
            epoch,
            train_loss: None,
            validation_loss: None,
            checkpoint: None,
        }
    }

    pub fn with_train_loss(mut self, loss: f64) -> Self {
        self.train_loss = Some(loss);
        self
    }

    pub fn with_validation_loss(mut self, loss: f64) -> Self {
        self.validation_loss = Some(loss);
        self
    }

    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }
}

/// Version and epoch a branched run was seeded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOrigin {
    pub version: usize,
    pub epoch: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub model_name: String,
    pub version: usize,
    pub last_epoch: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branched_from: Option<BranchOrigin>,
    #[serde(default)]
    pub history: Vec<EpochRecord>,
}

impl RunManifest {
    pub fn new(model_name: impl Into<String>, version: usize) -> Self {
        Self {
            model_name: model_name.into(),
            version,
            last_epoch: None,
            branched_from: None,
            history: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: BranchOrigin) -> Self {
        self.branched_from = Some(origin);
        self
    }

    /// Read `run.json` from a version directory, if present.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write `run.json` into a version directory via a `.partial` rename.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let partial = path.with_extension("json.partial");
        fs::write(&partial, serde_json::to_string_pretty(self)?)?;
        fs::rename(&partial, &path)?;
        Ok(())
    }

    /// Append a record, or replace the one for the same epoch.
    pub fn record(&mut self, record: EpochRecord) {
        self.last_epoch = Some(self.last_epoch.map_or(record.epoch, |e| e.max(record.epoch)));
        match self.history.iter_mut().find(|r| r.epoch == record.epoch) {
            Some(existing) => *existing = record,
            None => self.history.push(record),
        }
    }

    pub fn get(&self, epoch: usize) -> Option<&EpochRecord> {
        self.history.iter().find(|r| r.epoch == epoch)
    }

    /// Epochs with a recorded validation loss, lowest loss first.
    pub fn ranked_by_validation(&self) -> Vec<&EpochRecord> {
        let mut ranked: Vec<&EpochRecord> = self
            .history
            .iter()
            .filter(|r| r.validation_loss.is_some_and(f64::is_finite))
            .collect();
        ranked.sort_by(|a, b| {
            a.validation_loss
                .partial_cmp(&b.validation_loss)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.epoch.cmp(&b.epoch))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(RunManifest::load(tmp.path()).unwrap().is_none());

        let mut manifest = RunManifest::new("modelA", 3);
        manifest.record(
            EpochRecord::new(1)
                .with_train_loss(0.5)
                .with_validation_loss(0.75)
                .with_checkpoint(tmp.path().join("modelA_01.safetensors")),
        );
        manifest.save(tmp.path()).unwrap();

        let loaded = RunManifest::load(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded, manifest);
        assert!(!tmp.path().join("run.json.partial").exists());
    }

    #[test]
    fn test_record_replaces_same_epoch() {
        let mut manifest = RunManifest::new("modelA", 0);
        manifest.record(EpochRecord::new(2).with_validation_loss(1.0));
        manifest.record(EpochRecord::new(2).with_validation_loss(0.5));
        assert_eq!(manifest.history.len(), 1);
        assert_eq!(manifest.get(2).unwrap().validation_loss, Some(0.5));
        assert_eq!(manifest.last_epoch, Some(2));
    }

    #[test]
    fn test_ranking_skips_missing_losses() {
        let mut manifest = RunManifest::new("modelA", 0);
        manifest.record(EpochRecord::new(1).with_validation_loss(0.9));
        manifest.record(EpochRecord::new(2));
        manifest.record(EpochRecord::new(3).with_validation_loss(0.4));
        manifest.record(EpochRecord::new(4).with_validation_loss(f64::NAN));
        manifest.record(EpochRecord::new(5).with_validation_loss(0.4));

        let epochs: Vec<usize> = manifest.ranked_by_validation().iter().map(|r| r.epoch).collect();
        assert_eq!(epochs, vec![3, 5, 1]);
    }
}
