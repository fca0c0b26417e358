//! # Checkpoint Evaluation
//!
//! Scores saved checkpoints on a held-out dataset. A progression evaluates
//! every checkpoint of a run in epoch order, which shows where a run started
//! to overfit.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strapdown_core::Dataset;
use tracing::info;

use crate::checkpoint::CheckpointIndex;
use crate::error::{Result, RunError};
use crate::model::SequenceModel;

pub const EVALUATION_FILE: &str = "evaluation.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub checkpoint: PathBuf,
    pub epoch: usize,
    pub loss: f64,
    /// Windows the loss was computed over.
    pub samples: usize,
}

/// Load `checkpoint` into `model` and compute its loss on `data`.
pub fn evaluate_checkpoint<M: SequenceModel>(
    model: &mut M,
    checkpoint: &Path,
    epoch: usize,
    data: &Dataset,
) -> Result<EvaluationReport> {
    if data.is_empty() {
        return Err(RunError::config("cannot evaluate on an empty dataset"));
    }
    model.load_weights(checkpoint)?;
    let loss = model.validation_loss(data)?;
    info!(epoch, loss, checkpoint = %checkpoint.display(), "evaluated checkpoint");

    Ok(EvaluationReport {
        checkpoint: checkpoint.to_path_buf(),
        epoch,
        loss,
        samples: data.len(),
    })
}

/// Evaluation reports of a run, ordered by epoch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgression {
    pub reports: Vec<EvaluationReport>,
}

impl From<Vec<EvaluationReport>> for TrainingProgression {
    fn from(mut reports: Vec<EvaluationReport>) -> Self {
        reports.sort_by_key(|r| r.epoch);
        Self { reports }
    }
}

impl TrainingProgression {
    /// Evaluate every checkpoint in `index`.
    pub fn evaluate<M: SequenceModel>(model: &mut M, index: &CheckpointIndex, data: &Dataset) -> Result<Self> {
        if index.is_empty() {
            return Err(RunError::CheckpointNotFound {
                dir: index.dir().to_path_buf(),
            });
        }
        let reports = index
            .iter()
            .map(|(epoch, path)| evaluate_checkpoint(model, path, epoch, data))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { reports })
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Lowest loss; the earlier epoch wins a tie.
    pub fn best(&self) -> Option<&EvaluationReport> {
        self.reports
            .iter()
            .filter(|r| r.loss.is_finite())
            .min_by(|a, b| a.loss.total_cmp(&b.loss).then(a.epoch.cmp(&b.epoch)))
    }

    pub fn latest(&self) -> Option<&EvaluationReport> {
        self.reports.last()
    }

    /// `(epoch, loss)` pairs for plotting.
    pub fn curve(&self) -> Vec<(usize, f64)> {
        self.reports.iter().map(|r| (r.epoch, r.loss)).collect()
    }

    /// Write `evaluation.json` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(EVALUATION_FILE);
        let partial = path.with_extension("json.partial");
        fs::write(&partial, serde_json::to_string_pretty(self)?)?;
        fs::rename(&partial, &path)?;
        Ok(path)
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let text = fs::read_to_string(dir.join(EVALUATION_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }
}
