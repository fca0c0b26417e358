//! # Training Session
//!
//! Ties a [`SequenceModel`] to a [`RunManager`]: pick or create the run
//! version, restore weights on resume, train with early stopping and
//! periodic checkpoints, then score the latest checkpoint on the test split.

use std::path::PathBuf;

use strapdown_core::TrainTestSplit;
use tracing::{info, warn};

use crate::callbacks::{CallbackAction, EarlyStopping, PeriodicCheckpoint, TrainingCallback};
use crate::config::TrainConfig;
use crate::error::Result;
use crate::evaluate::{EvaluationReport, TrainingProgression, evaluate_checkpoint};
use crate::manifest::EpochRecord;
use crate::model::SequenceModel;
use crate::run::{RunManager, RunState, StopReason};

/// Result of [`TrainingSession::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutcome {
    pub version: usize,
    /// Epoch the run started from, 0 for a fresh run.
    pub start_epoch: usize,
    pub last_epoch: usize,
    pub reason: StopReason,
    pub evaluation: Option<EvaluationReport>,
}

pub struct TrainingSession<M: SequenceModel> {
    config: TrainConfig,
    model: M,
    manager: RunManager,
}

impl<M: SequenceModel> TrainingSession<M> {
    pub fn new(config: TrainConfig, model: M) -> Result<Self> {
        config.validate()?;
        let manager = RunManager::new(
            &config.checkpoint_root,
            &config.model_name,
            config.naming.clone(),
        );
        Ok(Self {
            config,
            model,
            manager,
        })
    }

    pub fn manager(&self) -> &RunManager {
        &self.manager
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    fn callbacks(&self) -> Vec<Box<dyn TrainingCallback>> {
        vec![
            Box::new(EarlyStopping::new(self.config.patience, self.config.min_delta)),
            Box::new(PeriodicCheckpoint::new(self.config.save_freq)),
        ]
    }

    /// Train on `data.train`, validating and finally evaluating on
    /// `data.test`.
    pub fn run(&mut self, data: &TrainTestSplit) -> Result<SessionOutcome> {
        self.manager.start_or_resume(self.config.resume_request())?;
        if let RunState::Resumed { checkpoint, .. } = self.manager.state() {
            let checkpoint = checkpoint.clone();
            self.model.load_weights(&checkpoint)?;
        }

        let start_epoch = self.manager.begin_training()?;
        let final_epoch = start_epoch + self.config.max_epochs;
        let mut callbacks = self.callbacks();
        info!(
            model = %self.config.model_name,
            version = ?self.manager.state().version(),
            start_epoch,
            final_epoch,
            train = data.train.len(),
            test = data.test.len(),
            "training"
        );

        let manager = &mut self.manager;
        let summary = self.model.fit(
            &data.train,
            Some(&data.test),
            start_epoch + 1..=final_epoch,
            self.config.batch_size,
            &mut callbacks,
            |model, logs, action| {
                let mut record = EpochRecord::new(logs.epoch).with_train_loss(logs.train_loss);
                if let Some(loss) = logs.validation_loss {
                    record = record.with_validation_loss(loss);
                }
                // The final epoch is always saved so the run ends on a checkpoint.
                if action != CallbackAction::Continue || logs.epoch == final_epoch {
                    let path = manager.checkpoint_path(logs.epoch)?;
                    model.save_weights(&path)?;
                    record = record.with_checkpoint(path);
                }
                manager.record_epoch(record)
            },
        )?;

        let reason = if summary.stopped_early {
            StopReason::EarlyStopping
        } else {
            StopReason::EpochBudget
        };
        self.manager.finish(reason)?;
        let last_epoch = summary.last_epoch().unwrap_or(start_epoch);

        let evaluation = self.evaluate_latest(data)?;
        let version = self.manager.state().version().unwrap_or_default();
        Ok(SessionOutcome {
            version,
            start_epoch,
            last_epoch,
            reason,
            evaluation,
        })
    }

    fn evaluate_latest(&mut self, data: &TrainTestSplit) -> Result<Option<EvaluationReport>> {
        if data.test.is_empty() {
            warn!("test split is empty, skipping evaluation");
            return Ok(None);
        }
        let Some((epoch, checkpoint)) = self.manager.latest_checkpoint()? else {
            warn!("run has no checkpoints, skipping evaluation");
            return Ok(None);
        };

        let report = evaluate_checkpoint(&mut self.model, &checkpoint, epoch, &data.test)?;
        if let Some(dir) = self.manager.version_dir() {
            TrainingProgression::from(vec![report.clone()]).save(&dir)?;
        }
        Ok(Some(report))
    }

    /// Directory of the run this session is bound to.
    pub fn version_dir(&self) -> Option<PathBuf> {
        self.manager.version_dir()
    }
}
