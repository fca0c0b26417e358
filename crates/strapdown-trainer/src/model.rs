//! The model seam between run management and an actual learner.

use std::ops::RangeInclusive;
use std::path::Path;

use strapdown_core::Dataset;
use tracing::info;

use crate::callbacks::{CallbackAction, EpochLogs, TrainingCallback, dispatch};
use crate::error::Result;

/// A learner mapping `[L, d]` windows to `label_dim` targets.
pub trait SequenceModel {
    /// One pass over `train`; returns the mean training loss.
    fn train_epoch(&mut self, train: &Dataset, batch_size: usize) -> Result<f64>;

    /// Mean loss over `data` without updating weights.
    fn validation_loss(&self, data: &Dataset) -> Result<f64>;

    /// Row-major `[N, label_dim]` predictions.
    fn predict(&self, data: &Dataset) -> Result<Vec<f64>>;

    fn save_weights(&self, path: &Path) -> Result<()>;

    fn load_weights(&mut self, path: &Path) -> Result<()>;

    /// Train over `epochs`, consulting `callbacks` after each one.
    ///
    /// `on_epoch` sees every epoch together with the combined callback
    /// action, which is where checkpoints get written. An empty validation
    /// set counts as none.
    fn fit<F>(
        &mut self,
        train: &Dataset,
        validation: Option<&Dataset>,
        epochs: RangeInclusive<usize>,
        batch_size: usize,
        callbacks: &mut [Box<dyn TrainingCallback>],
        mut on_epoch: F,
    ) -> Result<FitSummary>
    where
        Self: Sized,
        F: FnMut(&mut Self, &EpochLogs, CallbackAction) -> Result<()>,
    {
        let validation = validation.filter(|v| !v.is_empty());
        let mut summary = FitSummary::default();

        for epoch in epochs {
            let train_loss = self.train_epoch(train, batch_size)?;
            let validation_loss = validation.map(|v| self.validation_loss(v)).transpose()?;
            let logs = EpochLogs {
                epoch,
                train_loss,
                validation_loss,
            };
            info!(epoch, train_loss, ?validation_loss, "epoch complete");

            let action = dispatch(callbacks, &logs);
            on_epoch(self, &logs, action)?;
            summary.history.push(logs);

            if action == CallbackAction::Stop {
                info!(epoch, "stopping early");
                summary.stopped_early = true;
                break;
            }
        }
        Ok(summary)
    }
}

/// What happened during [`SequenceModel::fit`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitSummary {
    pub history: Vec<EpochLogs>,
    pub stopped_early: bool,
}

impl FitSummary {
    pub fn last_epoch(&self) -> Option<usize> {
        self.history.last().map(|l| l.epoch)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MeanModel;
    use super::*;
    use crate::callbacks::{EarlyStopping, PeriodicCheckpoint};

    fn constant_labels(n: usize, value: f64) -> Dataset {
        Dataset::new(vec![0.0; n * 2], vec![value; n], 2, 1, 1).unwrap()
    }

    #[test]
    fn test_fit_runs_epoch_range() {
        let train = constant_labels(4, 8.0);
        let mut model = MeanModel::default();
        let mut seen = Vec::new();
        let summary = model
            .fit(&train, None, 3..=5, 2, &mut [], |_, logs, _| {
                seen.push(logs.epoch);
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec![3, 4, 5]);
        assert_eq!(summary.last_epoch(), Some(5));
        assert!(!summary.stopped_early);
        assert_eq!(model.value, 7.0);
        assert!(summary.history.iter().all(|l| l.validation_loss.is_none()));
    }

    #[test]
    fn test_fit_stops_early() {
        let train = constant_labels(4, 1.0);
        // Validation labels the model never gets closer to.
        let validation = constant_labels(2, -100.0);
        let mut model = MeanModel::default();
        let mut callbacks: Vec<Box<dyn TrainingCallback>> = vec![Box::new(EarlyStopping::new(2, 0.0))];

        let summary = model
            .fit(&train, Some(&validation), 1..=50, 4, &mut callbacks, |_, _, _| Ok(()))
            .unwrap();
        assert!(summary.stopped_early);
        assert_eq!(summary.last_epoch(), Some(3));
        assert_eq!(model.epochs_trained, 3);
    }

    #[test]
    fn test_fit_reports_checkpoint_actions() {
        let train = constant_labels(4, 1.0);
        let mut model = MeanModel::default();
        let mut callbacks: Vec<Box<dyn TrainingCallback>> = vec![Box::new(PeriodicCheckpoint::new(2))];
        let mut checkpoints = Vec::new();

        model
            .fit(&train, None, 1..=5, 4, &mut callbacks, |_, logs, action| {
                if action == CallbackAction::Checkpoint {
                    checkpoints.push(logs.epoch);
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(checkpoints, vec![2, 4]);
    }
}
