//! Training callbacks: early stopping and periodic checkpointing.

use serde::{Deserialize, Serialize};

/// Losses reported at the end of an epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochLogs {
    pub epoch: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
}

/// Action a callback can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Continue,
    Checkpoint,
    Stop,
}

pub trait TrainingCallback: Send {
    /// Called once per completed epoch.
    fn on_epoch_end(&mut self, logs: &EpochLogs) -> CallbackAction;
}

/// Combine the requests of several callbacks; `Stop` wins over
/// `Checkpoint`, which wins over `Continue`.
pub fn dispatch(callbacks: &mut [Box<dyn TrainingCallback>], logs: &EpochLogs) -> CallbackAction {
    let mut action = CallbackAction::Continue;
    for cb in callbacks.iter_mut() {
        action = match (action, cb.on_epoch_end(logs)) {
            (CallbackAction::Stop, _) | (_, CallbackAction::Stop) => CallbackAction::Stop,
            (CallbackAction::Checkpoint, _) | (_, CallbackAction::Checkpoint) => CallbackAction::Checkpoint,
            _ => CallbackAction::Continue,
        };
    }
    action
}

pub const DEFAULT_PATIENCE: usize = 5;

/// Stops training once the validation loss has not improved by more than
/// `min_delta` for `patience` consecutive epochs. Falls back to the training
/// loss when no validation set is available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStopping {
    pub patience: usize,
    pub min_delta: f64,
    #[serde(skip)]
    counter: usize,
    #[serde(skip)]
    best_loss: Option<f64>,
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self::new(DEFAULT_PATIENCE, 0.0)
    }
}

impl EarlyStopping {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            patience,
            min_delta,
            counter: 0,
            best_loss: None,
        }
    }

    pub fn best_loss(&self) -> Option<f64> {
        self.best_loss
    }

    fn observe(&mut self, loss: f64) -> CallbackAction {
        // NaN compares false, so it never counts as an improvement.
        let improved = self.best_loss.is_none_or(|best| loss < best - self.min_delta);
        if improved {
            self.best_loss = Some(loss);
            self.counter = 0;
            return CallbackAction::Continue;
        }

        self.counter += 1;
        if self.counter >= self.patience {
            CallbackAction::Stop
        } else {
            CallbackAction::Continue
        }
    }
}

impl TrainingCallback for EarlyStopping {
    fn on_epoch_end(&mut self, logs: &EpochLogs) -> CallbackAction {
        self.observe(logs.validation_loss.unwrap_or(logs.train_loss))
    }
}

/// Requests a checkpoint every `every` epochs, counted by epoch number so a
/// resumed run keeps the same cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicCheckpoint {
    pub every: usize,
}

impl PeriodicCheckpoint {
    pub fn new(every: usize) -> Self {
        Self { every }
    }
}

impl TrainingCallback for PeriodicCheckpoint {
    fn on_epoch_end(&mut self, logs: &EpochLogs) -> CallbackAction {
        if self.every > 0 && logs.epoch % self.every == 0 {
            CallbackAction::Checkpoint
        } else {
            CallbackAction::Continue
        }
    }
}
