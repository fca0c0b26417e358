//! # Strapdown Trainer
//!
//! Versioned, resumable training runs over windowed IMU datasets. The
//! [`RunManager`] numbers run directories and finds checkpoints to resume
//! from; [`TrainingSession`] drives any [`SequenceModel`] through a run with
//! early stopping, periodic checkpoints and a final evaluation.
pub mod baseline;
pub mod callbacks;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod manifest;
pub mod model;
pub mod run;
pub mod session;

// Re-export primary API
pub use baseline::LinearRegressor;
pub use callbacks::{CallbackAction, EarlyStopping, EpochLogs, PeriodicCheckpoint, TrainingCallback};
pub use checkpoint::{CheckpointIndex, CheckpointNaming, list_versions, next_version, version_dir};
pub use config::TrainConfig;
pub use error::{Result, RunError};
pub use evaluate::{EvaluationReport, TrainingProgression, evaluate_checkpoint};
pub use manifest::{BranchOrigin, EpochRecord, RunManifest};
pub use model::{FitSummary, SequenceModel};
pub use run::{ResumeRequest, RunManager, RunState, StopReason};
pub use session::{SessionOutcome, TrainingSession};
