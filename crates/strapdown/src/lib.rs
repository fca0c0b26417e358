//! # Strapdown
//!
//! Learned inertial odometry plumbing: turn raw IMU and ground-truth logs
//! into labelled windows ([`data`]) and train models on them with versioned,
//! resumable runs ([`trainer`]).
pub use strapdown_core as data;
pub use strapdown_trainer as trainer;

pub use strapdown_core::{
    Dataset, DatasetStore, LabelRule, Pipeline, PipelineConfig, Recording, Resampler, SplitConfig,
    StrapdownError, TimeSeries, TrainTestSplit, WindowAssembler, WindowConfig,
};
pub use strapdown_trainer::{
    CheckpointNaming, RunError, RunManager, RunState, SequenceModel, TrainConfig, TrainingSession,
};
