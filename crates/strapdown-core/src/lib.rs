//! # Strapdown Core
//!
//! Data preparation for learned inertial odometry. Aligns IMU logs with
//! ground truth, filters them causally, slices them into labelled windows
//! and persists train/test splits as safetensors files.
//!
//! ## Quick Start
//!
//! ```rust
//! use strapdown_core::{LastSample, TimeSeries, WindowAssembler, WindowConfig};
//!
//! let ts: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
//! let rows: Vec<Vec<f64>> = (0..100).map(|i| vec![i as f64]).collect();
//! let series = TimeSeries::from_rows(ts, &rows).unwrap();
//!
//! let assembler = WindowAssembler::new(WindowConfig::new(20), LastSample::new(vec![0]));
//! let dataset = assembler.assemble(&series).unwrap();
//!
//! assert_eq!(dataset.x_shape(), [5, 20, 1]);
//! assert_eq!(dataset.label(0), &[19.0]);
//! ```
pub mod dataset;
pub mod error;
pub mod filter;
pub mod label;
pub mod log;
pub mod pipeline;
pub mod resample;
pub mod series;
pub mod split;
pub mod stft;
pub mod store;
pub mod window;

// Re-export primary API
pub use dataset::Dataset;
pub use error::{Result, StrapdownError};
pub use filter::{FilterDiagnostics, LinearFilter};
pub use label::{EndpointDelta, IntegratedDelta, LabelRule, LastSample, Window};
pub use log::{CsvOptions, NANOSECONDS, read_csv_series};
pub use pipeline::{Pipeline, PipelineConfig, Recording};
pub use resample::{QuaternionInterpolation, Resampler};
pub use series::TimeSeries;
pub use split::{SplitConfig, TrainTestSplit, split};
pub use stft::{Spectrogram, stft_magnitude};
pub use store::{DatasetStore, load_dataset, save_dataset};
pub use window::{WindowAssembler, WindowConfig};
