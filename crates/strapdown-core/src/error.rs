use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while preparing IMU training data.
#[derive(Debug, Error)]
pub enum StrapdownError {
    /// A resampling target lies outside the reference timestamps.
    #[error("timestamp {value} is outside the reference range [{min}, {max}]")]
    OutOfRange {
        /// The offending target timestamp.
        value: f64,
        /// First reference timestamp.
        min: f64,
        /// Last reference timestamp.
        max: f64,
    },

    /// Malformed filter coefficients, inconsistent channel counts,
    /// invalid split fraction and similar caller mistakes.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A persisted dataset failed structural validation on load.
    #[error("corrupt dataset file {path:?}: {reason}")]
    CorruptDataset {
        /// File that failed validation.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A raw sensor log could not be parsed.
    #[error("{path:?}:{line}: {reason}")]
    Parse {
        /// Log file being read.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// What was wrong with the line.
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor construction error.
    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl StrapdownError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptDataset {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for strapdown data preparation.
pub type Result<T> = std::result::Result<T, StrapdownError>;
