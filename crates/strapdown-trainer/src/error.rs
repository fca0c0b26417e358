use std::path::PathBuf;

use strapdown_core::StrapdownError;
use thiserror::Error;

/// Errors raised while managing training runs.
#[derive(Debug, Error)]
pub enum RunError {
    /// No usable checkpoint exists in the version directory.
    #[error("no checkpoint found in {dir:?}")]
    CheckpointNotFound {
        /// Directory that was scanned.
        dir: PathBuf,
    },

    /// Weights for this epoch are already on disk and would be overwritten.
    #[error("checkpoint {path:?} already exists")]
    CheckpointExists { path: PathBuf },

    /// A lifecycle operation was called in a state that does not allow it.
    #[error("cannot {action} while the run is {from}")]
    InvalidTransition {
        /// Name of the current state.
        from: &'static str,
        /// Operation that was attempted.
        action: &'static str,
    },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Core(#[from] StrapdownError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run manifest or evaluation report could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

impl RunError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Result type alias for training-run operations.
pub type Result<T> = std::result::Result<T, RunError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = RunError::CheckpointNotFound {
            dir: PathBuf::from("ckpt/modelA_3"),
        };
        assert!(err.to_string().contains("modelA_3"));

        let err = RunError::InvalidTransition {
            from: "terminal",
            action: "begin training",
        };
        assert_eq!(
            err.to_string(),
            "cannot begin training while the run is terminal"
        );
    }

    #[test]
    fn core_errors_pass_through() {
        let err: RunError = StrapdownError::config("window length must be positive").into();
        assert_eq!(
            err.to_string(),
            "invalid configuration: window length must be positive"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RunError>();
    }
}
