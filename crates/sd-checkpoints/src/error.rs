//! Error types for checkpoint identification.
//!
//! Expected absences (missing file for the weak hash, cache misses) are not
//! errors and never show up here; they are modeled with `Option` or sentinel
//! values at the call site.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the checkpoint library.
#[derive(Debug, Error)]
pub enum CheckpointError {
    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Container format errors
    #[error("{0} is not a safetensors file")]
    NotSafetensors(PathBuf),

    #[error("Safetensors header of {size} bytes in {path} is too large")]
    HeaderTooLarge { path: PathBuf, size: u64 },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        CheckpointError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        CheckpointError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CheckpointError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CheckpointError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether the error is a format problem with the file contents rather
    /// than a failure to access the file.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CheckpointError::NotSafetensors(_)
                | CheckpointError::HeaderTooLarge { .. }
                | CheckpointError::Json { .. }
        )
    }
}
