//! Error types shared across the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Comprehensive error types for log access and monitor configuration.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// I/O error when reading files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The monitored log could not be opened
    #[error("Cannot open log file '{}': {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Monitor settings outside their accepted range
    #[error("Invalid setting '{field}': {reason}")]
    InvalidSettings { field: String, reason: String },

    /// Snapshot serialization failed
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    /// Create an open failure for the given path
    pub fn open_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OpenFailed {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid settings error
    pub fn invalid_settings(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
