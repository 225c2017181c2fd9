//! Centralized error types for mailtriage.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailtriage library.
#[derive(Error, Debug)]
pub enum TriageError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified input file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The byte stream could not be parsed as a MIME message at all.
    ///
    /// This is the only per-message hard failure; decode problems inside an
    /// otherwise parseable message are recovered lossily instead.
    #[error("Unparseable message '{filename}': not a valid RFC 5322/MIME stream")]
    UnparseableMessage { filename: String },

    /// The configuration file or a CLI override is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The classifier service could not be reached or answered abnormally.
    ///
    /// Callers recover from this by defaulting every pending verdict; it is
    /// never propagated out of a batch analysis.
    #[error("Classifier error: {0}")]
    Classifier(String),
}

/// Convenience alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
