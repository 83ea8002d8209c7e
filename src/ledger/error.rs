//! Error types for the progress ledger and resolved-link catalog.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reading or writing durable run state.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The state file could not be read or written.
    #[error("state IO error at {path}: {source}")]
    Io {
        /// State file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The state file exists but is not valid JSON of the expected shape.
    #[error("state file {path} is corrupt: {source}")]
    Corrupt {
        /// State file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl LedgerError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corrupt-file error.
    pub fn corrupt(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.into(),
            source,
        }
    }
}
