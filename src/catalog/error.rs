//! Error types for catalog loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, validating, or writing a catalog file.
///
/// Any of these at startup is a fatal configuration failure: the run aborts
/// before a single leaf is processed.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read or written.
    #[error("catalog IO error at {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid JSON for the expected shape.
    #[error("catalog at {path} is not parseable: {source}")]
    Parse {
        /// Catalog path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A node sits deeper than the four supported levels.
    #[error("catalog node '{label}' nests deeper than the leaf level")]
    TooDeep {
        /// Label of the offending node.
        label: String,
    },

    /// Two leaves share the same derived key.
    #[error("duplicate leaf key '{key}' in catalog")]
    DuplicateLeafKey {
        /// The colliding key.
        key: String,
    },
}

impl CatalogError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
