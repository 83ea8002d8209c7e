//! Error types for document fetches.

use std::path::PathBuf;

use thiserror::Error;

use crate::failure::FailureKind;

/// Errors that can occur while fetching a resolved document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection refused, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not finish within the total timeout.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL being fetched.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response declared a content type that is not a document.
    #[error("unexpected content type {content_type:?} fetching {url}")]
    ContentType {
        /// The URL being fetched.
        url: String,
        /// Declared type, if any.
        content_type: Option<String>,
    },

    /// File system error while writing the artifact.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The resolved URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client could not be built: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a network error, classifying client-side timeouts separately.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a content-type error.
    pub fn content_type(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::ContentType {
            url: url.into(),
            content_type,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps the error onto the failure taxonomy.
    ///
    /// Client errors other than 408 and 429 will not change on retry; a
    /// soft-404 HTML page is a malformed response and is retried.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => FailureKind::TransientUi,
            Self::HttpStatus { status, .. } => match status {
                408 | 429 => FailureKind::TransientUi,
                400..=499 => FailureKind::PermanentLeaf,
                _ => FailureKind::TransientUi,
            },
            Self::ContentType { .. } => FailureKind::MalformedResponse,
            Self::Io { .. } | Self::InvalidUrl { .. } => FailureKind::PermanentLeaf,
            Self::ClientBuild { .. } => FailureKind::FatalConfiguration,
        }
    }
}
