//! Error types for browser session operations.

use std::time::Duration;

use thiserror::Error;

use super::{ElementRef, Locator};
use crate::failure::FailureKind;

/// Errors raised by a [`super::BrowserSession`].
#[derive(Debug, Error)]
pub enum BrowserError {
    /// A bounded wait elapsed without the element appearing.
    #[error("timed out after {timeout:?} waiting for {locator}")]
    Timeout {
        /// What was awaited.
        locator: String,
        /// The bound.
        timeout: Duration,
    },

    /// An expected control is not on the page.
    #[error("control not found: {locator}")]
    NotFound {
        /// What was looked for.
        locator: String,
    },

    /// The handle is unknown to the session (stale or from another page).
    #[error("stale element handle {0:?}")]
    StaleElement(ElementRef),

    /// The window handle does not exist.
    #[error("no such window: {0}")]
    NoSuchWindow(String),

    /// The session could not be established.
    #[error("browser could not be started: {reason}")]
    Launch {
        /// Why.
        reason: String,
    },

    /// The session was quit or the connection dropped.
    #[error("browser session is closed")]
    Closed,

    /// Any other protocol or script failure.
    #[error("browser protocol error during {action}: {message}")]
    Protocol {
        /// Operation in progress.
        action: &'static str,
        /// Underlying message.
        message: String,
    },
}

impl BrowserError {
    /// Creates a timeout error.
    pub fn timeout(locator: &Locator, timeout: Duration) -> Self {
        Self::Timeout {
            locator: locator.to_string(),
            timeout,
        }
    }

    /// Creates a not-found error.
    pub fn not_found(locator: &Locator) -> Self {
        Self::NotFound {
            locator: locator.to_string(),
        }
    }

    /// Creates a protocol error from any displayable cause.
    pub fn protocol(action: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Protocol {
            action,
            message: cause.to_string(),
        }
    }

    /// Creates a launch error.
    pub fn launch(reason: impl Into<String>) -> Self {
        Self::Launch {
            reason: reason.into(),
        }
    }

    /// Maps the error onto the failure taxonomy.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Launch { .. } | Self::Closed => FailureKind::FatalConfiguration,
            Self::Timeout { .. }
            | Self::NotFound { .. }
            | Self::StaleElement(_)
            | Self::NoSuchWindow(_)
            | Self::Protocol { .. } => FailureKind::TransientUi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient() {
        let err = BrowserError::timeout(&Locator::name("ddl_taluk"), Duration::from_secs(10));
        assert_eq!(err.failure_kind(), FailureKind::TransientUi);
        assert!(err.to_string().contains("name=ddl_taluk"));
    }

    #[test]
    fn test_lost_session_is_fatal() {
        assert_eq!(BrowserError::Closed.failure_kind(), FailureKind::FatalConfiguration);
        assert_eq!(
            BrowserError::launch("no chrome").failure_kind(),
            FailureKind::FatalConfiguration
        );
    }
}
