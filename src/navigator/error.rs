//! Error types for cascade navigation.

use thiserror::Error;

use super::CascadeLevel;
use crate::browser::BrowserError;
use crate::failure::FailureKind;

/// Navigation errors that cannot be downgraded to an empty selection.
///
/// Timeouts and missing controls at a level are not errors: they come back as
/// a halted [`super::Selection`]. Only a lost session or an unreachable portal
/// escapes as `NavigatorError`.
#[derive(Debug, Error)]
pub enum NavigatorError {
    /// The browser session failed irrecoverably.
    #[error("browser session failed at {level}: {source}")]
    Session {
        /// Level being driven.
        level: CascadeLevel,
        /// Underlying session error.
        #[source]
        source: BrowserError,
    },

    /// The entry page never showed the first cascade control.
    #[error("portal at {url} did not load: {source}")]
    PortalUnavailable {
        /// Portal address.
        url: String,
        /// Underlying session error.
        #[source]
        source: BrowserError,
    },
}

impl NavigatorError {
    /// Creates a session error.
    pub fn session(level: CascadeLevel, source: BrowserError) -> Self {
        Self::Session { level, source }
    }

    /// Creates a portal-unavailable error.
    pub fn portal_unavailable(url: impl Into<String>, source: BrowserError) -> Self {
        Self::PortalUnavailable {
            url: url.into(),
            source,
        }
    }

    /// Maps the error onto the failure taxonomy.
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Session { source, .. } => source.failure_kind(),
            Self::PortalUnavailable { .. } => FailureKind::FatalConfiguration,
        }
    }
}
