//! Failure taxonomy shared by the navigator, resolver, fetcher, and orchestrator.
//!
//! Every per-leaf error is classified into a [`FailureKind`] so the
//! orchestrator can decide whether another attempt could help. Only
//! [`FailureKind::FatalConfiguration`] aborts a whole run.

use std::fmt;

/// Classification of a per-leaf or run-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    /// A cascade level legitimately has no further options. Not an error.
    EmptyBranch,
    /// A wait timed out or an expected control was absent.
    TransientUi,
    /// Fetched bytes did not match the expected content type.
    MalformedResponse,
    /// Retrying the same leaf cannot succeed.
    PermanentLeaf,
    /// The run cannot proceed at all (bad catalog, no browser session).
    FatalConfiguration,
}

impl FailureKind {
    /// Returns true if another attempt at the same leaf may succeed.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::TransientUi | Self::MalformedResponse)
    }

    /// Returns true if the failure must abort the run.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::FatalConfiguration)
    }

    /// Short human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::EmptyBranch => "empty branch",
            Self::TransientUi => "transient UI failure",
            Self::MalformedResponse => "malformed response",
            Self::PermanentLeaf => "permanent leaf failure",
            Self::FatalConfiguration => "fatal configuration failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
