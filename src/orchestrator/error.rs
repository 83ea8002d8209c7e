//! Error types for a resolve/download run.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::ledger::LedgerError;

/// Errors that abort a whole run.
///
/// Per-leaf failures never appear here; they are recorded in the ledger.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Run state could not be loaded or flushed.
    #[error("run state error: {0}")]
    Ledger(#[source] LedgerError),

    /// The catalog could not be loaded.
    #[error("catalog error: {0}")]
    Catalog(#[source] CatalogError),

    /// A collaborator reported a failure no leaf can recover from.
    #[error("fatal failure while processing {leaf}: {reason}")]
    Fatal {
        /// Leaf being processed.
        leaf: String,
        /// What failed.
        reason: String,
    },
}

impl OrchestratorError {
    /// Wraps a ledger error.
    #[must_use]
    pub fn ledger(source: LedgerError) -> Self {
        Self::Ledger(source)
    }

    /// Wraps a catalog error.
    #[must_use]
    pub fn catalog(source: CatalogError) -> Self {
        Self::Catalog(source)
    }

    /// Creates a fatal collaborator error.
    pub fn fatal(leaf: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fatal {
            leaf: leaf.into(),
            reason: reason.into(),
        }
    }
}

/// A `--shard` value that is not `i/n` with `1 <= i <= n`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid shard '{input}': expected i/n with 1 <= i <= n")]
pub struct InvalidShard {
    /// Rejected input.
    pub input: String,
}
