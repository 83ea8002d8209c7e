//! Progress ledger: durable record of settled leaves.
//!
//! A leaf key moves from absent to succeeded or from absent to failed and
//! never moves back on its own. Failed keys are skipped by every later run
//! until an operator clears them with [`ProgressLedger::clear_failed`]
//! (the `reset-failed` command). The two sets are always disjoint.
//!
//! # File format
//!
//! ```json
//! { "succeeded": ["1_10_100_1"], "failed": ["1_10_100_2"] }
//! ```
//!
//! Files written by older tooling with a `downloaded` key are accepted.

mod error;
mod links;
mod store;

pub use error::LedgerError;
pub use links::{ResolvedLink, ResolvedLinkCatalog};
pub use store::write_atomically;

use std::collections::BTreeSet;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::LeafKey;

/// Reads a JSON state file, returning the default value if it does not exist.
pub(crate) fn read_json_or_default<T>(path: &Path) -> Result<T, LedgerError>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| LedgerError::corrupt(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "state file absent; starting empty");
            Ok(T::default())
        }
        Err(e) => Err(LedgerError::io(path, e)),
    }
}

/// Serialises `value` as pretty JSON and replaces `path` atomically.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), LedgerError> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| LedgerError::corrupt(path, e))?;
    write_atomically(path, &body).map_err(|e| LedgerError::io(path, e))
}

/// Outcome of a [`ProgressLedger::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Keys newly added to the succeeded set.
    pub succeeded_added: usize,
    /// Keys newly added to the failed set.
    pub failed_added: usize,
    /// Keys moved from failed to succeeded because another ledger succeeded.
    pub promoted: usize,
}

/// Succeeded and permanently failed leaf keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLedger {
    #[serde(default, alias = "downloaded")]
    succeeded: BTreeSet<LeafKey>,
    #[serde(default)]
    failed: BTreeSet<LeafKey>,
}

impl ProgressLedger {
    /// Loads a ledger; a missing file is an empty ledger.
    ///
    /// Keys present in both sets (hand edits, legacy files) are kept as
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the file is unreadable or corrupt.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let mut ledger: Self = read_json_or_default(path)?;
        let overlap: Vec<LeafKey> = ledger
            .succeeded
            .intersection(&ledger.failed)
            .cloned()
            .collect();
        if !overlap.is_empty() {
            warn!(
                count = overlap.len(),
                path = %path.display(),
                "keys recorded as both succeeded and failed; keeping succeeded"
            );
            for key in &overlap {
                ledger.failed.remove(key);
            }
        }
        Ok(ledger)
    }

    /// Writes the ledger atomically.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the write fails.
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        write_json(path, self)
    }

    /// True if `key` is in either set.
    #[must_use]
    pub fn is_settled(&self, key: &LeafKey) -> bool {
        self.succeeded.contains(key) || self.failed.contains(key)
    }

    /// True if `key` succeeded.
    #[must_use]
    pub fn is_succeeded(&self, key: &LeafKey) -> bool {
        self.succeeded.contains(key)
    }

    /// True if `key` permanently failed.
    #[must_use]
    pub fn is_failed(&self, key: &LeafKey) -> bool {
        self.failed.contains(key)
    }

    /// Records a success. A success always wins over a recorded failure.
    /// Returns true if the key was not already succeeded.
    pub fn mark_succeeded(&mut self, key: LeafKey) -> bool {
        self.failed.remove(&key);
        self.succeeded.insert(key)
    }

    /// Records a permanent failure. Has no effect on a succeeded key.
    /// Returns true if the key was newly recorded as failed.
    pub fn mark_failed(&mut self, key: LeafKey) -> bool {
        if self.succeeded.contains(&key) {
            return false;
        }
        self.failed.insert(key)
    }

    /// Clears the failed set, making those keys eligible again. Returns how
    /// many keys were cleared.
    pub fn clear_failed(&mut self) -> usize {
        let cleared = self.failed.len();
        self.failed.clear();
        cleared
    }

    /// Unions `other` into this ledger. A key succeeded in either ledger ends
    /// up succeeded.
    pub fn merge(&mut self, other: &Self) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for key in &other.succeeded {
            if self.failed.contains(key) {
                summary.promoted += 1;
            }
            if self.mark_succeeded(key.clone()) {
                summary.succeeded_added += 1;
            }
        }
        for key in &other.failed {
            if self.mark_failed(key.clone()) {
                summary.failed_added += 1;
            }
        }
        summary
    }

    /// Number of succeeded keys.
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.succeeded.len()
    }

    /// Number of failed keys.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Succeeded keys in sorted order.
    pub fn succeeded(&self) -> impl Iterator<Item = &LeafKey> {
        self.succeeded.iter()
    }

    /// Failed keys in sorted order.
    pub fn failed(&self) -> impl Iterator<Item = &LeafKey> {
        self.failed.iter()
    }
}
