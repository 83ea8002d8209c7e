//! Scoped ownership of the durable run state.
//!
//! A [`Checkpoint`] loads the progress ledger and the resolved-link catalog,
//! hands out mutations, flushes every `interval` processed leaves, and
//! flushes once more when finished or dropped.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::catalog::{LeafKey, LeafPath};
use crate::ledger::{LedgerError, ProgressLedger, ResolvedLinkCatalog};

/// Default number of processed leaves between flushes.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 10;

/// Ledger file name inside the state directory.
pub const LEDGER_FILE: &str = "progress.json";

/// Resolved-link file name inside the state directory.
pub const LINKS_FILE: &str = "resolved_links.json";

/// Catalog file name inside the state directory.
pub const CATALOG_FILE: &str = "catalog.json";

/// Locations of the durable run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// Progress ledger file.
    pub ledger: PathBuf,
    /// Resolved-link catalog file.
    pub links: PathBuf,
}

impl StatePaths {
    /// Standard file names inside `state_dir`.
    #[must_use]
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            ledger: state_dir.join(LEDGER_FILE),
            links: state_dir.join(LINKS_FILE),
        }
    }
}

/// Ledger and link catalog held for the duration of a run.
#[derive(Debug)]
pub struct Checkpoint {
    ledger: ProgressLedger,
    links: ResolvedLinkCatalog,
    paths: StatePaths,
    interval: usize,
    since_flush: usize,
    dirty: bool,
    finished: bool,
}

impl Checkpoint {
    /// Loads both stores. Missing files start empty.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if either file is unreadable or corrupt.
    pub fn open(paths: StatePaths, interval: usize) -> Result<Self, LedgerError> {
        let ledger = ProgressLedger::load(&paths.ledger)?;
        let links = ResolvedLinkCatalog::load(&paths.links)?;
        debug!(
            succeeded = ledger.succeeded_count(),
            failed = ledger.failed_count(),
            links = links.len(),
            "run state loaded"
        );
        Ok(Self {
            ledger,
            links,
            paths,
            interval: interval.max(1),
            since_flush: 0,
            dirty: false,
            finished: false,
        })
    }

    /// Current ledger.
    #[must_use]
    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Current link catalog.
    #[must_use]
    pub fn links(&self) -> &ResolvedLinkCatalog {
        &self.links
    }

    /// Records a freshly resolved URL.
    pub fn record_link(&mut self, path: &LeafPath, url: &str) {
        self.links.record(path, url, Utc::now());
        self.dirty = true;
    }

    /// Marks a leaf succeeded.
    pub fn mark_succeeded(&mut self, key: LeafKey) {
        self.dirty |= self.ledger.mark_succeeded(key);
    }

    /// Marks a leaf failed.
    pub fn mark_failed(&mut self, key: LeafKey) {
        self.dirty |= self.ledger.mark_failed(key);
    }

    /// Counts one processed leaf and flushes when the interval is reached.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the flush fails.
    pub fn leaf_processed(&mut self) -> Result<(), LedgerError> {
        self.since_flush += 1;
        if self.since_flush >= self.interval {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes both stores if anything changed since the last flush.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if either write fails.
    pub fn flush(&mut self) -> Result<(), LedgerError> {
        self.since_flush = 0;
        if !self.dirty {
            return Ok(());
        }
        self.ledger.save(&self.paths.ledger)?;
        self.links.save(&self.paths.links)?;
        self.dirty = false;
        info!(
            succeeded = self.ledger.succeeded_count(),
            failed = self.ledger.failed_count(),
            links = self.links.len(),
            "checkpoint written"
        );
        Ok(())
    }

    /// Flushes and releases the stores.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the final flush fails. The stores are not
    /// flushed again on drop in that case.
    pub fn finish(mut self) -> Result<(ProgressLedger, ResolvedLinkCatalog), LedgerError> {
        self.finished = true;
        self.flush()?;
        Ok((
            std::mem::take(&mut self.ledger),
            std::mem::take(&mut self.links),
        ))
    }
}

impl Drop for Checkpoint {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(error) = self.flush() {
            warn!(%error, "checkpoint flush on drop failed");
        }
    }
}
