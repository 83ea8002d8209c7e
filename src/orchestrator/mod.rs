//! Resolve/download run over the leaves of a catalog.
//!
//! The orchestrator walks the catalog in order, skips every leaf the ledger
//! has already settled, and for each remaining leaf resolves a URL, records
//! it, and fetches the document. Each stage gets its own attempt budget from
//! the [`RetryPolicy`]. Per-leaf failures land in the ledger's failed set;
//! only a fatal failure stops the run.
//!
//! A leaf whose URL was recorded by an earlier run skips resolution and is
//! fetched straight away. If that fetch gives up, the leaf is resolved again.
//!
//! Leaves are processed one at a time: a browser session cannot interleave
//! two cascades.

mod checkpoint;
mod error;
mod retry;

pub use checkpoint::{
    CATALOG_FILE, Checkpoint, DEFAULT_CHECKPOINT_INTERVAL, LEDGER_FILE, LINKS_FILE, StatePaths,
};
pub use error::{InvalidShard, OrchestratorError};
pub use retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::browser::WAIT_POLL_INTERVAL;
use crate::catalog::{Catalog, LeafPath};
use crate::failure::FailureKind;
use crate::fetch::{DocumentFetcher, artifact_path};
use crate::ledger::{ProgressLedger, ResolvedLinkCatalog};
use crate::resolver::LeafResolver;

/// Default pause between leaves that touch the portal.
pub const DEFAULT_POLITENESS_DELAY: Duration = Duration::from_millis(1000);

/// One slice of a partitioned work list (`i/n`, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shard {
    index: usize,
    count: usize,
}

impl Shard {
    /// Creates shard `index` of `count`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidShard`] unless `1 <= index <= count`.
    pub fn new(index: usize, count: usize) -> Result<Self, InvalidShard> {
        if index == 0 || index > count {
            return Err(InvalidShard {
                input: format!("{index}/{count}"),
            });
        }
        Ok(Self { index, count })
    }

    /// Returns true if the leaf at catalog `position` belongs to this shard.
    #[must_use]
    pub fn owns(self, position: usize) -> bool {
        position % self.count == self.index - 1
    }
}

impl FromStr for Shard {
    type Err = InvalidShard;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidShard {
            input: s.to_string(),
        };
        let (index, count) = s.trim().split_once('/').ok_or_else(invalid)?;
        let index = index.trim().parse().map_err(|_| invalid())?;
        let count = count.trim().parse().map_err(|_| invalid())?;
        Self::new(index, count).map_err(|_| invalid())
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// Leaves still to process, in catalog order.
///
/// Settled keys (succeeded or failed) are skipped. With a shard, a leaf is
/// kept only if its position in the full catalog belongs to the shard, so
/// the partition does not shift as the ledger grows.
#[must_use]
pub fn build_work_list(
    catalog: &Catalog,
    ledger: &ProgressLedger,
    shard: Option<Shard>,
) -> Vec<LeafPath> {
    catalog
        .leaves()
        .into_iter()
        .enumerate()
        .filter(|(position, _)| shard.is_none_or(|shard| shard.owns(*position)))
        .map(|(_, path)| path)
        .filter(|path| !ledger.is_settled(&path.key()))
        .collect()
}

/// Run parameters.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Attempt budget for each stage of each leaf.
    pub retry: RetryPolicy,
    /// Processed leaves between checkpoint flushes.
    pub checkpoint_interval: usize,
    /// Pause between leaves that touch the portal.
    pub politeness_delay: Duration,
    /// Root of the artifact tree.
    pub output_root: PathBuf,
    /// Artifact extension, without the dot.
    pub artifact_extension: String,
    /// Optional slice of the work list.
    pub shard: Option<Shard>,
}

impl OrchestratorSettings {
    /// Default settings writing under `output_root`.
    #[must_use]
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            retry: RetryPolicy::default(),
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            politeness_delay: DEFAULT_POLITENESS_DELAY,
            output_root: output_root.into(),
            artifact_extension: "pdf".to_string(),
            shard: None,
        }
    }
}

/// Stage of a leaf's processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafStage {
    /// Turning the leaf path into a URL.
    Resolve,
    /// Downloading the URL.
    Fetch,
}

impl fmt::Display for LeafStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolve => "resolve",
            Self::Fetch => "fetch",
        })
    }
}

/// What happened to one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeafOutcome {
    /// The document was written.
    Downloaded {
        /// Bytes written.
        bytes: u64,
    },
    /// The artifact already existed; nothing was fetched.
    AlreadyPresent,
    /// The leaf was marked failed.
    Failed {
        /// Stage that gave up.
        stage: LeafStage,
        /// Classification of the last failure.
        kind: FailureKind,
        /// Detail of the last failure.
        reason: String,
    },
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Leaves in the work list.
    pub pending: usize,
    /// Leaves settled before the run started (within the shard).
    pub skipped: usize,
    /// Documents fetched.
    pub downloaded: usize,
    /// Leaves whose artifact already existed.
    pub already_present: usize,
    /// Leaves marked failed.
    pub failed: usize,
    /// Extra attempts made across both stages.
    pub retried: usize,
    /// URLs resolved and recorded.
    pub links_resolved: usize,
    /// Leaves fetched from a URL recorded by an earlier run.
    pub links_reused: usize,
}

impl RunStats {
    /// Leaves settled by this run.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.downloaded + self.already_present + self.failed
    }

    /// Leaves settled successfully by this run.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.downloaded + self.already_present
    }
}

/// Result of a completed or interrupted run.
#[derive(Debug)]
pub struct RunReport {
    /// Counters.
    pub stats: RunStats,
    /// True if the operator interrupted the run.
    pub interrupted: bool,
    /// Ledger as flushed at the end of the run.
    pub ledger: ProgressLedger,
    /// Link catalog as flushed at the end of the run.
    pub links: ResolvedLinkCatalog,
}

/// Receives run progress. All methods default to no-ops.
pub trait RunObserver: Send {
    /// The work list is built.
    fn run_started(&mut self, _stats: &RunStats) {}

    /// A leaf is about to be processed.
    fn leaf_started(&mut self, _path: &LeafPath) {}

    /// A stage failed and will be tried again.
    fn retrying(&mut self, _path: &LeafPath, _stage: LeafStage, _attempt: u32) {}

    /// A leaf was settled.
    fn leaf_finished(&mut self, _path: &LeafPath, _outcome: &LeafOutcome) {}

    /// The run ended.
    fn run_finished(&mut self, _stats: &RunStats, _interrupted: bool) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

enum Attempted<T> {
    Done(T),
    GaveUp { kind: FailureKind, reason: String },
    Interrupted,
}

enum LeafStep {
    Settled(LeafOutcome),
    Interrupted,
}

/// Sleeps for `delay`, waking early if `interrupt` is set. Returns false if
/// interrupted.
async fn pause(interrupt: &AtomicBool, delay: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Drives a resolver and a fetcher over a catalog.
pub struct Orchestrator<R, F> {
    resolver: R,
    fetcher: F,
    settings: OrchestratorSettings,
    interrupt: Arc<AtomicBool>,
    observer: Box<dyn RunObserver>,
}

impl<R: LeafResolver, F: DocumentFetcher> Orchestrator<R, F> {
    /// Creates an orchestrator with no interrupt source and no observer.
    pub fn new(resolver: R, fetcher: F, settings: OrchestratorSettings) -> Self {
        Self {
            resolver,
            fetcher,
            settings,
            interrupt: Arc::new(AtomicBool::new(false)),
            observer: Box::new(NoopObserver),
        }
    }

    /// Uses `interrupt` as the operator stop flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Reports progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Run settings.
    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Processes every unsettled leaf of `catalog`.
    ///
    /// The ledger and link catalog are flushed every checkpoint interval and
    /// always before this returns, including on interrupt and on a fatal
    /// failure. The resolver is released last.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Ledger`] if the run state cannot be
    /// loaded or flushed, and [`OrchestratorError::Fatal`] if a collaborator
    /// reports a failure no leaf can recover from.
    #[instrument(skip_all, fields(shard = ?self.settings.shard))]
    pub async fn run(
        &mut self,
        catalog: &Catalog,
        paths: StatePaths,
    ) -> Result<RunReport, OrchestratorError> {
        let mut checkpoint = Checkpoint::open(paths, self.settings.checkpoint_interval)
            .map_err(OrchestratorError::ledger)?;

        let work = build_work_list(catalog, checkpoint.ledger(), self.settings.shard);
        let in_shard = build_work_list(catalog, &ProgressLedger::default(), self.settings.shard);
        let mut stats = RunStats {
            pending: work.len(),
            skipped: in_shard.len() - work.len(),
            ..RunStats::default()
        };
        info!(
            pending = stats.pending,
            skipped = stats.skipped,
            "starting resolve/download run"
        );
        self.observer.run_started(&stats);

        let processed = self.process(&work, &mut checkpoint, &mut stats).await;
        let finished = checkpoint.finish();
        if let Err(error) = self.resolver.release().await {
            warn!(%error, "releasing the browser session failed");
        }
        let (ledger, links) = finished.map_err(OrchestratorError::ledger)?;
        let interrupted = processed?;

        info!(
            downloaded = stats.downloaded,
            already_present = stats.already_present,
            failed = stats.failed,
            retried = stats.retried,
            links_reused = stats.links_reused,
            interrupted,
            "run finished"
        );
        self.observer.run_finished(&stats, interrupted);
        Ok(RunReport {
            stats,
            interrupted,
            ledger,
            links,
        })
    }

    /// Returns true if the run was interrupted.
    async fn process(
        &mut self,
        work: &[LeafPath],
        checkpoint: &mut Checkpoint,
        stats: &mut RunStats,
    ) -> Result<bool, OrchestratorError> {
        let mut portal_touched = false;
        for path in work {
            if self.interrupted() {
                info!("interrupt received; stopping before next leaf");
                return Ok(true);
            }
            self.observer.leaf_started(path);
            let destination = artifact_path(
                &self.settings.output_root,
                path,
                &self.settings.artifact_extension,
            );

            let outcome = if artifact_exists(&destination).await {
                debug!(leaf = %path, "artifact already present");
                LeafOutcome::AlreadyPresent
            } else {
                if portal_touched
                    && !pause(&self.interrupt, self.settings.politeness_delay).await
                {
                    return Ok(true);
                }
                portal_touched = true;
                match self.process_leaf(path, &destination, checkpoint, stats).await? {
                    LeafStep::Settled(outcome) => outcome,
                    LeafStep::Interrupted => {
                        info!(leaf = %path, "interrupted; leaf left unsettled");
                        return Ok(true);
                    }
                }
            };

            match &outcome {
                LeafOutcome::Downloaded { bytes } => {
                    stats.downloaded += 1;
                    info!(leaf = %path, bytes, "leaf downloaded");
                    checkpoint.mark_succeeded(path.key());
                }
                LeafOutcome::AlreadyPresent => {
                    stats.already_present += 1;
                    checkpoint.mark_succeeded(path.key());
                }
                LeafOutcome::Failed {
                    stage,
                    kind,
                    reason,
                } => {
                    stats.failed += 1;
                    warn!(leaf = %path, %stage, %kind, reason, "leaf failed");
                    checkpoint.mark_failed(path.key());
                }
            }
            self.observer.leaf_finished(path, &outcome);
            checkpoint
                .leaf_processed()
                .map_err(OrchestratorError::ledger)?;
        }
        Ok(false)
    }

    async fn process_leaf(
        &mut self,
        path: &LeafPath,
        destination: &Path,
        checkpoint: &mut Checkpoint,
        stats: &mut RunStats,
    ) -> Result<LeafStep, OrchestratorError> {
        if let Some(recorded) = checkpoint.links().get(path).map(|link| link.url.clone()) {
            debug!(leaf = %path, url = %recorded, "reusing recorded link");
            stats.links_reused += 1;
            match self.fetch_with_retry(path, &recorded, destination, stats).await? {
                Attempted::Done(bytes) => {
                    return Ok(LeafStep::Settled(LeafOutcome::Downloaded { bytes }));
                }
                Attempted::GaveUp { kind, reason } => {
                    info!(leaf = %path, %kind, reason, "recorded link failed; resolving again");
                }
                Attempted::Interrupted => return Ok(LeafStep::Interrupted),
            }
        }

        let url = match self.resolve_with_retry(path, stats).await? {
            Attempted::Done(url) => url,
            Attempted::GaveUp { kind, reason } => {
                return Ok(LeafStep::Settled(LeafOutcome::Failed {
                    stage: LeafStage::Resolve,
                    kind,
                    reason,
                }));
            }
            Attempted::Interrupted => return Ok(LeafStep::Interrupted),
        };
        checkpoint.record_link(path, &url);
        stats.links_resolved += 1;

        Ok(match self.fetch_with_retry(path, &url, destination, stats).await? {
            Attempted::Done(bytes) => LeafStep::Settled(LeafOutcome::Downloaded { bytes }),
            Attempted::GaveUp { kind, reason } => LeafStep::Settled(LeafOutcome::Failed {
                stage: LeafStage::Fetch,
                kind,
                reason,
            }),
            Attempted::Interrupted => LeafStep::Interrupted,
        })
    }

    async fn resolve_with_retry(
        &mut self,
        path: &LeafPath,
        stats: &mut RunStats,
    ) -> Result<Attempted<String>, OrchestratorError> {
        let mut attempt = 1;
        loop {
            let failure = match self.resolver.try_resolve(path).await {
                Ok(url) => return Ok(Attempted::Done(url)),
                Err(failure) => failure,
            };
            if failure.kind.is_fatal() {
                return Err(OrchestratorError::fatal(path.to_string(), failure.to_string()));
            }
            debug!(leaf = %path, attempt, %failure, "resolution attempt failed");
            match self.settings.retry.should_retry(failure.kind, attempt) {
                RetryDecision::Retry { delay, attempt: next } => {
                    stats.retried += 1;
                    self.observer.retrying(path, LeafStage::Resolve, next);
                    if !pause(&self.interrupt, delay).await {
                        return Ok(Attempted::Interrupted);
                    }
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(leaf = %path, reason, "giving up on resolution");
                    return Ok(Attempted::GaveUp {
                        kind: failure.kind,
                        reason: failure.to_string(),
                    });
                }
            }
        }
    }

    async fn fetch_with_retry(
        &mut self,
        path: &LeafPath,
        url: &str,
        destination: &Path,
        stats: &mut RunStats,
    ) -> Result<Attempted<u64>, OrchestratorError> {
        let mut attempt = 1;
        loop {
            let error = match self.fetcher.try_fetch(url, destination).await {
                Ok(bytes) => return Ok(Attempted::Done(bytes)),
                Err(error) => error,
            };
            let kind = error.failure_kind();
            if kind.is_fatal() {
                return Err(OrchestratorError::fatal(path.to_string(), error.to_string()));
            }
            debug!(leaf = %path, attempt, %error, "fetch attempt failed");
            match self.settings.retry.should_retry(kind, attempt) {
                RetryDecision::Retry { delay, attempt: next } => {
                    stats.retried += 1;
                    self.observer.retrying(path, LeafStage::Fetch, next);
                    if !pause(&self.interrupt, delay).await {
                        return Ok(Attempted::Interrupted);
                    }
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(leaf = %path, reason, "giving up on fetch");
                    return Ok(Attempted::GaveUp {
                        kind,
                        reason: error.to_string(),
                    });
                }
            }
        }
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::LeafKey;

    const CATALOG: &str = r#"[
        {"value": "1", "label": "R1", "children": [
            {"value": "1", "label": "T1", "children": [
                {"value": "1", "label": "H1", "children": [
                    {"value": "1", "label": "V1"},
                    {"value": "2", "label": "V2"},
                    {"value": "3", "label": "V3"},
                    {"value": "4", "label": "V4"}
                ]}
            ]}
        ]}
    ]"#;

    fn catalog() -> Catalog {
        Catalog::from_json(CATALOG, Path::new("catalog.json")).unwrap()
    }

    fn keys(work: &[LeafPath]) -> Vec<String> {
        work.iter().map(|p| p.key().as_str().to_string()).collect()
    }

    #[test]
    fn test_shard_parsing() {
        assert_eq!("2/3".parse::<Shard>().unwrap(), Shard::new(2, 3).unwrap());
        assert_eq!(Shard::new(1, 4).unwrap().to_string(), "1/4");
        assert!("0/3".parse::<Shard>().is_err());
        assert!("4/3".parse::<Shard>().is_err());
        assert!("2".parse::<Shard>().is_err());
        assert!("a/b".parse::<Shard>().is_err());
    }

    #[test]
    fn test_work_list_skips_settled_keys() {
        let mut ledger = ProgressLedger::default();
        ledger.mark_succeeded(LeafKey::from_raw("1_1_1_1"));
        ledger.mark_failed(LeafKey::from_raw("1_1_1_3"));
        let work = build_work_list(&catalog(), &ledger, None);
        assert_eq!(keys(&work), ["1_1_1_2", "1_1_1_4"]);
    }

    #[test]
    fn test_shards_partition_by_catalog_position() {
        let mut ledger = ProgressLedger::default();
        let first = build_work_list(&catalog(), &ledger, Some(Shard::new(1, 2).unwrap()));
        let second = build_work_list(&catalog(), &ledger, Some(Shard::new(2, 2).unwrap()));
        assert_eq!(keys(&first), ["1_1_1_1", "1_1_1_3"]);
        assert_eq!(keys(&second), ["1_1_1_2", "1_1_1_4"]);

        ledger.mark_succeeded(LeafKey::from_raw("1_1_1_1"));
        let second = build_work_list(&catalog(), &ledger, Some(Shard::new(2, 2).unwrap()));
        assert_eq!(keys(&second), ["1_1_1_2", "1_1_1_4"]);
    }

    #[tokio::test]
    async fn test_pause_stops_early_when_interrupted() {
        let interrupt = AtomicBool::new(true);
        assert!(!pause(&interrupt, Duration::from_secs(60)).await);
        let interrupt = AtomicBool::new(false);
        assert!(pause(&interrupt, Duration::from_millis(5)).await);
    }
}
