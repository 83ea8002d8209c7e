//! Progress bar for resolve/download runs.

use std::time::Duration;

use harvest_core::catalog::LeafPath;
use harvest_core::orchestrator::{LeafOutcome, LeafStage, RunObserver, RunStats};
use indicatif::{ProgressBar, ProgressStyle};

/// Drives an `indicatif` bar from orchestrator events.
pub(crate) struct ProgressObserver {
    bar: ProgressBar,
    downloaded: usize,
    failed: usize,
}

impl ProgressObserver {
    pub(crate) fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self {
            bar,
            downloaded: 0,
            failed: 0,
        }
    }

    fn summary(&self) -> String {
        format!("{} downloaded, {} failed", self.downloaded, self.failed)
    }
}

impl RunObserver for ProgressObserver {
    fn run_started(&mut self, stats: &RunStats) {
        self.bar.set_length(stats.pending as u64);
        self.bar.set_message(self.summary());
    }

    fn leaf_started(&mut self, path: &LeafPath) {
        self.bar.set_message(format!("{} | {path}", self.summary()));
    }

    fn retrying(&mut self, path: &LeafPath, stage: LeafStage, attempt: u32) {
        self.bar
            .set_message(format!("{} | {path} ({stage} attempt {attempt})", self.summary()));
    }

    fn leaf_finished(&mut self, _path: &LeafPath, outcome: &LeafOutcome) {
        match outcome {
            LeafOutcome::Downloaded { .. } | LeafOutcome::AlreadyPresent => self.downloaded += 1,
            LeafOutcome::Failed { .. } => self.failed += 1,
        }
        self.bar.inc(1);
        self.bar.set_message(self.summary());
    }

    fn run_finished(&mut self, _stats: &RunStats, _interrupted: bool) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::failure::FailureKind;

    #[test]
    fn test_observer_counts_outcomes() {
        let mut observer = ProgressObserver::new();
        observer.bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        let path = LeafPath {
            region: harvest_core::catalog::PathSegment::new("1", "R1"),
            sub_region: harvest_core::catalog::PathSegment::new("1", "T1"),
            sub_sub_region: harvest_core::catalog::PathSegment::new("1", "H1"),
            leaf: harvest_core::catalog::PathSegment::new("1", "V1"),
        };
        observer.run_started(&RunStats {
            pending: 2,
            ..RunStats::default()
        });
        observer.leaf_finished(&path, &LeafOutcome::Downloaded { bytes: 10 });
        observer.leaf_finished(
            &path,
            &LeafOutcome::Failed {
                stage: LeafStage::Resolve,
                kind: FailureKind::TransientUi,
                reason: "timeout".to_string(),
            },
        );
        assert_eq!(observer.bar.position(), 2);
        assert_eq!(observer.summary(), "1 downloaded, 1 failed");
        observer.run_finished(&RunStats::default(), false);
    }
}
