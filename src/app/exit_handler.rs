//! Exit code logic for the harvest process.
//!
//! Single responsibility: map run counts to the process exit outcome.

use harvest_core::RunReport;

use crate::ProcessExit;

/// Determines the process exit outcome from succeeded and failed leaf counts.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Exit outcome for a finished resolve/download run.
pub(crate) fn run_exit_outcome(report: &RunReport) -> ProcessExit {
    if report.interrupted {
        return ProcessExit::Failure;
    }
    determine_exit_outcome(report.stats.succeeded(), report.stats.failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::{ProgressLedger, ResolvedLinkCatalog, RunStats};

    fn report(downloaded: usize, failed: usize, interrupted: bool) -> RunReport {
        RunReport {
            stats: RunStats {
                downloaded,
                failed,
                ..RunStats::default()
            },
            interrupted,
            ledger: ProgressLedger::default(),
            links: ResolvedLinkCatalog::default(),
        }
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_when_nothing_to_do() {
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
        assert_eq!(ProcessExit::Partial.code(), 2);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }

    #[test]
    fn test_interrupted_run_is_failure() {
        assert_eq!(run_exit_outcome(&report(5, 0, true)), ProcessExit::Failure);
        assert_eq!(run_exit_outcome(&report(5, 1, false)), ProcessExit::Partial);
    }
}
