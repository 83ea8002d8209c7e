//! Ledger maintenance: clearing failures and merging sharded runs.

use std::path::Path;

use anyhow::{Context, Result};
use harvest_core::ledger::MergeSummary;
use harvest_core::orchestrator::{LEDGER_FILE, StatePaths};
use harvest_core::{ProgressLedger, ResolvedLinkCatalog};
use tracing::info;

use crate::ProcessExit;
use crate::app::context::RunContext;
use crate::cli::MergeArgs;

pub fn run_reset_failed_command(ctx: &RunContext) -> Result<ProcessExit> {
    let path = ctx.state_paths().ledger;
    let mut ledger = ProgressLedger::load(&path)
        .with_context(|| format!("failed to read ledger '{}'", path.display()))?;
    let cleared = ledger.clear_failed();
    if cleared > 0 {
        ledger
            .save(&path)
            .with_context(|| format!("failed to write ledger '{}'", path.display()))?;
    }
    info!(cleared, "failed set cleared");
    println!("Cleared {cleared} failed leaves; they will be retried on the next download run");
    Ok(ProcessExit::Success)
}

/// Ledger and optional links file for one merge source.
fn source_paths(source: &Path) -> (std::path::PathBuf, Option<std::path::PathBuf>) {
    if source.is_dir() {
        let paths = StatePaths::in_dir(source);
        (paths.ledger, Some(paths.links))
    } else if source.file_name().is_some_and(|name| name == LEDGER_FILE) {
        let links = source
            .parent()
            .map(|dir| StatePaths::in_dir(dir).links)
            .filter(|links| links.exists());
        (source.to_path_buf(), links)
    } else {
        (source.to_path_buf(), None)
    }
}

pub(crate) fn merge_into(target: &StatePaths, sources: &[impl AsRef<Path>]) -> Result<MergeSummary> {
    let mut ledger = ProgressLedger::load(&target.ledger)
        .with_context(|| format!("failed to read ledger '{}'", target.ledger.display()))?;
    let mut links = ResolvedLinkCatalog::load(&target.links)
        .with_context(|| format!("failed to read links '{}'", target.links.display()))?;
    let mut total = MergeSummary::default();

    for source in sources {
        let (ledger_path, links_path) = source_paths(source.as_ref());
        let other = ProgressLedger::load(&ledger_path)
            .with_context(|| format!("failed to read ledger '{}'", ledger_path.display()))?;
        let summary = ledger.merge(&other);
        total.succeeded_added += summary.succeeded_added;
        total.failed_added += summary.failed_added;
        total.promoted += summary.promoted;
        if let Some(links_path) = links_path {
            let other_links = ResolvedLinkCatalog::load(&links_path)
                .with_context(|| format!("failed to read links '{}'", links_path.display()))?;
            links.merge(&other_links);
        }
        info!(source = %ledger_path.display(), ?summary, "ledger merged");
    }

    if let Some(parent) = target.ledger.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    ledger
        .save(&target.ledger)
        .with_context(|| format!("failed to write ledger '{}'", target.ledger.display()))?;
    links
        .save(&target.links)
        .with_context(|| format!("failed to write links '{}'", target.links.display()))?;
    Ok(total)
}

pub fn run_merge_ledgers_command(ctx: &RunContext, args: &MergeArgs) -> Result<ProcessExit> {
    let summary = merge_into(&ctx.state_paths(), &args.sources)?;
    println!(
        "Merged {} sources: {} succeeded added, {} failed added, {} promoted from failed",
        args.sources.len(),
        summary.succeeded_added,
        summary.failed_added,
        summary.promoted
    );
    Ok(ProcessExit::Success)
}
