//! Status command: catalog, ledger, and link counts.

use anyhow::{Context, Result};
use harvest_core::{Catalog, ProgressLedger, ResolvedLinkCatalog};

use crate::ProcessExit;
use crate::app::context::RunContext;

/// Counts shown by `harvest status`.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct StatusSummary {
    pub(crate) catalog_found: bool,
    pub(crate) regions: usize,
    pub(crate) sub_regions: usize,
    pub(crate) sub_sub_regions: usize,
    pub(crate) leaves: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
    pub(crate) remaining: usize,
    pub(crate) links: usize,
}

pub(crate) fn summarize(ctx: &RunContext) -> Result<StatusSummary> {
    let paths = ctx.state_paths();
    let ledger = ProgressLedger::load(&paths.ledger)
        .with_context(|| format!("failed to read ledger '{}'", paths.ledger.display()))?;
    let links = ResolvedLinkCatalog::load(&paths.links)
        .with_context(|| format!("failed to read links '{}'", paths.links.display()))?;

    let mut summary = StatusSummary {
        succeeded: ledger.succeeded_count(),
        failed: ledger.failed_count(),
        links: links.len(),
        ..StatusSummary::default()
    };

    let catalog_path = ctx.catalog_path();
    if catalog_path.exists() {
        let catalog = Catalog::load(&catalog_path)
            .with_context(|| format!("failed to read catalog '{}'", catalog_path.display()))?;
        let stats = catalog.stats();
        summary.catalog_found = true;
        summary.regions = stats.regions;
        summary.sub_regions = stats.sub_regions;
        summary.sub_sub_regions = stats.sub_sub_regions;
        summary.leaves = stats.leaves;
        summary.remaining = catalog
            .leaves()
            .iter()
            .filter(|path| !ledger.is_settled(&path.key()))
            .count();
    }
    Ok(summary)
}

pub fn run_status_command(ctx: &RunContext) -> Result<ProcessExit> {
    let summary = summarize(ctx)?;
    println!("state_dir = {}", ctx.state_dir.display());
    println!("output_dir = {}", ctx.output_dir.display());
    if summary.catalog_found {
        println!(
            "catalog: {} regions, {} sub-regions, {} sub-sub-regions, {} leaves",
            summary.regions, summary.sub_regions, summary.sub_sub_regions, summary.leaves
        );
    } else {
        println!("catalog: not found (run `harvest discover`)");
    }
    println!(
        "ledger: {} succeeded, {} failed, {} remaining",
        summary.succeeded, summary.failed, summary.remaining
    );
    println!("resolved links: {}", summary.links);
    Ok(ProcessExit::Success)
}
