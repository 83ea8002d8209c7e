//! Discover command: build the location catalog from the live portal.

use anyhow::{Context, Result};
use harvest_core::browser::BrowserSession;
use harvest_core::{ChromiumSession, CascadeNavigator, discover};
use tracing::{info, warn};

use crate::ProcessExit;
use crate::app::context::RunContext;
use crate::cli::DiscoverArgs;

pub async fn run_discover_command(ctx: &RunContext, args: &DiscoverArgs) -> Result<ProcessExit> {
    let navigator = CascadeNavigator::new(ctx.config.portal.clone(), ctx.config.cascade_timing());
    let mut session = ChromiumSession::start(&ctx.config.chromium_options())
        .await
        .context("could not establish a browser session")?;

    let discovered = discover(&navigator, &mut session).await;
    if let Err(error) = session.quit().await {
        warn!(%error, "closing the browser failed");
    }
    let mut catalog = discovered.context("discovery failed")?;

    if args.prune {
        let removed = catalog.prune_empty();
        info!(
            regions = removed.regions,
            sub_regions = removed.sub_regions,
            sub_sub_regions = removed.sub_sub_regions,
            "pruned empty branches"
        );
    }

    std::fs::create_dir_all(&ctx.state_dir).with_context(|| {
        format!("failed to create state directory '{}'", ctx.state_dir.display())
    })?;
    let path = ctx.catalog_path();
    catalog
        .save(&path)
        .with_context(|| format!("failed to write catalog '{}'", path.display()))?;

    let stats = catalog.stats();
    println!("Catalog written to {}", path.display());
    println!(
        "  {} regions, {} sub-regions, {} sub-sub-regions, {} leaves",
        stats.regions, stats.sub_regions, stats.sub_sub_regions, stats.leaves
    );
    Ok(ProcessExit::Success)
}
