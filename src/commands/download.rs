//! Download command: resolve and fetch every unsettled leaf.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use anyhow::{Context, Result};
use harvest_core::{
    Catalog, CascadeNavigator, ChromiumSession, DocumentClient, DocumentResolver, Orchestrator,
    OrchestratorSettings, RetryPolicy, SessionResolver,
};
use tracing::{info, warn};

use crate::ProcessExit;
use crate::app::context::RunContext;
use crate::app::exit_handler;
use crate::app::progress_manager::ProgressObserver;
use crate::cli::DownloadArgs;

fn settings(ctx: &RunContext, args: &DownloadArgs) -> OrchestratorSettings {
    let config = &ctx.config;
    let retry = match args.max_attempts {
        Some(attempts) => RetryPolicy::new(attempts, Duration::from_secs(config.retry.backoff_secs)),
        None => config.retry_policy(),
    };
    OrchestratorSettings {
        retry,
        checkpoint_interval: args
            .checkpoint_interval
            .and_then(|interval| usize::try_from(interval).ok())
            .unwrap_or(config.checkpoint.interval),
        politeness_delay: args
            .politeness_ms
            .map_or_else(|| config.politeness_delay(), Duration::from_millis),
        output_root: ctx.output_dir.clone(),
        artifact_extension: config.portal.artifact_extension.clone(),
        shard: args.shard,
    }
}

pub async fn run_download_command(
    ctx: &RunContext,
    args: &DownloadArgs,
    interrupted: Arc<AtomicBool>,
    use_progress: bool,
) -> Result<ProcessExit> {
    let catalog_path = ctx.catalog_path();
    let catalog = Catalog::load(&catalog_path).with_context(|| {
        format!(
            "no usable catalog at '{}' (run `harvest discover` first)",
            catalog_path.display()
        )
    })?;
    std::fs::create_dir_all(&ctx.state_dir).with_context(|| {
        format!("failed to create state directory '{}'", ctx.state_dir.display())
    })?;

    let portal = ctx.config.portal.clone();
    let client = DocumentClient::new(&portal, ctx.config.fetch_timeout())
        .context("failed to build the HTTP client")?;
    let navigator = CascadeNavigator::new(portal, ctx.config.cascade_timing());
    let resolver =
        DocumentResolver::new(navigator).context("invalid download endpoint configuration")?;
    let session = ChromiumSession::start(&ctx.config.chromium_options())
        .await
        .context("could not establish a browser session")?;

    let mut orchestrator = Orchestrator::new(
        SessionResolver::new(resolver, session),
        client,
        settings(ctx, args),
    )
    .with_interrupt(interrupted);
    if use_progress {
        orchestrator = orchestrator.with_observer(ProgressObserver::new());
    }

    let report = orchestrator
        .run(&catalog, ctx.state_paths())
        .await
        .context("download run aborted")?;

    let stats = &report.stats;
    println!(
        "Downloaded {} ({} already present), failed {}, retried {}, {} pending at start, {} skipped",
        stats.downloaded, stats.already_present, stats.failed, stats.retried, stats.pending, stats.skipped
    );
    println!(
        "Ledger: {} succeeded, {} failed; {} resolved links",
        report.ledger.succeeded_count(),
        report.ledger.failed_count(),
        report.links.len()
    );
    if report.interrupted {
        warn!(
            processed = stats.processed(),
            pending = stats.pending,
            "Interrupted. Run again to resume."
        );
    } else if stats.failed > 0 {
        info!("Failed leaves are skipped on later runs; use `harvest reset-failed` to retry them");
    }
    Ok(exit_handler::run_exit_outcome(&report))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cli::GlobalArgs;
    use harvest_core::Shard;
    use std::path::PathBuf;

    fn ctx() -> RunContext {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        std::fs::write(&config_path, "[retry]\nbackoff_secs = 5\n").unwrap();
        RunContext::resolve(&GlobalArgs {
            config: Some(config_path),
            output_dir: Some(PathBuf::from("/records")),
            ..GlobalArgs::default()
        })
        .unwrap()
    }

    #[test]
    fn test_settings_use_config_when_flags_absent() {
        let settings = settings(&ctx(), &DownloadArgs::default());
        assert_eq!(settings.retry, RetryPolicy::new(3, Duration::from_secs(5)));
        assert_eq!(settings.checkpoint_interval, 10);
        assert_eq!(settings.politeness_delay, Duration::from_secs(1));
        assert_eq!(settings.output_root, PathBuf::from("/records"));
        assert_eq!(settings.artifact_extension, "pdf");
    }

    #[test]
    fn test_flags_override_config() {
        let args = DownloadArgs {
            shard: Some(Shard::new(1, 2).unwrap()),
            max_attempts: Some(5),
            politeness_ms: Some(0),
            checkpoint_interval: Some(50),
        };
        let settings = settings(&ctx(), &args);
        assert_eq!(settings.retry.max_attempts(), 5);
        assert_eq!(settings.retry.backoff(), Duration::from_secs(5));
        assert_eq!(settings.checkpoint_interval, 50);
        assert_eq!(settings.politeness_delay, Duration::ZERO);
        assert_eq!(settings.shard, Some(Shard::new(1, 2).unwrap()));
    }
}
