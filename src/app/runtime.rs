use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use crate::app::context::RunContext;
use crate::app::terminal;
use crate::cli::{Cli, Command};
use crate::{ProcessExit, commands};

pub(crate) async fn run_harvest() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let no_color = terminal::is_no_color_requested(&cli.global);
    terminal::init_tracing(terminal::default_log_level(&cli.global), no_color);
    debug!(?cli, "CLI arguments parsed");

    let ctx = RunContext::resolve(&cli.global)?;
    if let Some(path) = &ctx.config_path {
        debug!(path = %path.display(), loaded = ctx.config_loaded, "configuration resolved");
    }

    match &cli.command {
        Command::Discover(args) => commands::run_discover_command(&ctx, args).await,
        Command::Download(args) => {
            let interrupted = spawn_interrupt_listener();
            let use_progress = terminal::should_use_progress_bar(
                io::stderr().is_terminal(),
                cli.global.quiet,
                terminal::is_dumb_terminal(),
            );
            commands::run_download_command(&ctx, args, interrupted, use_progress).await
        }
        Command::Status => commands::run_status_command(&ctx),
        Command::ResetFailed => commands::run_reset_failed_command(&ctx),
        Command::MergeLedgers(args) => commands::run_merge_ledgers_command(&ctx, args),
        Command::Config => commands::run_config_show_command(&ctx),
    }
}

/// Sets the returned flag on the first Ctrl-C.
fn spawn_interrupt_listener() -> Arc<AtomicBool> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received; finishing the current leaf and saving progress");
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });
    interrupted
}
