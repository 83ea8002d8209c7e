//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use harvest_core::Shard;

/// Crawl a cascading-dropdown records portal and download its documents.
///
/// Run `discover` once to build the location catalog, then `download` as
/// many times as needed; every run resumes where the last one stopped.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (default: $XDG_CONFIG_HOME/cascade-harvest/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the catalog, ledger, and resolved links
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Root directory for downloaded documents
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    pub headed: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Walk the portal once and write the location catalog
    Discover(DiscoverArgs),

    /// Resolve and download every leaf not yet settled
    Download(DownloadArgs),

    /// Show catalog, ledger, and link counts
    Status,

    /// Clear the failed set so those leaves are tried again
    ResetFailed,

    /// Merge ledgers and links from other state directories into this one
    MergeLedgers(MergeArgs),

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DiscoverArgs {
    /// Drop sub-sub-regions without leaves (and regions left empty)
    #[arg(long)]
    pub prune: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DownloadArgs {
    /// Process only slice i of n of the catalog (e.g. 2/4)
    #[arg(long, value_name = "I/N")]
    pub shard: Option<Shard>,

    /// Attempts per stage for each leaf (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_attempts: Option<u32>,

    /// Pause between leaves in milliseconds (max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub politeness_ms: Option<u64>,

    /// Leaves processed between checkpoint flushes (1-10000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=10000))]
    pub checkpoint_interval: Option<u64>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MergeArgs {
    /// State directories (or ledger files) produced by sharded runs
    #[arg(required = true, value_name = "PATH")]
    pub sources: Vec<PathBuf>,
}
