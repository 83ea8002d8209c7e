//! CLI command handlers.

mod config;
mod discover;
mod download;
mod ledger;
mod status;

pub use config::run_config_show_command;
pub use discover::run_discover_command;
pub use download::run_download_command;
pub use ledger::{run_merge_ledgers_command, run_reset_failed_command};
pub use status::run_status_command;
