//! Config command handler: show effective configuration.

use anyhow::{Context, Result};

use crate::ProcessExit;
use crate::app::context::RunContext;

pub fn run_config_show_command(ctx: &RunContext) -> Result<ProcessExit> {
    let resolved_path = ctx.config_path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("# config_path = {resolved_path}");
    println!(
        "# config_file = {}",
        if ctx.config_loaded {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    let rendered =
        toml::to_string_pretty(&ctx.config).context("failed to render effective configuration")?;
    println!("{rendered}");
    Ok(ProcessExit::Success)
}
