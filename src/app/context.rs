//! Shared runtime context built after CLI and config handling.

use std::path::PathBuf;

use anyhow::{Context, Result};
use harvest_core::config::{HarvestConfig, LoadedConfig};
use harvest_core::orchestrator::{CATALOG_FILE, StatePaths};

use crate::cli::GlobalArgs;

/// Effective configuration with CLI overrides applied.
pub(crate) struct RunContext {
    pub(crate) config: HarvestConfig,
    pub(crate) config_path: Option<PathBuf>,
    pub(crate) config_loaded: bool,
    pub(crate) state_dir: PathBuf,
    pub(crate) output_dir: PathBuf,
}

impl RunContext {
    /// Loads the config file and applies global CLI overrides.
    pub(crate) fn resolve(args: &GlobalArgs) -> Result<Self> {
        let LoadedConfig {
            path,
            mut config,
            loaded_from_file,
        } = HarvestConfig::load_or_default(args.config.as_deref())
            .context("configuration is unusable")?;

        if args.headed {
            config.browser.headless = false;
        }
        if let Some(state_dir) = &args.state_dir {
            config.paths.state_dir.clone_from(state_dir);
        }
        if let Some(output_dir) = &args.output_dir {
            config.paths.output_dir.clone_from(output_dir);
        }

        Ok(Self {
            state_dir: config.paths.state_dir.clone(),
            output_dir: config.paths.output_dir.clone(),
            config,
            config_path: path,
            config_loaded: loaded_from_file,
        })
    }

    pub(crate) fn catalog_path(&self) -> PathBuf {
        self.state_dir.join(CATALOG_FILE)
    }

    pub(crate) fn state_paths(&self) -> StatePaths {
        StatePaths::in_dir(&self.state_dir)
    }
}
