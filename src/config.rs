//! File configuration for portal identifiers, timing, retry, and paths.
//!
//! Loaded from `$XDG_CONFIG_HOME/cascade-harvest/config.toml` (falling back
//! to `$HOME/.config/cascade-harvest/config.toml`) or an explicit path. Every
//! key is optional; a missing file means built-in defaults.
//!
//! ```toml
//! [timing]
//! results_wait_secs = 20
//! politeness_delay_ms = 1500
//!
//! [retry]
//! max_attempts = 5
//!
//! [paths]
//! output_dir = "/srv/records"
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::navigator::CascadeTiming;
use crate::orchestrator::{DEFAULT_CHECKPOINT_INTERVAL, RetryPolicy};
use crate::portal::PortalProfile;

/// Directory name under the config home.
pub const CONFIG_DIR_NAME: &str = "cascade-harvest";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const ATTEMPTS_RANGE: std::ops::RangeInclusive<u32> = 1..=10;
const TIMEOUT_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;
const MILLIS_RANGE: std::ops::RangeInclusive<u64> = 0..=3_600_000;
const CHECKPOINT_RANGE: std::ops::RangeInclusive<usize> = 1..=10_000;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        /// Config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    OutOfRange {
        /// Dotted key, e.g. `retry.max_attempts`.
        field: &'static str,
        /// Rejected value.
        value: String,
        /// Accepted range.
        expected: String,
    },

    /// A required string is empty.
    #[error("invalid config value for `{field}`: must not be empty")]
    Empty {
        /// Dotted key.
        field: &'static str,
    },
}

impl ConfigError {
    fn out_of_range<T: std::fmt::Debug + std::fmt::Display>(
        field: &'static str,
        value: T,
        range: &std::ops::RangeInclusive<T>,
    ) -> Self {
        Self::OutOfRange {
            field,
            value: value.to_string(),
            expected: format!("{}..={}", range.start(), range.end()),
        }
    }
}

/// `[timing]`: bounded waits and pauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Wait for a cascade control to exist.
    pub control_wait_secs: u64,
    /// Wait for the results table after a search.
    pub results_wait_secs: u64,
    /// Wait for a popup window after clicking the action control.
    pub popup_wait_ms: u64,
    /// Pause after each selection.
    pub settle_delay_ms: u64,
    /// Pause between leaves.
    pub politeness_delay_ms: u64,
    /// Total timeout for one document fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            control_wait_secs: 10,
            results_wait_secs: 15,
            popup_wait_ms: 1000,
            settle_delay_ms: 500,
            politeness_delay_ms: 1000,
            fetch_timeout_secs: 30,
        }
    }
}

/// `[retry]`: per-stage attempt budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Attempts per stage, including the first.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 2,
        }
    }
}

/// `[checkpoint]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckpointConfig {
    /// Processed leaves between flushes.
    pub interval: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }
}

/// `[paths]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Holds the catalog, ledger, and link catalog.
    pub state_dir: PathBuf,
    /// Root of the artifact tree.
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("harvest-state"),
            output_dir: PathBuf::from("downloads"),
        }
    }
}

/// `[browser]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserConfig {
    /// Run without a visible window.
    pub headless: bool,
    /// Explicit Chrome/Chromium executable.
    pub executable: Option<PathBuf>,
    /// DevTools URL of an already-running browser.
    pub remote_url: Option<String>,
    /// Extra command-line switches.
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            remote_url: None,
            extra_args: Vec::new(),
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Portal identifiers.
    pub portal: PortalProfile,
    /// Waits and pauses.
    pub timing: TimingConfig,
    /// Attempt budget.
    pub retry: RetryConfig,
    /// Flush interval.
    pub checkpoint: CheckpointConfig,
    /// State and output locations.
    pub paths: PathsConfig,
    /// Browser launch options.
    pub browser: BrowserConfig,
}

/// A configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path, if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed configuration (defaults if no file).
    pub config: HarvestConfig,
    /// True if a file was read.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/cascade-harvest/config.toml`
/// 2. `$HOME/.config/cascade-harvest/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

impl HarvestConfig {
    /// Parses and validates TOML text. `origin` is used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or a validation error.
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw, path)
    }

    /// Loads `explicit` if given, otherwise the default path if it exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file that should be used is unusable.
    /// An explicit path that does not exist is an error; a missing default
    /// file is not.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        if let Some(path) = explicit {
            return Ok(LoadedConfig {
                path: Some(path.to_path_buf()),
                config: Self::load(path)?,
                loaded_from_file: true,
            });
        }

        let path = resolve_default_config_path();
        match path.as_deref() {
            Some(default_path) if default_path.exists() => {
                debug!(path = %default_path.display(), "loading config file");
                let config = Self::load(default_path)?;
                Ok(LoadedConfig {
                    path,
                    config,
                    loaded_from_file: true,
                })
            }
            _ => Ok(LoadedConfig {
                path,
                config: Self::default(),
                loaded_from_file: false,
            }),
        }
    }

    /// Checks every value against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::OutOfRange`] or [`ConfigError::Empty`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !ATTEMPTS_RANGE.contains(&self.retry.max_attempts) {
            return Err(ConfigError::out_of_range(
                "retry.max_attempts",
                self.retry.max_attempts,
                &ATTEMPTS_RANGE,
            ));
        }
        validate_secs("retry.backoff_secs", self.retry.backoff_secs, true)?;
        validate_secs("timing.control_wait_secs", self.timing.control_wait_secs, false)?;
        validate_secs("timing.results_wait_secs", self.timing.results_wait_secs, false)?;
        validate_secs("timing.fetch_timeout_secs", self.timing.fetch_timeout_secs, false)?;
        validate_millis("timing.popup_wait_ms", self.timing.popup_wait_ms)?;
        validate_millis("timing.settle_delay_ms", self.timing.settle_delay_ms)?;
        validate_millis("timing.politeness_delay_ms", self.timing.politeness_delay_ms)?;
        if !CHECKPOINT_RANGE.contains(&self.checkpoint.interval) {
            return Err(ConfigError::out_of_range(
                "checkpoint.interval",
                self.checkpoint.interval,
                &CHECKPOINT_RANGE,
            ));
        }

        let required = [
            ("portal.base_url", &self.portal.base_url),
            ("portal.region_control", &self.portal.region_control),
            ("portal.sub_region_control", &self.portal.sub_region_control),
            ("portal.sub_sub_region_control", &self.portal.sub_sub_region_control),
            ("portal.download_endpoint", &self.portal.download_endpoint),
            ("portal.download_param", &self.portal.download_param),
            ("portal.artifact_extension", &self.portal.artifact_extension),
        ];
        if let Some(&(field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Empty { field });
        }
        if self.portal.accepted_content_types.is_empty() {
            return Err(ConfigError::Empty {
                field: "portal.accepted_content_types",
            });
        }
        Ok(())
    }

    /// Cascade waits.
    #[must_use]
    pub fn cascade_timing(&self) -> CascadeTiming {
        CascadeTiming {
            control_wait: Duration::from_secs(self.timing.control_wait_secs),
            results_wait: Duration::from_secs(self.timing.results_wait_secs),
            popup_wait: Duration::from_millis(self.timing.popup_wait_ms),
            settle_delay: Duration::from_millis(self.timing.settle_delay_ms),
        }
    }

    /// Retry policy shared by both stages.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.backoff_secs),
        )
    }

    /// Pause between leaves.
    #[must_use]
    pub fn politeness_delay(&self) -> Duration {
        Duration::from_millis(self.timing.politeness_delay_ms)
    }

    /// Total timeout for one fetch.
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timing.fetch_timeout_secs)
    }

    /// Chromium launch options.
    #[cfg(feature = "browser")]
    #[must_use]
    pub fn chromium_options(&self) -> crate::browser::ChromiumOptions {
        crate::browser::ChromiumOptions {
            headless: self.browser.headless,
            executable: self.browser.executable.clone(),
            remote_url: self.browser.remote_url.clone(),
            extra_args: self.browser.extra_args.clone(),
            request_timeout: Some(Duration::from_secs(self.timing.control_wait_secs.max(30))),
        }
    }
}

fn validate_secs(field: &'static str, value: u64, allow_zero: bool) -> Result<(), ConfigError> {
    if allow_zero && value == 0 {
        return Ok(());
    }
    if !TIMEOUT_SECS_RANGE.contains(&value) {
        return Err(ConfigError::out_of_range(field, value, &TIMEOUT_SECS_RANGE));
    }
    Ok(())
}

fn validate_millis(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !MILLIS_RANGE.contains(&value) {
        return Err(ConfigError::out_of_range(field, value, &MILLIS_RANGE));
    }
    Ok(())
}
