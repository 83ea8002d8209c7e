//! Cascade Harvest core library
//!
//! Crawls a records portal whose location hierarchy is exposed as a chain of
//! dependent dropdowns, resolves each leaf location to a document URL by
//! driving a browser, and downloads the documents over plain HTTP. Runs are
//! resumable: progress and resolved links are checkpointed to disk.
//!
//! # Architecture
//!
//! - [`browser`] - browser session seam and the Chromium adapter
//! - [`catalog`] - four-level location hierarchy and leaf keys
//! - [`navigator`] - cascade driving, paginated leaf listing, discovery
//! - [`resolver`] - per-leaf resolution state machine
//! - [`fetch`] - content-type-gated document download
//! - [`ledger`] - progress ledger and resolved-link catalog
//! - [`orchestrator`] - resolve/download run with retries and checkpoints
//! - [`config`] - TOML configuration

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod browser;
pub mod catalog;
pub mod config;
pub mod failure;
pub mod fetch;
pub mod ledger;
pub mod navigator;
pub mod orchestrator;
pub mod portal;
pub mod resolver;

mod patterns;
mod user_agent;

// Re-export commonly used types
pub use browser::{BrowserError, BrowserSession, Locator};
#[cfg(feature = "browser")]
pub use browser::{ChromiumOptions, ChromiumSession};
pub use catalog::{Catalog, CatalogError, CatalogStats, LeafKey, LeafPath};
pub use config::{ConfigError, HarvestConfig, LoadedConfig};
pub use failure::FailureKind;
pub use fetch::{DocumentClient, DocumentFetcher, FetchError};
pub use ledger::{LedgerError, ProgressLedger, ResolvedLinkCatalog};
pub use navigator::{CascadeNavigator, CascadeTiming, NavigatorError, discover};
pub use orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorSettings, RetryPolicy, RunObserver, RunReport,
    RunStats, Shard, StatePaths,
};
pub use portal::PortalProfile;
pub use resolver::{DocumentResolver, LeafResolver, ResolveFailure, SessionResolver};
