//! Fetch-and-persist: plain HTTP retrieval of resolved document URLs.
//!
//! No browser is involved. A response is accepted only if its declared
//! content type is a document type; soft-404 HTML pages served with HTTP 200
//! are rejected.

mod client;
mod error;
mod path;

pub use client::DocumentClient;
pub use error::FetchError;
pub use path::{artifact_path, sanitize_label};

use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

/// Retrieves a resolved URL into a destination file.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches `url` into `destination`, returning bytes written.
    async fn try_fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError>;

    /// Fetches `url` into `destination`, downgrading any failure to `false`.
    async fn fetch(&self, url: &str, destination: &Path) -> bool {
        match self.try_fetch(url, destination).await {
            Ok(_) => true,
            Err(error) => {
                warn!(url, %error, "fetch failed");
                false
            }
        }
    }
}
