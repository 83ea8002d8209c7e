//! Plain HTTP client for resolved document URLs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, REFERER};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::{DocumentFetcher, FetchError};
use crate::portal::PortalProfile;
use crate::user_agent;

/// Connection establishment bound, separate from the total request bound.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Suffix for in-flight artifacts; renamed away on success.
const PARTIAL_SUFFIX: &str = ".part";

/// Streams documents to disk with a fixed identity and referer.
#[derive(Debug, Clone)]
pub struct DocumentClient {
    client: Client,
    referer: String,
    accepted_content_types: Vec<String>,
}

impl DocumentClient {
    /// Builds a client for `portal` with a total per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend cannot start.
    pub fn new(portal: &PortalProfile, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(user_agent::default_fetch_user_agent())
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            referer: portal.base_url.clone(),
            accepted_content_types: portal
                .accepted_content_types
                .iter()
                .map(|ct| ct.to_ascii_lowercase())
                .collect(),
        })
    }

    /// Returns true if the declared content type is an accepted document type.
    fn accepts(&self, declared: Option<&str>) -> bool {
        let Some(declared) = declared else {
            return false;
        };
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.accepted_content_types.iter().any(|ct| *ct == essence)
    }

    /// Fetches `url` and writes it verbatim to `destination`.
    ///
    /// The body is streamed to a sibling `.part` file and renamed into place
    /// only after the whole body arrived, so a failed transfer never leaves a
    /// file at `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, non-success status,
    /// unexpected content type, or local IO failure.
    #[instrument(skip(self), fields(url = %url, dest = %destination.display()))]
    pub async fn fetch_document(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .header(REFERER, &self.referer)
            .send()
            .await
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::http_status(url, status.as_u16()));
        }

        let declared = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if !self.accepts(declared.as_deref()) {
            debug!(content_type = ?declared, "rejecting non-document response");
            return Err(FetchError::content_type(url, declared));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::io(parent, e))?;
        }

        let partial = partial_path(destination);
        let mut file = File::create(&partial)
            .await
            .map_err(|e| FetchError::io(&partial, e))?;
        let written = match stream_to_file(&mut file, response, url, &partial).await {
            Ok(written) => written,
            Err(error) => {
                debug!(path = %partial.display(), "cleaning up partial file after error");
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(error);
            }
        };
        drop(file);

        if let Err(e) = tokio::fs::rename(&partial, destination).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(FetchError::io(destination, e));
        }

        info!(bytes = written, "document saved");
        Ok(written)
    }
}

#[async_trait]
impl DocumentFetcher for DocumentClient {
    async fn try_fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        self.fetch_document(url, destination).await
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map_or_else(OsString::new, OsString::from);
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, FetchError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| FetchError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_parameters_are_ignored() {
        let client = DocumentClient::new(&PortalProfile::default(), Duration::from_secs(5)).unwrap();
        assert!(client.accepts(Some("application/pdf")));
        assert!(client.accepts(Some("Application/PDF; charset=binary")));
        assert!(!client.accepts(Some("text/html; charset=utf-8")));
        assert!(!client.accepts(None));
    }

    #[test]
    fn test_partial_path_is_a_sibling() {
        assert_eq!(
            partial_path(Path::new("/out/R1/V1.pdf")),
            Path::new("/out/R1/V1.pdf.part")
        );
    }
}
