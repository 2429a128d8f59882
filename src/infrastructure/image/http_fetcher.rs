//! HTTP implementation of the fetcher port.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::ImageFetcher;

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("imgbind/", env!("CARGO_PKG_VERSION"));

/// Fetches images over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a fetcher. `timeout` of `None` lets requests run unbounded.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> CacheResult<Self> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| CacheError::NetworkError(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> CacheResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CacheError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::NetworkError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }
        Ok(response)
    }

    /// Streams the resource at `url` into `output`, returning the byte count.
    ///
    /// The body is written to a temporary file next to `output` and renamed
    /// into place once complete.
    ///
    /// # Errors
    /// Returns error on any network failure, non-success status or I/O error.
    pub async fn download_raw(&self, url: &str, output: &Path) -> CacheResult<u64> {
        let response = self.get(url).await?;

        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let temp = tempfile::NamedTempFile::new_in(parent)?;
        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);

        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| CacheError::NetworkError(format!("Failed to read body: {e}")))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        temp.persist(output)
            .map_err(|e| CacheError::IoError(format!("Failed to persist download: {}", e.error)))?;

        debug!(url = %url, path = %output.display(), bytes = written, "Downloaded raw resource");
        Ok(written)
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> CacheResult<Bytes> {
        debug!(url = %url, "Downloading image from network");
        let response = self.get(url).await?;
        response
            .bytes()
            .await
            .map_err(|e| CacheError::NetworkError(format!("Failed to read body: {e}")))
    }
}
