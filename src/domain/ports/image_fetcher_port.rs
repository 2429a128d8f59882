//! Port definition for raw image retrieval.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::CacheResult;

/// Port for retrieving the raw bytes behind an image URL.
/// Implementations must be thread-safe; calls run on dispatcher workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetches the resource at `url`.
    ///
    /// Any transport failure, non-success status or truncated body is an error.
    async fn fetch(&self, url: &str) -> CacheResult<Bytes>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::Semaphore;

    use crate::domain::errors::CacheError;

    /// Fetcher that serves canned responses and counts calls per URL.
    ///
    /// When gated, every fetch parks until [`FakeFetcher::release`] is called,
    /// which keeps requests in flight for as long as a test needs.
    #[derive(Default)]
    pub struct FakeFetcher {
        responses: Mutex<HashMap<String, Bytes>>,
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
        gate: Option<Arc<Semaphore>>,
    }

    impl FakeFetcher {
        /// Creates a fetcher that answers immediately.
        pub fn new() -> Self {
            Self::default()
        }

        /// Creates a fetcher whose calls block until released.
        pub fn gated() -> Self {
            Self {
                gate: Some(Arc::new(Semaphore::new(0))),
                ..Self::default()
            }
        }

        /// Registers the body returned for `url`. Unknown URLs fail with 404.
        pub fn respond(&self, url: &str, body: impl Into<Bytes>) {
            self.responses.lock().insert(url.to_string(), body.into());
        }

        /// Lets every parked and future fetch proceed.
        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.close();
            }
        }

        /// Number of fetches issued for `url`.
        pub fn calls(&self, url: &str) -> usize {
            self.calls.lock().get(url).copied().unwrap_or(0)
        }

        /// Number of fetches issued overall.
        pub fn total_calls(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> CacheResult<Bytes> {
            *self.calls.lock().entry(url.to_string()).or_default() += 1;
            self.total.fetch_add(1, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                // Closing the semaphore is the release signal.
                let _ = gate.acquire().await;
            }

            self.responses
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| CacheError::NetworkError(format!("HTTP 404 for {url}")))
        }
    }
}
