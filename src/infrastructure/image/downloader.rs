//! Public entry point binding remote images to display targets.
//!
//! Lookup order is memory, then disk, then network. Memory hits are applied
//! on the spot; everything else goes through the dispatcher and comes back
//! through the [`CompletionQueue`] returned at construction.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::disk_cache::{DiskImageCache, default_cache_dir};
use super::dispatcher::{CompletionQueue, DEFAULT_WORKERS, Dispatcher};
use super::http_fetcher::{DEFAULT_USER_AGENT, HttpFetcher};
use super::memory_cache::{
    CacheStats, DEFAULT_PRIMARY_CAPACITY, DEFAULT_SECONDARY_CAPACITY, MemoryImageCache,
};
use super::pending::RequestTracker;
use super::url_resolver::UrlResolver;
use crate::domain::entities::ImageSource;
use crate::domain::errors::CacheResult;
use crate::domain::ports::{ImageFetcher, ImageTarget};

/// Configuration for the image downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Images kept in the primary memory tier.
    pub primary_capacity: usize,
    /// Images kept in the secondary memory tier.
    pub secondary_capacity: usize,
    /// Maximum concurrent fetch jobs.
    pub workers: usize,
    /// Request timeout in seconds. Unset means no timeout.
    pub timeout_secs: Option<u64>,
    /// Disk cache directory. Defaults to the user cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Base that relative request URLs are resolved against.
    pub base_url: Option<String>,
    /// User agent for HTTP requests.
    pub user_agent: String,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            primary_capacity: DEFAULT_PRIMARY_CAPACITY,
            secondary_capacity: DEFAULT_SECONDARY_CAPACITY,
            workers: DEFAULT_WORKERS,
            timeout_secs: None,
            cache_dir: None,
            base_url: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DownloaderConfig {
    /// Returns the configured cache directory or the default one.
    #[must_use]
    pub fn effective_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(default_cache_dir)
    }
}

/// Fetches images and binds them to targets.
///
/// Construct one per application and keep it for the application's lifetime.
/// Dropping it stops the dispatcher; fetches already running still finish and
/// are delivered through the completion queue.
pub struct ImageDownloader {
    memory_cache: Arc<MemoryImageCache>,
    disk_cache: Arc<DiskImageCache>,
    tracker: Arc<RequestTracker>,
    dispatcher: Dispatcher,
    resolver: RwLock<UrlResolver>,
    config: DownloaderConfig,
}

impl std::fmt::Debug for ImageDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageDownloader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageDownloader {
    /// Creates a downloader over the given fetcher and disk cache.
    ///
    /// Returns the downloader and the queue through which asynchronous
    /// results reach their targets.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn new(
        config: DownloaderConfig,
        fetcher: Arc<dyn ImageFetcher>,
        disk_cache: Arc<DiskImageCache>,
    ) -> (Self, CompletionQueue) {
        let memory_cache = Arc::new(MemoryImageCache::new(
            config.primary_capacity,
            config.secondary_capacity,
        ));
        let tracker = Arc::new(RequestTracker::new());

        let (dispatcher, events) = Dispatcher::spawn(
            config.workers,
            memory_cache.clone(),
            disk_cache.clone(),
            fetcher,
        );

        info!(
            workers = config.workers,
            primary = config.primary_capacity,
            secondary = config.secondary_capacity,
            dir = %disk_cache.dir().display(),
            "Image downloader started"
        );

        let downloader = Self {
            memory_cache,
            disk_cache,
            tracker: tracker.clone(),
            dispatcher,
            resolver: RwLock::new(UrlResolver::with_base(config.base_url.as_deref())),
            config,
        };
        (downloader, CompletionQueue::new(events, tracker))
    }

    /// Creates a downloader with an HTTP fetcher and a disk cache at the
    /// configured location.
    ///
    /// # Errors
    /// Returns error if the disk cache or HTTP client cannot be created.
    pub async fn from_config(config: DownloaderConfig) -> CacheResult<(Self, CompletionQueue)> {
        let disk_cache = Arc::new(DiskImageCache::new(config.effective_cache_dir()).await?);
        let fetcher = HttpFetcher::new(
            &config.user_agent,
            config.timeout_secs.map(Duration::from_secs),
        )?;
        Ok(Self::new(config, Arc::new(fetcher), disk_cache))
    }

    /// Requests `url` for `target`.
    ///
    /// The target's tag is updated first. A memory hit is applied before this
    /// returns; otherwise the target is queued and receives the image, or
    /// `None` on failure, when the completion queue delivers it. A URL that
    /// cannot be resolved against the base is answered with `None` at once.
    pub fn download<T: ImageTarget + 'static>(&self, url: &str, target: &Arc<T>) {
        let target: Arc<dyn ImageTarget> = target.clone();
        self.download_dyn(url, &target);
    }

    /// Same as [`ImageDownloader::download`] for type-erased targets.
    pub fn download_dyn(&self, url: &str, target: &Arc<dyn ImageTarget>) {
        let resolution = self.resolver.read().resolve(url);
        let resolved = match resolution {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(url = %url, error = %e, "Malformed URL");
                if let Some(previous) = target.tag().clear() {
                    self.tracker.unregister(&previous, target);
                }
                target.apply(None);
                return;
            }
        };

        let (binding, previous) = target.tag().bind(&resolved);

        if let Some(image) = self.memory_cache.get(&resolved) {
            if let Some(previous) = previous {
                self.tracker.unregister(&previous, target);
            }
            debug!(
                url = %resolved,
                source = %ImageSource::MemoryCache,
                "Image loaded successfully"
            );
            target.apply(Some(image));
            return;
        }

        if self.tracker.register(target, binding, previous.as_deref()) {
            self.dispatcher.enqueue(resolved);
        } else {
            debug!(url = %resolved, "Joined in-flight download");
        }
    }

    /// Forgets whatever `target` asked for.
    ///
    /// The shared fetch keeps running for other targets. Safe to call on a
    /// target with nothing pending, any number of times.
    pub fn cancel<T: ImageTarget + 'static>(&self, target: &Arc<T>) {
        let target: Arc<dyn ImageTarget> = target.clone();
        self.cancel_dyn(&target);
    }

    /// Same as [`ImageDownloader::cancel`] for type-erased targets.
    pub fn cancel_dyn(&self, target: &Arc<dyn ImageTarget>) {
        if let Some(url) = target.tag().clear()
            && self.tracker.unregister(&url, target)
        {
            debug!(url = %url, "Cancelled download for target");
        }
    }

    /// Drops every in-memory image. The disk cache and in-flight fetches are
    /// left alone.
    pub fn clear(&self) {
        self.memory_cache.clear();
        info!("Cleared in-memory image cache");
    }

    /// Replaces the base URL used to resolve relative requests.
    pub fn set_base_url(&self, base: Option<&str>) {
        self.resolver.write().set_base_url(base);
    }

    /// Number of URLs with a fetch outstanding.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tracker.len()
    }

    /// Returns true if a fetch for the resolved form of `url` is outstanding.
    #[must_use]
    pub fn is_loading(&self, url: &str) -> bool {
        self.resolver
            .read()
            .resolve(url)
            .is_ok_and(|resolved| self.tracker.is_pending(&resolved))
    }

    /// Returns memory cache statistics.
    #[must_use]
    pub fn memory_cache_stats(&self) -> CacheStats {
        self.memory_cache.stats()
    }

    /// Returns the disk cache backing this downloader.
    #[must_use]
    pub fn disk_cache(&self) -> &Arc<DiskImageCache> {
        &self.disk_cache
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }
}
