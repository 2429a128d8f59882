//! Image handling infrastructure.
//!
//! This module provides:
//! - Two-tier memory caching with LRU demotion
//! - Content-addressed disk caching for persistence
//! - HTTP fetching and base URL resolution
//! - A worker pool with request de-duplication and a completion queue

pub mod codec;
pub mod disk_cache;
pub mod dispatcher;
pub mod downloader;
pub mod http_fetcher;
pub mod memory_cache;
pub mod pending;
pub mod url_resolver;

pub use disk_cache::DiskImageCache;
pub use dispatcher::{CompletionQueue, Delivery, DownloadCompleted};
pub use downloader::{DownloaderConfig, ImageDownloader};
pub use http_fetcher::HttpFetcher;
pub use memory_cache::{CacheStats, MemoryImageCache};
pub use pending::RequestTracker;
pub use url_resolver::UrlResolver;
