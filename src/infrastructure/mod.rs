//! Infrastructure layer with adapters for the network, filesystem and configuration.

/// Application configuration.
pub mod config;
/// Image fetching, caching and delivery.
pub mod image;

pub use config::{
    AppConfig, CliArgs, Command, ConfigError, LoadedConfig, LogLevel, StorageManager,
};
pub use image::{
    CacheStats, CompletionQueue, Delivery, DiskImageCache, DownloadCompleted, DownloaderConfig,
    HttpFetcher, ImageDownloader, MemoryImageCache,
};
