//! imgbind - fetch remote images, cache them, and bind them to recyclable targets.
//!
//! Images are looked up in a two-tier memory cache, then a content-addressed
//! disk cache, then the network. Concurrent requests for one URL share a
//! single fetch, and a per-target generation check keeps slow results from
//! landing on targets that have since been reused for something else.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing caches, fetchers and configuration.
pub mod infrastructure;

pub use domain::{CacheError, CacheKey, CacheResult, ImageFetcher, ImageTarget, TargetTag};
pub use infrastructure::image::{CompletionQueue, DownloaderConfig, ImageDownloader};

/// Current version of the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "imgbind";
