//! Domain layer with core entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, ImageSource, TargetTag};
pub use errors::{CacheError, CacheResult};
pub use ports::{ImageFetcher, ImageTarget};
