//! Image cache error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while fetching, decoding or persisting an image.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Failed to decode image bytes.
    #[error("decode error: {0}")]
    DecodeError(String),
    /// Failed to encode an image for persistence.
    #[error("encode error: {0}")]
    EncodeError(String),
    /// I/O error during cache operation.
    #[error("io error: {0}")]
    IoError(String),
    /// Network error during download.
    #[error("network error: {0}")]
    NetworkError(String),
    /// URL could not be parsed or resolved.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl CacheError {
    /// Returns whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkError(_) | Self::IoError(_))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}
