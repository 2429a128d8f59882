//! Conversions between raw bytes and decoded images.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};

use crate::domain::errors::{CacheError, CacheResult};

/// Format used for images persisted to disk.
pub const DISK_FORMAT: ImageFormat = ImageFormat::Png;

/// Decodes raw bytes, guessing the format from the content.
///
/// # Errors
/// Returns `DecodeError` if the bytes are not a supported image.
pub fn decode(bytes: &[u8]) -> CacheResult<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| CacheError::DecodeError(e.to_string()))
}

/// Encodes an image in [`DISK_FORMAT`].
///
/// # Errors
/// Returns `EncodeError` if the image cannot be represented in the format.
pub fn encode(image: &DynamicImage) -> CacheResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, DISK_FORMAT)
        .map_err(|e| CacheError::EncodeError(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Decodes on the blocking pool so workers stay responsive.
///
/// # Errors
/// Returns `DecodeError` on malformed content or if the decode task panicked.
pub async fn decode_blocking(bytes: bytes::Bytes) -> CacheResult<Arc<DynamicImage>> {
    tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .map_err(|e| CacheError::DecodeError(format!("decode task panicked: {e}")))?
        .map(Arc::new)
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&DynamicImage::new_rgba8(width, height)).unwrap()
}
