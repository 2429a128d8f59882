//! Disk-based image cache for persistence across sessions.
//!
//! Files are content-addressed: the name is the SHA-256 of the URL. Entries
//! are never expired here; removal is an explicit caller decision.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use image::DynamicImage;
use tokio::fs;
use tracing::{debug, trace, warn};

use super::codec;
use crate::domain::entities::{CACHE_FILE_EXTENSION, CacheKey};
use crate::domain::errors::{CacheError, CacheResult};

/// Disk-based cache that persists encoded images.
pub struct DiskImageCache {
    cache_dir: PathBuf,
    current_size: AtomicU64,
    item_count: AtomicUsize,
}

impl DiskImageCache {
    /// Opens (creating if needed) a disk cache in the specified directory.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be created or read.
    pub async fn new(cache_dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to create cache dir: {e}")))?;
        let mut total_size = 0u64;
        let mut count = 0usize;

        let mut entries = fs::read_dir(&cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to read cache dir: {e}")))?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if is_cache_file(&path)
                && let Ok(meta) = entry.metadata().await
            {
                total_size += meta.len();
                count += 1;
            }
        }

        debug!(dir = %cache_dir.display(), count, total_size, "Opened disk cache");

        Ok(Self {
            cache_dir,
            current_size: AtomicU64::new(total_size),
            item_count: AtomicUsize::new(count),
        })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path a URL is persisted under.
    #[must_use]
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(CacheKey::from_url(url).file_name())
    }

    /// Gets the encoded bytes stored for `url`.
    pub async fn get_bytes(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.cache_path(url);
        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(url = %url, path = %path.display(), "Disk cache hit");
                Some(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(url = %url, "Disk cache miss");
                None
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to read disk cache entry");
                None
            }
        }
    }

    /// Loads and decodes the image stored for `url`.
    ///
    /// An entry that no longer decodes counts as a miss.
    pub async fn get(&self, url: &str) -> Option<Arc<DynamicImage>> {
        let bytes = self.get_bytes(url).await?;

        match codec::decode_blocking(bytes.into()).await {
            Ok(image) => {
                debug!(url = %url, "Decoded image from disk cache");
                Some(image)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to decode cached image");
                None
            }
        }
    }

    /// Encodes `image` and stores it for `url`, replacing any previous entry.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// a failed write never leaves a truncated entry behind.
    ///
    /// # Errors
    /// Returns error if the image cannot be encoded or the file cannot be written.
    pub async fn put(&self, url: &str, image: Arc<DynamicImage>) -> CacheResult<()> {
        let bytes = tokio::task::spawn_blocking(move || codec::encode(&image))
            .await
            .map_err(|e| CacheError::EncodeError(format!("Encode task panicked: {e}")))??;
        self.put_bytes(url, bytes).await
    }

    /// Stores already-encoded bytes for `url`.
    ///
    /// # Errors
    /// Returns error if file cannot be created or written.
    pub async fn put_bytes(&self, url: &str, bytes: Vec<u8>) -> CacheResult<()> {
        let path = self.cache_path(url);
        let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();

        match old_size {
            Some(_) => debug!(url = %url, path = %path.display(), "Updating cached file"),
            None => debug!(url = %url, path = %path.display(), "Creating cached file"),
        }

        let new_size = bytes.len() as u64;
        let target = path.clone();
        let dir = self.cache_dir.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &bytes))
            .await
            .map_err(|e| CacheError::IoError(format!("Write task panicked: {e}")))??;

        if let Some(old) = old_size {
            if new_size > old {
                self.current_size
                    .fetch_add(new_size - old, Ordering::Relaxed);
            } else {
                self.current_size
                    .fetch_sub(old - new_size, Ordering::Relaxed);
            }
        } else {
            self.current_size.fetch_add(new_size, Ordering::Relaxed);
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }

    /// Removes the entry for `url`.
    pub async fn evict(&self, url: &str) {
        let path = self.cache_path(url);
        let size = fs::metadata(&path).await.map(|m| m.len()).ok();
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(url = %url, error = %e, "Failed to evict from disk cache");
            }
        } else if let Some(s) = size {
            self.current_size.fetch_sub(s, Ordering::Relaxed);
            self.item_count.fetch_sub(1, Ordering::Relaxed);
            debug!(url = %url, "Evicted from disk cache");
        }
    }

    /// Removes every cache file from the directory.
    ///
    /// # Errors
    /// Returns error if cache directory cannot be read.
    pub async fn clear(&self) -> CacheResult<()> {
        let mut entries = fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to read cache dir: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::IoError(format!("Failed to read entry: {e}")))?
        {
            let path = entry.path();
            if is_cache_file(&path) && fs::remove_file(&path).await.is_err() {
                warn!(path = %path.display(), "Failed to remove cache file");
            }
        }
        self.current_size.store(0, Ordering::Relaxed);
        self.item_count.store(0, Ordering::Relaxed);
        debug!("Cleared disk cache");
        Ok(())
    }

    /// Returns the current cache size in bytes.
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Returns the number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed)
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if an image is cached.
    pub async fn contains(&self, url: &str) -> bool {
        let path = self.cache_path(url);
        fs::try_exists(&path).await.unwrap_or(false)
    }
}

impl std::fmt::Debug for DiskImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskImageCache")
            .field("cache_dir", &self.cache_dir)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

fn is_cache_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == CACHE_FILE_EXTENSION)
}

fn write_atomically(dir: &Path, target: &Path, bytes: &[u8]) -> CacheResult<()> {
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| CacheError::IoError(format!("Failed to create cache file: {e}")))?;
    temp_file
        .write_all(bytes)
        .and_then(|()| temp_file.flush())
        .map_err(|e| CacheError::IoError(format!("Failed to write cache file: {e}")))?;
    temp_file
        .persist(target)
        .map_err(|e| CacheError::IoError(format!("Failed to persist cache file: {}", e.error)))?;
    Ok(())
}

/// Returns the default cache directory path.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "imgbind", "imgbind").map_or_else(
        || std::env::temp_dir().join("imgbind").join("cache").join("images"),
        |dirs| dirs.cache_dir().join("images"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::image::codec::png_bytes;
    use tempfile::TempDir;

    async fn create_test_cache() -> (DiskImageCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let cache = DiskImageCache::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        (cache, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get_image() {
        let (cache, _temp) = create_test_cache().await;
        let url = "http://x/a.png";

        cache
            .put(url, Arc::new(DynamicImage::new_rgb8(12, 8)))
            .await
            .unwrap();
        let retrieved = cache.get(url).await.unwrap();

        assert_eq!((retrieved.width(), retrieved.height()), (12, 8));
    }

    #[tokio::test]
    async fn test_file_name_is_content_addressed() {
        let (cache, temp) = create_test_cache().await;
        let url = "http://x/a.png";

        cache.put_bytes(url, png_bytes(1, 1)).await.unwrap();

        let expected = temp
            .path()
            .join(format!("{}.img", CacheKey::from_url(url).as_str()));
        assert!(expected.exists());
        assert_eq!(cache.cache_path(url), expected);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let (cache, _temp) = create_test_cache().await;
        assert!(cache.get_bytes("http://x/none.png").await.is_none());
        assert!(cache.get("http://x/none.png").await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (cache, _temp) = create_test_cache().await;
        let url = "http://x/broken.png";
        cache.put_bytes(url, b"garbage".to_vec()).await.unwrap();

        assert!(cache.contains(url).await);
        assert!(cache.get(url).await.is_none());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temporary_files() {
        let (cache, temp) = create_test_cache().await;
        cache.put_bytes("http://x/a.png", png_bytes(1, 1)).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(is_cache_file(&names[0]));
    }

    #[tokio::test]
    async fn test_failed_write_is_reported() {
        let (cache, temp) = create_test_cache().await;
        let dir = temp.path().to_path_buf();
        drop(temp);

        let result = cache.put_bytes("http://x/a.png", png_bytes(1, 1)).await;
        assert!(matches!(result, Err(CacheError::IoError(_))));
        assert!(!dir.exists());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_evict() {
        let (cache, _temp) = create_test_cache().await;
        let url = "http://x/a.png";

        cache.put_bytes(url, b"test".to_vec()).await.unwrap();
        assert!(cache.contains(url).await);

        cache.evict(url).await;
        assert!(!cache.contains(url).await);

        // Evicting twice is harmless.
        cache.evict(url).await;
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_clear_only_removes_cache_files() {
        let (cache, temp) = create_test_cache().await;
        let foreign = temp.path().join("keep.txt");
        std::fs::write(&foreign, "not ours").unwrap();

        cache.put_bytes("http://x/1", b"data1".to_vec()).await.unwrap();
        cache.put_bytes("http://x/2", b"data2".to_vec()).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear().await.unwrap();
        assert_eq!(cache.len(), 0);
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_atomic_counters_sync() {
        let (cache, _temp) = create_test_cache().await;

        assert_eq!(cache.current_size(), 0);

        cache.put_bytes("http://x/1", b"hello".to_vec()).await.unwrap();
        cache.put_bytes("http://x/2", b"world!".to_vec()).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.current_size(), 11);

        cache.put_bytes("http://x/1", b"hey".to_vec()).await.unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.current_size(), 9);

        cache.evict("http://x/2").await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_size(), 3);
    }

    #[tokio::test]
    async fn test_reopen_counts_existing_entries() {
        let temp = TempDir::new().unwrap();
        {
            let cache = DiskImageCache::new(temp.path().to_path_buf()).await.unwrap();
            cache.put_bytes("http://x/1", b"12345".to_vec()).await.unwrap();
        }

        let reopened = DiskImageCache::new(temp.path().to_path_buf()).await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.current_size(), 5);
        assert!(reopened.get_bytes("http://x/1").await.is_some());
    }
}
