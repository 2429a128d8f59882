//! Two-tier in-memory image cache.
//!
//! The primary tier is a small LRU holding the hottest images. Entries pushed
//! out of it are demoted, not dropped, into a larger secondary LRU. Whatever
//! falls off the secondary tier is reclaimed, so a secondary lookup may find
//! nothing even though the URL was cached before.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::DynamicImage;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Default capacity of the primary tier.
pub const DEFAULT_PRIMARY_CAPACITY: usize = 10;

/// Default capacity of the secondary tier.
pub const DEFAULT_SECONDARY_CAPACITY: usize = 40;

struct Tiers {
    primary: LruCache<String, Arc<DynamicImage>>,
    secondary: LruCache<String, Arc<DynamicImage>>,
}

impl Tiers {
    /// Inserts into the primary tier, demoting whatever it pushes out.
    fn insert_primary(&mut self, url: String, image: Arc<DynamicImage>) {
        self.secondary.pop(&url);
        if let Some((demoted_url, demoted)) = self.primary.push(url.clone(), image)
            && demoted_url != url
        {
            trace!(url = %demoted_url, "Demoting image to secondary tier");
            if let Some((reclaimed, _)) = self.secondary.push(demoted_url, demoted) {
                trace!(url = %reclaimed, "Reclaimed image from secondary tier");
            }
        }
    }
}

/// In-memory cache for decoded images.
/// Thread-safe; every read-modify-write runs under one lock.
pub struct MemoryImageCache {
    tiers: Mutex<Tiers>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryImageCache {
    /// Creates a new cache with the given tier capacities.
    #[must_use]
    pub fn new(primary_capacity: usize, secondary_capacity: usize) -> Self {
        let primary = NonZeroUsize::new(primary_capacity).unwrap_or(NonZeroUsize::MIN);
        let secondary = NonZeroUsize::new(secondary_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            tiers: Mutex::new(Tiers {
                primary: LruCache::new(primary),
                secondary: LruCache::new(secondary),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up `url`, promoting it to most recently used.
    ///
    /// A secondary hit moves the image back into the primary tier.
    pub fn get(&self, url: &str) -> Option<Arc<DynamicImage>> {
        let mut tiers = self.tiers.lock();

        if let Some(image) = tiers.primary.get(url) {
            let image = image.clone();
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Primary cache hit");
            return Some(image);
        }

        if let Some(image) = tiers.secondary.pop(url) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Secondary cache hit, promoting");
            tiers.insert_primary(url.to_string(), image.clone());
            return Some(image);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(url = %url, "Memory cache miss");
        None
    }

    /// Looks at an image without touching recency or statistics.
    #[must_use]
    pub fn peek(&self, url: &str) -> Option<Arc<DynamicImage>> {
        let tiers = self.tiers.lock();
        tiers
            .primary
            .peek(url)
            .or_else(|| tiers.secondary.peek(url))
            .cloned()
    }

    /// Stores an image in the primary tier.
    pub fn put(&self, url: &str, image: Arc<DynamicImage>) {
        debug!(url = %url, "Storing image in memory cache");
        self.tiers.lock().insert_primary(url.to_string(), image);
    }

    /// Returns true if `url` is held by the primary tier.
    #[must_use]
    pub fn in_primary(&self, url: &str) -> bool {
        self.tiers.lock().primary.contains(url)
    }

    /// Returns true if `url` is held by the secondary tier.
    #[must_use]
    pub fn in_secondary(&self, url: &str) -> bool {
        self.tiers.lock().secondary.contains(url)
    }

    /// Total number of cached images across both tiers.
    #[must_use]
    pub fn len(&self) -> usize {
        let tiers = self.tiers.lock();
        tiers.primary.len() + tiers.secondary.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry of both tiers.
    pub fn clear(&self) {
        let mut tiers = self.tiers.lock();
        tiers.primary.clear();
        tiers.secondary.clear();
        debug!("Cleared memory image cache");
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let tiers = self.tiers.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            primary_size: tiers.primary.len(),
            secondary_size: tiers.secondary.len(),
        }
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Images in the primary tier.
    pub primary_size: usize,
    /// Images in the secondary tier.
    pub secondary_size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {}+{} images, {:.1}% hit rate ({} hits, {} misses)",
            self.primary_size, self.secondary_size, self.hit_rate, self.hits, self.misses
        )
    }
}
