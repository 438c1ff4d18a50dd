//! Decoded image cache.
//!
//! Keeps decoded handles keyed by a digest of the element `src`, so snapshots
//! restored by undo/redo or a design load can be repainted without decoding
//! the same bytes again.

use std::collections::HashMap;

use matty_core::ImageHandle;
use sha2::{Digest, Sha256};

/// Cache key: SHA-256 of an image source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceKey([u8; 32]);

impl SourceKey {
    /// Digest an image source.
    #[must_use]
    pub fn of(src: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(src.as_bytes());
        Self(hasher.finalize().into())
    }
}

/// Entry in the image cache.
#[derive(Debug)]
struct CacheEntry {
    handle: ImageHandle,
    /// Tick of the last access; smaller is older.
    last_used: u64,
}

/// Configuration for the image cache.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Maximum total pixel bytes held.
    pub max_size_bytes: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 256 * 1024 * 1024, // 256 MB
            max_entries: 256,
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of evictions.
    pub evictions: u64,
}

/// Least-recently-used cache of decoded images with size and count limits.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: HashMap<SourceKey, CacheEntry>,
    config: ImageCacheConfig,
    current_size: usize,
    tick: u64,
    stats: CacheStats,
}

impl ImageCache {
    /// Create a cache with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ImageCacheConfig::default())
    }

    /// Create a cache with custom limits.
    #[must_use]
    pub fn with_config(config: ImageCacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            current_size: 0,
            tick: 0,
            stats: CacheStats::default(),
        }
    }

    /// Look up the decoded image for `src`.
    pub fn get(&mut self, src: &str) -> Option<ImageHandle> {
        self.tick += 1;
        let tick = self.tick;
        if let Some(entry) = self.entries.get_mut(&SourceKey::of(src)) {
            entry.last_used = tick;
            self.stats.hits += 1;
            Some(entry.handle.clone())
        } else {
            self.stats.misses += 1;
            None
        }
    }

    /// Cache the decoded image for `src`.
    ///
    /// Images larger than the whole cache are not stored.
    pub fn insert(&mut self, src: &str, handle: ImageHandle) {
        let key = SourceKey::of(src);
        let size = handle.byte_len();

        if let Some(old) = self.entries.remove(&key) {
            self.current_size -= old.handle.byte_len();
        }
        if size > self.config.max_size_bytes {
            tracing::debug!("Image of {size} bytes exceeds cache capacity");
            return;
        }

        while !self.entries.is_empty()
            && (self.current_size + size > self.config.max_size_bytes
                || self.entries.len() >= self.config.max_entries)
        {
            self.evict_lru();
        }

        self.tick += 1;
        self.current_size += size;
        self.entries.insert(
            key,
            CacheEntry {
                handle,
                last_used: self.tick,
            },
        );
    }

    /// Check if an image is cached.
    #[must_use]
    pub fn contains(&self, src: &str) -> bool {
        self.entries.contains_key(&SourceKey::of(src))
    }

    /// Drop every cached image.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_size = 0;
    }

    /// Get the current number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the current cache size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Get cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(key, _)| *key);

        if let Some(key) = oldest {
            if let Some(entry) = self.entries.remove(&key) {
                self.current_size -= entry.handle.byte_len();
                self.stats.evictions += 1;
            }
        }
    }
}
