//! Multi-level LRU image cache.
//!
//! # Overview
//!
//! [`ImageCache`] maps `(id, level)` to a decoded image. Every `put` and
//! every successful `get` moves the key to the most-recently-used end of
//! the recency list, and eviction always takes the least-recently-used
//! entry first, across all ids and levels.
//!
//! Besides exact lookups the cache answers nearest-level queries, so a
//! renderer can show a lower or higher resolution placeholder while the
//! exact level is still decoding.
//!
//! The cache is not synchronized. Wrap it in a lock (see
//! [`TileStore`](super::TileStore)) when it is shared between threads.
//!
//! # Example
//!
//! ```
//! use mipcache::cache::ImageCache;
//! use image::RgbaImage;
//!
//! let mut cache = ImageCache::new();
//! cache.put(7, 0, RgbaImage::new(64, 64));
//! cache.put(7, 2, RgbaImage::new(16, 16));
//!
//! // Level 1 is missing: fall back to the next smaller image
//! let placeholder = cache.get_closest_below(7, 1).unwrap();
//! assert_eq!(placeholder.width(), 16);
//!
//! let freed = cache.remove_and_flush_some(1);
//! assert_eq!(freed, 64 * 64 * 4);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bytesize::ByteSize;
use serde::Serialize;

use super::entry::{CacheEntry, CacheKey, CachedImage};
use super::recency::{RecencyList, SlotId};

/// Hit, miss and eviction counters of an [`ImageCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Exact lookups that found an entry.
    pub hits: u64,
    /// Exact lookups that found nothing.
    pub misses: u64,
    /// Entries flushed by LRU eviction.
    pub evictions: u64,
}

impl CacheStats {
    /// Percentage of exact lookups that hit, or 0 when nothing was looked up.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// LRU cache of decoded images keyed by `(id, level)`.
#[derive(Debug)]
pub struct ImageCache<I> {
    /// Key to slot in the recency list.
    index: HashMap<CacheKey, SlotId>,
    /// Cached levels per id, for nearest-level search.
    levels: HashMap<i64, BTreeSet<u32>>,
    /// Entries ordered from least to most recently used.
    recency: RecencyList<CacheEntry<I>>,
    total_bytes: u64,
    stats: CacheStats,
}

impl<I: CachedImage> ImageCache<I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            levels: HashMap::new(),
            recency: RecencyList::new(),
            total_bytes: 0,
            stats: CacheStats::default(),
        }
    }

    /// Insert or replace the image at `(id, level)`.
    ///
    /// An existing entry at the same key is replaced: the old image is
    /// flushed unless it is the same instance as the new one, in which case
    /// the call only refreshes recency. Either way the key ends up at the
    /// most-recently-used position.
    pub fn put(&mut self, id: i64, level: u32, image: I) {
        let key = CacheKey::new(id, level);

        if let Some(&idx) = self.index.get(&key) {
            self.recency.move_to_back(idx);
            let Some(entry) = self.recency.get_mut(idx) else {
                return;
            };
            if entry.image.same_image(&image) {
                return;
            }
            let new_size = image.size_bytes();
            let old_image = std::mem::replace(&mut entry.image, image);
            let old_size = std::mem::replace(&mut entry.size_bytes, new_size);
            self.total_bytes = self.total_bytes - old_size + new_size;
            old_image.flush();
            return;
        }

        let entry = CacheEntry::new(key, image);
        self.total_bytes += entry.size_bytes;
        let idx = self.recency.push_back(entry);
        self.index.insert(key, idx);
        self.levels.entry(id).or_default().insert(level);
    }

    /// Look up the image at `(id, level)` and mark it most recently used.
    pub fn get(&mut self, id: i64, level: u32) -> Option<&I> {
        let Some(&idx) = self.index.get(&CacheKey::new(id, level)) else {
            self.stats.misses += 1;
            return None;
        };
        self.stats.hits += 1;
        self.recency.move_to_back(idx);
        self.recency.get(idx).map(|e| &e.image)
    }

    /// Look up the image at `(id, level)` without touching recency or stats.
    #[must_use]
    pub fn peek(&self, id: i64, level: u32) -> Option<&I> {
        let idx = *self.index.get(&CacheKey::new(id, level))?;
        self.recency.get(idx).map(|e| &e.image)
    }

    /// The image at `level`, or else the closest cached smaller image
    /// (the nearest larger level) of the same id.
    #[must_use]
    pub fn get_closest_below(&self, id: i64, level: u32) -> Option<&I> {
        let found = *self.levels.get(&id)?.range(level..).next()?;
        self.peek(id, found)
    }

    /// The image at `level`, or else the closest cached larger image
    /// (the nearest smaller level, down to 0) of the same id.
    #[must_use]
    pub fn get_closest_above(&self, id: i64, level: u32) -> Option<&I> {
        let found = *self.levels.get(&id)?.range(..=level).next_back()?;
        self.peek(id, found)
    }

    /// Detach the image at `(id, level)` without flushing it.
    pub fn remove(&mut self, id: i64, level: u32) -> Option<I> {
        self.detach(CacheKey::new(id, level)).map(|e| e.image)
    }

    /// Detach every level of `id` without flushing, smallest level first.
    pub fn remove_all(&mut self, id: i64) -> Vec<I> {
        let levels: Vec<u32> = self
            .levels
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        levels
            .into_iter()
            .filter_map(|level| self.remove(id, level))
            .collect()
    }

    /// Remove and flush every level of `id`.
    pub fn remove_and_flush(&mut self, id: i64) {
        for image in self.remove_all(id) {
            image.flush();
        }
    }

    /// Remove and flush the downsampled levels of `id`, keeping level 0.
    pub fn remove_pyramid(&mut self, id: i64) {
        let levels: Vec<u32> = match self.levels.get(&id) {
            Some(set) => set.range(1..).copied().collect(),
            None => return,
        };
        for level in levels {
            if let Some(image) = self.remove(id, level) {
                image.flush();
            }
        }
    }

    /// Remove and flush the downsampled levels of every id.
    pub fn remove_all_pyramids(&mut self) {
        let keys: Vec<CacheKey> = self
            .index
            .keys()
            .filter(|k| k.level > 0)
            .copied()
            .collect();
        for key in keys {
            if let Some(entry) = self.detach(key) {
                entry.image.flush();
            }
        }
    }

    /// Detach the least recently used image without flushing it.
    pub fn remove_oldest(&mut self) -> Option<I> {
        self.detach_oldest().map(|e| e.image)
    }

    /// Remove and flush every entry, releasing the cache's own capacity.
    pub fn remove_and_flush_all(&mut self) {
        let count = self.recency.len();
        for entry in self.recency.drain() {
            entry.image.flush();
        }
        self.recency.shrink_to_fit();
        self.index.clear();
        self.index.shrink_to_fit();
        self.levels.clear();
        self.levels.shrink_to_fit();
        self.total_bytes = 0;
        log::debug!("Flushed all {} cached images", count);
    }

    /// Every cached level of `id`, keyed by level.
    #[must_use]
    pub fn get_all(&self, id: i64) -> BTreeMap<u32, &I> {
        let Some(levels) = self.levels.get(&id) else {
            return BTreeMap::new();
        };
        levels
            .iter()
            .filter_map(|&level| self.peek(id, level).map(|image| (level, image)))
            .collect()
    }

    /// Flush up to `n` least recently used entries. Returns the bytes freed.
    pub fn remove_and_flush_some(&mut self, n: usize) -> u64 {
        let mut freed = 0;
        let mut evicted = 0;
        while evicted < n {
            let Some(entry) = self.detach_oldest() else {
                break;
            };
            freed += entry.size_bytes;
            evicted += 1;
            entry.image.flush();
        }
        self.stats.evictions += evicted as u64;
        if evicted > 0 {
            log::trace!("Evicted {} images, freed {}", evicted, ByteSize(freed));
        }
        freed
    }

    /// Flush least recently used entries until at least `target` bytes have
    /// been freed or the cache is empty. Returns the bytes freed.
    pub fn remove_and_flush_bytes(&mut self, target: u64) -> u64 {
        let mut freed = 0;
        let mut evicted = 0u64;
        while freed < target {
            let Some(entry) = self.detach_oldest() else {
                break;
            };
            freed += entry.size_bytes;
            evicted += 1;
            entry.image.flush();
        }
        self.stats.evictions += evicted;
        if evicted > 0 {
            log::trace!(
                "Evicted {} images, freed {} of {} requested",
                evicted,
                ByteSize(freed),
                ByteSize(target)
            );
        }
        freed
    }

    /// Whether any level of `id` is cached.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.levels.contains_key(&id)
    }

    /// Whether `(id, level)` is cached.
    #[must_use]
    pub fn contains_level(&self, id: i64, level: u32) -> bool {
        self.index.contains_key(&CacheKey::new(id, level))
    }

    /// Number of cached images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recency.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recency.len() == 0
    }

    /// Sum of the sizes of every cached image.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Cached keys from least to most recently used.
    pub fn keys_by_recency(&self) -> impl Iterator<Item = CacheKey> + '_ {
        self.recency.iter().map(|(_, e)| e.key)
    }

    fn detach(&mut self, key: CacheKey) -> Option<CacheEntry<I>> {
        let idx = self.index.remove(&key)?;
        self.forget_level(key);
        let entry = self.recency.remove(idx)?;
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn detach_oldest(&mut self) -> Option<CacheEntry<I>> {
        let entry = self.recency.pop_front()?;
        self.index.remove(&entry.key);
        self.forget_level(entry.key);
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn forget_level(&mut self, key: CacheKey) {
        if let Some(set) = self.levels.get_mut(&key.id) {
            set.remove(&key.level);
            if set.is_empty() {
                self.levels.remove(&key.id);
            }
        }
    }
}

impl<I: CachedImage> Default for ImageCache<I> {
    fn default() -> Self {
        Self::new()
    }
}
