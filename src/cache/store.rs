//! Lock-guarded image cache with a byte budget.
//!
//! [`ImageCache`] itself is unsynchronized. [`TileStore`] owns one behind a
//! mutex and keeps its total size under a configured budget by evicting
//! least-recently-used images before new ones are installed.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytesize::ByteSize;

use super::entry::CachedImage;
use super::image_cache::{CacheStats, ImageCache};

/// Thread-safe, byte-budgeted wrapper around [`ImageCache`].
///
/// Lookups return clones of the cached payload, so payloads are usually
/// shared handles such as `Arc<RgbaImage>`.
#[derive(Debug)]
pub struct TileStore<I> {
    cache: Mutex<ImageCache<I>>,
    max_bytes: u64,
}

impl<I: CachedImage> TileStore<I> {
    /// Create an empty store that holds at most `max_bytes` of images.
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self {
            cache: Mutex::new(ImageCache::new()),
            max_bytes,
        }
    }

    #[must_use]
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Evict until `bytes` more can be held without exceeding the budget.
    ///
    /// Returns `false` if `bytes` is larger than the whole budget. In that
    /// case everything is flushed anyway so the caller has as much room as
    /// possible.
    pub fn release_to_fit(&self, bytes: u64) -> bool {
        let mut cache = self.lock();
        Self::release_locked(&mut cache, bytes, self.max_bytes)
    }

    /// Install an image, evicting older ones first to respect the budget.
    ///
    /// An image larger than the entire budget is still installed after the
    /// store has been emptied.
    pub fn insert(&self, id: i64, level: u32, image: I) {
        let bytes = image.size_bytes();
        let mut cache = self.lock();
        // A replaced entry gives its bytes back
        let replaced = cache.peek(id, level).map_or(0, CachedImage::size_bytes);
        let needed = bytes.saturating_sub(replaced);
        Self::release_locked(&mut cache, needed, self.max_bytes);
        cache.put(id, level, image);
    }

    /// Run `f` with exclusive access to the underlying cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut ImageCache<I>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn contains(&self, id: i64, level: u32) -> bool {
        self.lock().contains_level(id, level)
    }

    pub fn remove(&self, id: i64, level: u32) -> Option<I> {
        self.lock().remove(id, level)
    }

    /// Flush every level of `id`.
    pub fn evict(&self, id: i64) {
        self.lock().remove_and_flush(id);
    }

    pub fn clear(&self) {
        self.lock().remove_and_flush_all();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes()
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    fn release_locked(cache: &mut ImageCache<I>, bytes: u64, max_bytes: u64) -> bool {
        if bytes > max_bytes {
            log::warn!(
                "Can't fit {} in a {} image cache, flushing everything",
                ByteSize(bytes),
                ByteSize(max_bytes)
            );
            cache.remove_and_flush_all();
            return false;
        }
        let available = max_bytes.saturating_sub(cache.total_bytes());
        if bytes <= available {
            return true;
        }
        let freed = cache.remove_and_flush_bytes(bytes - available);
        log::debug!("Released {} to fit {}", ByteSize(freed), ByteSize(bytes));
        true
    }

    /// A poisoned lock still guards a consistent cache: every mutation
    /// finishes its bookkeeping before any payload code runs.
    fn lock(&self) -> MutexGuard<'_, ImageCache<I>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<I: CachedImage + Clone> TileStore<I> {
    /// Clone of the image at `(id, level)`, marking it most recently used.
    pub fn get(&self, id: i64, level: u32) -> Option<I> {
        self.lock().get(id, level).cloned()
    }

    /// Clone of the image at `level` or the closest smaller one.
    pub fn get_closest_below(&self, id: i64, level: u32) -> Option<I> {
        self.lock().get_closest_below(id, level).cloned()
    }

    /// Clone of the image at `level` or the closest larger one.
    pub fn get_closest_above(&self, id: i64, level: u32) -> Option<I> {
        self.lock().get_closest_above(id, level).cloned()
    }
}
