//! Cache keys, entries and the payload trait.

use std::sync::Arc;

use image::{DynamicImage, RgbaImage};

/// Key of a cached image: the owning object id and the mipmap level.
///
/// Level 0 is full resolution; each increment halves both dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Id of the domain object the image belongs to.
    pub id: i64,
    /// Resolution tier.
    pub level: u32,
}

impl CacheKey {
    #[must_use]
    pub const fn new(id: i64, level: u32) -> Self {
        Self { id, level }
    }
}

/// A decoded image that can be held by an [`ImageCache`](super::ImageCache).
///
/// The cache owns every payload it holds. When an entry is evicted or
/// replaced the payload is handed to [`flush`](CachedImage::flush), which
/// releases whatever resources it holds. Entries detached with `remove`
/// are returned to the caller unflushed.
pub trait CachedImage {
    /// Byte footprint of the decoded pixels. Read once, at insertion.
    fn size_bytes(&self) -> u64;

    /// Release the payload. The default simply drops it.
    fn flush(self)
    where
        Self: Sized,
    {
        drop(self);
    }

    /// Whether `other` is the very same image instance as `self`.
    ///
    /// Owned buffers are never the same instance; shared handles
    /// (`Arc<T>`) compare by pointer.
    fn same_image(&self, _other: &Self) -> bool {
        false
    }
}

impl<T: CachedImage> CachedImage for Arc<T> {
    fn size_bytes(&self) -> u64 {
        self.as_ref().size_bytes()
    }

    /// Flushes the inner image only when this was the last handle to it.
    fn flush(self) {
        if let Ok(inner) = Arc::try_unwrap(self) {
            inner.flush();
        }
    }

    fn same_image(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl CachedImage for DynamicImage {
    fn size_bytes(&self) -> u64 {
        self.as_bytes().len() as u64
    }
}

impl CachedImage for RgbaImage {
    fn size_bytes(&self) -> u64 {
        self.as_raw().len() as u64
    }
}

/// A cached image together with its key and the size recorded at insertion.
#[derive(Debug)]
pub struct CacheEntry<I> {
    pub key: CacheKey,
    pub image: I,
    pub size_bytes: u64,
}

impl<I: CachedImage> CacheEntry<I> {
    /// Create an entry, sampling the payload size once.
    #[must_use]
    pub fn new(key: CacheKey, image: I) -> Self {
        let size_bytes = image.size_bytes();
        Self {
            key,
            image,
            size_bytes,
        }
    }
}
