//! In-memory cache of decoded image tiles.
//!
//! # Architecture
//!
//! * [`entry`]: keys, entries and the [`CachedImage`] payload trait.
//! * [`image_cache`]: the unsynchronized multi-level LRU [`ImageCache`].
//! * [`store`]: [`TileStore`], a mutex-guarded cache with a byte budget.
//! * [`level`]: mipmap level selection for a display magnification.
//!
//! Images are keyed by `(id, level)`, where `id` is the owning object and
//! `level` the mipmap tier (0 is full resolution). Recency is refreshed on
//! every read, and eviction always takes the least recently used image
//! first, whichever object it belongs to.

pub mod entry;
pub mod image_cache;
pub mod level;
mod recency;
pub mod store;

pub use entry::{CacheEntry, CacheKey, CachedImage};
pub use image_cache::{CacheStats, ImageCache};
pub use level::{level_size_bytes, max_level, mipmap_level};
pub use store::TileStore;
