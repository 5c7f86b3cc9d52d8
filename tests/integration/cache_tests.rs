use image::{DynamicImage, RgbaImage};
use mipcache::cache::{level_size_bytes, mipmap_level, CachedImage, ImageCache};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Tile that counts how often it is flushed.
#[derive(Debug)]
struct Tile {
    pixels: RgbaImage,
    flushes: Arc<AtomicUsize>,
}

impl CachedImage for Tile {
    fn size_bytes(&self) -> u64 {
        self.pixels.size_bytes()
    }

    fn flush(self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
    }
}

fn tile(side: u32, flushes: &Arc<AtomicUsize>) -> Arc<Tile> {
    Arc::new(Tile {
        pixels: RgbaImage::new(side, side),
        flushes: Arc::clone(flushes),
    })
}

#[test]
fn test_pyramid_with_shared_tiles() {
    let flushes = Arc::new(AtomicUsize::new(0));
    let mut cache = ImageCache::new();

    let full = tile(128, &flushes);
    cache.put(1, 0, Arc::clone(&full));
    cache.put(1, 1, tile(64, &flushes));
    cache.put(1, 2, tile(32, &flushes));
    assert_eq!(
        cache.total_bytes(),
        level_size_bytes(128, 128, 0) + level_size_bytes(128, 128, 1) + level_size_bytes(128, 128, 2)
    );

    // Same instance: recency refresh only
    cache.put(1, 0, Arc::clone(&full));
    assert_eq!(flushes.load(Ordering::SeqCst), 0);
    assert_eq!(cache.keys_by_recency().last().map(|k| k.level), Some(0));

    // Dropping the downsampled levels flushes both, level 0 stays
    cache.remove_pyramid(1);
    assert_eq!(flushes.load(Ordering::SeqCst), 2);
    assert!(cache.contains_level(1, 0));
    assert_eq!(cache.len(), 1);

    // The caller still holds `full`, so eviction can't flush the pixels
    cache.remove_and_flush_some(1);
    assert_eq!(flushes.load(Ordering::SeqCst), 2);
    drop(full);
    assert!(cache.is_empty());
}

#[test]
fn test_placeholder_lookup_for_display_magnification() {
    let mut cache = ImageCache::new();
    let side = 1024;
    for level in [0, 3] {
        cache.put(
            5,
            level,
            DynamicImage::ImageRgba8(RgbaImage::new(side >> level, side >> level)),
        );
    }

    let wanted = mipmap_level(0.3, f64::from(side)).expect("positive magnification");
    assert_eq!(wanted, 1);
    assert!(cache.peek(5, wanted).is_none());

    let smaller = cache.get_closest_below(5, wanted).expect("level 3 cached");
    assert_eq!(smaller.width(), 128);
    let larger = cache.get_closest_above(5, wanted).expect("level 0 cached");
    assert_eq!(larger.width(), 1024);

    // Nearest-level queries don't count as lookups
    assert_eq!(cache.stats().hits + cache.stats().misses, 0);
}

#[test]
fn test_budgeted_eviction_by_bytes() {
    let mut cache = ImageCache::new();
    for id in 0..10 {
        cache.put(id, 0, RgbaImage::new(16, 16));
    }
    let one = 16 * 16 * 4;
    assert_eq!(cache.total_bytes(), 10 * one);

    // Touch the oldest so it survives
    assert!(cache.get(0, 0).is_some());

    let freed = cache.remove_and_flush_bytes(one * 3 / 2);
    assert_eq!(freed, 2 * one);
    assert!(cache.contains(0));
    assert!(!cache.contains(1));
    assert!(!cache.contains(2));
    assert!(cache.contains(3));
    assert_eq!(cache.stats().evictions, 2);
}

#[test]
fn test_get_all_and_remove_all() {
    let mut cache = ImageCache::new();
    cache.put(9, 4, RgbaImage::new(2, 2));
    cache.put(9, 0, RgbaImage::new(32, 32));
    cache.put(10, 0, RgbaImage::new(1, 1));

    let all = cache.get_all(9);
    assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![0, 4]);

    let detached = cache.remove_all(9);
    assert_eq!(detached.len(), 2);
    assert_eq!(detached[0].width(), 32);
    assert!(!cache.contains(9));
    assert_eq!(cache.len(), 1);
}
