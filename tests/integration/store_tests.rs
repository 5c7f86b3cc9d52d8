use image::RgbaImage;
use mipcache::cache::TileStore;
use std::sync::Arc;
use std::thread;

const TILE_BYTES: u64 = 8 * 8 * 4;

fn tile() -> Arc<RgbaImage> {
    Arc::new(RgbaImage::new(8, 8))
}

#[test]
fn test_store_stays_within_budget_under_contention() {
    let store = Arc::new(TileStore::new(TILE_BYTES * 16));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..50 {
                    let id = t * 1000 + i;
                    store.insert(id, 0, tile());
                    assert!(store.total_bytes() <= store.max_bytes());
                    // Readers race with writers
                    let _ = store.get(id, 0);
                    let _ = store.get_closest_below(id, 0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(store.len(), 16);
    assert_eq!(store.total_bytes(), TILE_BYTES * 16);
}

#[test]
fn test_release_to_fit_reports_oversized_requests() {
    let store = TileStore::new(TILE_BYTES * 4);
    for id in 0..4 {
        store.insert(id, 0, tile());
    }

    assert!(store.release_to_fit(TILE_BYTES * 2));
    assert_eq!(store.len(), 2);
    assert!(!store.contains(0, 0));
    assert!(store.contains(3, 0));

    assert!(!store.release_to_fit(TILE_BYTES * 5));
    assert!(store.is_empty());
}

#[test]
fn test_store_returns_shared_handles() {
    let store = TileStore::new(TILE_BYTES * 4);
    let original = tile();
    store.insert(1, 2, Arc::clone(&original));

    let fetched = store.get(1, 2).expect("cached");
    assert!(Arc::ptr_eq(&fetched, &original));
    assert!(store.get_closest_above(1, 5).is_some());
    assert!(store.get_closest_below(1, 3).is_none());

    store.evict(1);
    assert!(store.is_empty());
    assert_eq!(store.stats().hits, 1);
}
