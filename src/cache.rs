//! Shared cache for raw feature fetches, keyed by bounding box.
//!
//! Sits in front of the normalizer when several requests hit overlapping
//! areas. Concurrent lookups for the same key coalesce into a single fetch;
//! eviction is least-recently-used by entry budget. Cached values are never
//! mutated by the pipeline.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::Coordinate;

/// Bounding box quantized to whole metres, so slightly jittered requests
/// for the same area share an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BboxKey {
    pub min_x: i64,
    pub min_y: i64,
    pub max_x: i64,
    pub max_y: i64,
}

impl BboxKey {
    pub fn new(min: Coordinate, max: Coordinate) -> Self {
        Self {
            min_x: min.x.floor() as i64,
            min_y: min.y.floor() as i64,
            max_x: max.x.ceil() as i64,
            max_y: max.y.ceil() as i64,
        }
    }

    /// Square box of `size` metres centred on `center`.
    pub fn around(center: Coordinate, size: f64) -> Self {
        let half = size / 2.0;
        Self::new(
            Coordinate::new(center.x - half, center.y - half),
            Coordinate::new(center.x + half, center.y + half),
        )
    }
}

struct Inner<V> {
    entries: FxHashMap<BboxKey, Arc<OnceLock<Arc<V>>>>,
    /// Keys in recency order, least recent at the front.
    order: VecDeque<BboxKey>,
}

/// Thread-safe fetch-coalescing LRU cache.
pub struct FeatureCache<V> {
    capacity: usize,
    inner: Mutex<Inner<V>>,
}

impl<V> FeatureCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Inner {
                entries: FxHashMap::default(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns the cached value for `key`, fetching it at most once no
    /// matter how many threads ask concurrently.
    pub fn get_or_fetch(&self, key: BboxKey, fetch: impl FnOnce() -> V) -> Arc<V> {
        let cell = {
            let mut inner = self.inner.lock().expect("cache mutex poisoned");

            let cell = inner
                .entries
                .entry(key)
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone();

            inner.order.retain(|k| *k != key);
            inner.order.push_back(key);

            while inner.entries.len() > self.capacity {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        trace!(?oldest, "evicting cache entry");
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }

            cell
        };

        // initialisation happens outside the map lock; concurrent callers
        // for the same key block here instead of fetching twice
        cell.get_or_init(|| Arc::new(fetch())).clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use test_log::test;

    use super::*;

    #[test]
    fn bbox_key_quantizes_to_metres() {
        let a = BboxKey::new(Coordinate::new(10.2, 20.7), Coordinate::new(30.1, 40.9));
        let b = BboxKey::new(Coordinate::new(10.9, 20.1), Coordinate::new(30.9, 40.2));
        assert_eq!(a, b);
        assert_eq!(a.min_x, 10);
        assert_eq!(a.max_y, 41);
    }

    #[test]
    fn repeated_lookups_fetch_once() {
        let cache: FeatureCache<String> = FeatureCache::new(4);
        let fetches = AtomicUsize::new(0);
        let key = BboxKey::around(Coordinate::new(0.0, 0.0), 400.0);

        for _ in 0..3 {
            let value = cache.get_or_fetch(key, || {
                fetches.fetch_add(1, Ordering::SeqCst);
                "features".to_string()
            });
            assert_eq!(*value, "features");
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_lookups_coalesce() {
        let cache: FeatureCache<u64> = FeatureCache::new(4);
        let fetches = AtomicUsize::new(0);
        let key = BboxKey::around(Coordinate::new(0.0, 0.0), 400.0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let value = cache.get_or_fetch(key, || {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        42
                    });
                    assert_eq!(*value, 42);
                });
            }
        });
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache: FeatureCache<&'static str> = FeatureCache::new(2);
        let fetches = AtomicUsize::new(0);
        let key_a = BboxKey::around(Coordinate::new(0.0, 0.0), 100.0);
        let key_b = BboxKey::around(Coordinate::new(1000.0, 0.0), 100.0);
        let key_c = BboxKey::around(Coordinate::new(2000.0, 0.0), 100.0);

        let fetch = |key| {
            cache.get_or_fetch(key, || {
                fetches.fetch_add(1, Ordering::SeqCst);
                "v"
            })
        };

        fetch(key_a);
        fetch(key_b);
        fetch(key_a); // refresh a; b is now least recent
        fetch(key_c); // evicts b
        assert_eq!(cache.len(), 2);

        fetch(key_a);
        assert_eq!(fetches.load(Ordering::SeqCst), 3);
        fetch(key_b); // refetched after eviction
        assert_eq!(fetches.load(Ordering::SeqCst), 4);
    }
}
