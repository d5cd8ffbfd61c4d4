//! Process-wide cache of loaded rasters.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use utci_core::RasterField;

pub trait CacheEntry {
    fn loaded_at(&self) -> Instant;
}

/// Drop entries older than `max_age`, then the oldest until at most
/// `max_entries` remain.
pub fn prune_cache<K, V>(cache: &DashMap<K, V>, max_entries: usize, max_age: Duration)
where
    K: Clone + Eq + Hash,
    V: CacheEntry,
{
    let now = Instant::now();
    cache.retain(|_, entry| now.duration_since(entry.loaded_at()) <= max_age);
    if cache.len() <= max_entries {
        return;
    }

    let mut by_age: Vec<(K, Instant)> = cache
        .iter()
        .map(|entry| (entry.key().clone(), entry.value().loaded_at()))
        .collect();
    by_age.sort_by_key(|(_, loaded_at)| *loaded_at);
    let excess = by_age.len().saturating_sub(max_entries);
    for (key, _) in by_age.into_iter().take(excess) {
        cache.remove(&key);
    }
}

#[derive(Debug, Clone)]
struct CachedRaster {
    field: Arc<dyn RasterField>,
    loaded_at: Instant,
}

impl CacheEntry for CachedRaster {
    fn loaded_at(&self) -> Instant {
        self.loaded_at
    }
}

/// Loaded raster fields keyed by source location. Fields are read-only
/// once inserted.
#[derive(Debug)]
pub struct RasterCache {
    entries: DashMap<String, CachedRaster>,
    max_entries: usize,
    max_age: Duration,
}

impl RasterCache {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            max_age,
        }
    }

    /// A fresh entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<dyn RasterField>> {
        let entry = self.entries.get(key)?;
        if entry.loaded_at.elapsed() > self.max_age {
            return None;
        }
        Some(entry.field.clone())
    }

    pub fn insert(&self, key: impl Into<String>, field: Arc<dyn RasterField>) {
        self.entries.insert(
            key.into(),
            CachedRaster {
                field,
                loaded_at: Instant::now(),
            },
        );
        prune_cache(&self.entries, self.max_entries, self.max_age);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utci_core::{Crs, DenseGrid, GeoTransform, GridGeometry};

    #[derive(Clone)]
    struct Stamp(Instant);

    impl CacheEntry for Stamp {
        fn loaded_at(&self) -> Instant {
            self.0
        }
    }

    fn field() -> Arc<dyn RasterField> {
        let geometry = GridGeometry::new(
            1,
            1,
            GeoTransform::north_up(0.0, 1.0, 1.0, 1.0),
            Crs::Geographic,
        )
        .unwrap();
        Arc::new(DenseGrid::new(geometry, vec![25.0]).unwrap())
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let base = Instant::now();
        let cache: DashMap<&str, Stamp> = DashMap::new();
        cache.insert("old", Stamp(base + Duration::from_secs(1)));
        cache.insert("mid", Stamp(base + Duration::from_secs(2)));
        cache.insert("new", Stamp(base + Duration::from_secs(3)));

        prune_cache(&cache, 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
        assert!(!cache.contains_key("old"));
    }

    #[test]
    fn drops_expired_entries() {
        let cache: DashMap<&str, Stamp> = DashMap::new();
        cache.insert("stale", Stamp(Instant::now()));
        std::thread::sleep(Duration::from_millis(5));
        prune_cache(&cache, 10, Duration::from_millis(1));
        assert!(cache.is_empty());
    }

    #[test]
    fn serves_fresh_rasters() {
        let cache = RasterCache::new(4, Duration::from_secs(60));
        assert!(cache.get("a").is_none());
        cache.insert("a", field());
        assert_eq!(cache.get("a").unwrap().value_at(0, 0), 25.0);
        assert_eq!(cache.len(), 1);
    }
}
