//! Path Cache Module
//!
//! Bounded in-memory map from key fingerprint to computed cache path.

use std::collections::HashMap;
use std::path::PathBuf;

use rand::seq::SliceRandom;

use crate::cache::PathCacheStats;

// == Path Cache ==
/// Fingerprint-to-path map with approximate, random eviction.
///
/// When an insert pushes the size past `limit`, `ceil(limit / 2) + 1` entries
/// chosen uniformly at random are dropped. A limit of zero disables caching.
#[derive(Debug, Default)]
pub struct PathCache {
    entries: HashMap<String, PathBuf>,
    limit: usize,
    stats: PathCacheStats,
}

impl PathCache {
    // == Constructor ==
    pub fn new(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            limit,
            stats: PathCacheStats::new(),
        }
    }

    // == Get ==
    /// Looks up a fingerprint, recording a hit or miss.
    pub fn get(&mut self, fingerprint: &str) -> Option<PathBuf> {
        match self.entries.get(fingerprint) {
            Some(path) => {
                self.stats.record_hit();
                Some(path.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Insert ==
    /// Caches a computed path, evicting at random if the bound is exceeded.
    pub fn insert(&mut self, fingerprint: String, path: PathBuf) {
        if self.limit == 0 {
            return;
        }

        self.entries.insert(fingerprint, path);

        if self.entries.len() > self.limit {
            self.evict_random();
        }
        self.stats.set_entries(self.entries.len());
    }

    fn evict_random(&mut self) {
        let count = (self.limit.div_ceil(2) + 1).min(self.entries.len());
        let keys: Vec<String> = self.entries.keys().cloned().collect();

        let mut rng = rand::thread_rng();
        for key in keys.choose_multiple(&mut rng, count) {
            self.entries.remove(key);
        }
        self.stats.record_evictions(count);
    }

    pub fn stats(&self) -> PathCacheStats {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.contains_key(fingerprint)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_path_cache_hit_and_miss() {
        let mut cache = PathCache::new(4);

        assert_eq!(cache.get("a"), None);
        cache.insert("a".to_string(), path("/tmp/a.fsc"));
        assert_eq!(cache.get("a"), Some(path("/tmp/a.fsc")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_path_cache_zero_limit_never_grows() {
        let mut cache = PathCache::new(0);

        cache.insert("a".to_string(), path("/a"));
        cache.insert("b".to_string(), path("/b"));

        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_path_cache_evicts_half_plus_one() {
        let mut cache = PathCache::new(10);

        for i in 0..10 {
            cache.insert(format!("k{}", i), path(&format!("/{}", i)));
        }
        assert_eq!(cache.len(), 10);

        // 11th entry overflows: ceil(10/2)+1 = 6 dropped
        cache.insert("k10".to_string(), path("/10"));
        assert_eq!(cache.len(), 5);
        assert_eq!(cache.stats().evictions, 6);
    }

    #[test]
    fn test_path_cache_limit_one_empties() {
        let mut cache = PathCache::new(1);

        cache.insert("a".to_string(), path("/a"));
        assert!(cache.contains("a"));

        // Overflow to 2 entries; ceil(1/2)+1 = 2 dropped
        cache.insert("b".to_string(), path("/b"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_path_cache_overwrite_does_not_evict() {
        let mut cache = PathCache::new(2);

        cache.insert("a".to_string(), path("/a"));
        cache.insert("b".to_string(), path("/b"));
        cache.insert("a".to_string(), path("/a2"));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(path("/a2")));
        assert_eq!(cache.stats().evictions, 0);
    }
}
