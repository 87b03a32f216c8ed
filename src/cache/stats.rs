//! Path Cache Statistics Module
//!
//! Tracks path cache lookups, misses and evictions.

// == Path Cache Stats ==
/// Counters for the in-memory key-to-path cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathCacheStats {
    /// Lookups answered from memory
    pub hits: u64,
    /// Lookups that had to recompute the path
    pub misses: u64,
    /// Entries dropped by random eviction
    pub evictions: u64,
    /// Current number of cached paths
    pub entries: usize,
}

impl PathCacheStats {
    // == Constructor ==
    /// Creates a new PathCacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Adds `count` evicted entries.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn set_entries(&mut self, count: usize) {
        self.entries = count;
    }
}
