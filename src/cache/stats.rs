//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, fetches, and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Fresh entries served without invoking the fetch function
    pub hits: u64,
    /// Stale entries served while a background refetch was started
    pub stale_hits: u64,
    /// Accesses that found no usable value and had to wait for a fetch
    pub misses: u64,
    /// Accesses that joined an already in-flight fetch
    pub deduplicated: u64,
    /// Fetch functions actually invoked
    pub fetches: u64,
    /// Fetches that completed with an error
    pub failures: u64,
    /// Entries evicted by garbage collection
    pub evictions: u64,
    /// Entries marked stale by prefix invalidation
    pub invalidations: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the share of accesses answered from the cache.
    ///
    /// Stale hits count as answered. Returns 0.0 if nothing was accessed yet.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_stale_hit(&mut self) {
        self.stale_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_dedup(&mut self) {
        self.deduplicated += 1;
    }

    pub fn record_fetch(&mut self) {
        self.fetches += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations += 1;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
