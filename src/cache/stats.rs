//! Cache Statistics Module
//!
//! Counters kept by the memory store and the snapshot returned by
//! `CacheService::stats`.

use serde::Serialize;

// == Cache Counters ==
/// Running counters of the memory store.
#[derive(Debug, Clone, Default)]
pub struct CacheCounters {
    /// Reads answered from memory
    pub hits: u64,
    /// Reads answered from the durable store after a memory miss
    pub durable_hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries evicted due to LRU policy
    pub evictions: u64,
}

impl CacheCounters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_durable_hit(&mut self) {
        self.durable_hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Cache Stats ==
/// Read-only snapshot of a cache service.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Entries currently in memory
    pub memory_size: usize,
    /// Memory store capacity
    pub max_size: usize,
    /// Coarse heuristic: memory size over cumulative access count.
    /// This is not a hit ratio; see [`CacheStats::hit_rate`] for that.
    pub hit_rate_approx: f64,
    /// Last observed connectivity
    pub is_online: bool,
    /// Configured entry version
    pub version: String,
    pub hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Cumulative LRU touches
    pub access_counter: u64,
}

impl CacheStats {
    /// Builds a snapshot, deriving `hit_rate_approx` from size and access count.
    pub fn new(
        memory_size: usize,
        max_size: usize,
        access_counter: u64,
        counters: &CacheCounters,
        is_online: bool,
        version: impl Into<String>,
    ) -> Self {
        let hit_rate_approx = if access_counter == 0 {
            0.0
        } else {
            memory_size as f64 / access_counter as f64
        };

        Self {
            memory_size,
            max_size,
            hit_rate_approx,
            is_online,
            version: version.into(),
            hits: counters.hits,
            durable_hits: counters.durable_hits,
            misses: counters.misses,
            evictions: counters.evictions,
            access_counter,
        }
    }

    // == Hit Rate ==
    /// Calculates the true hit rate, counting durable hits as hits.
    ///
    /// Returns 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}
