//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.
//! The counters are advisory; no cache decision reads them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of reads that found a live entry
    pub hits: u64,
    /// Number of reads that found nothing live (never set or expired)
    pub misses: u64,
    /// Number of entries removed by the background sweep
    pub sweep_evictions: u64,
    /// Number of entries removed by an explicit delete
    pub delete_evictions: u64,
    /// Current number of entries in the table, including expired-not-swept
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by every caller and the sweep task.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    sweep_evictions: AtomicU64,
    delete_evictions: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sweep_evictions(&self, count: u64) {
        self.sweep_evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.delete_evictions.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Reads all counters into a [`CacheStats`].
    pub(crate) fn snapshot(&self, total_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sweep_evictions: self.sweep_evictions.load(Ordering::Relaxed),
            delete_evictions: self.delete_evictions.load(Ordering::Relaxed),
            total_entries,
        }
    }
}
