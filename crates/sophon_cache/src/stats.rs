//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hit, miss and eviction counters shared by every cache policy.
///
/// All counters are atomic and can be read while the cache is in use.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    clears: AtomicU64,
}

impl CacheStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// Acquisitions served by an existing entry.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Acquisitions that allocated a new native string.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Entries freed by the eviction policy (not by `clear`).
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Number of `clear` calls.
    pub fn clears(&self) -> u64 {
        self.clears.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of every counter.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            clears: self.clears(),
        }
    }
}

/// A plain copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Acquisitions served by an existing entry.
    pub hits: u64,
    /// Acquisitions that allocated.
    pub misses: u64,
    /// Entries freed by eviction.
    pub evictions: u64,
    /// `clear` calls.
    pub clears: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of acquisitions served from the cache, 0.0 when idle.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn default_stats_are_zero() {
        let stats = CacheStats::new();
        assert_eq!(stats.snapshot(), CacheStatsSnapshot::default());
        assert_eq!(stats.snapshot().hit_ratio(), 0.0);
    }

    #[test]
    fn hit_ratio() {
        let stats = CacheStats::new();
        stats.record_miss();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.snapshot().hit_ratio(), 0.75);
    }

    #[test]
    fn concurrent_updates() {
        let stats = Arc::new(CacheStats::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..250 {
                        stats.record_hit();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.hits(), 1000);
    }
}
