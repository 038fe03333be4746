//! Reference-counted cache with idle-time eviction.

use crate::cache::NativeStringCache;
use crate::clock::{Clock, SystemClock};
use crate::native::NativeString;
use crate::policy::CachePolicy;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct TtlEntry {
    handle: NativeString,
    refs: usize,
    idle_since: Option<Instant>,
}

#[derive(Debug, Default)]
struct TtlState {
    entries: HashMap<String, TtlEntry>,
    /// Keys in the order they went idle, with the instant they did.
    idle: VecDeque<(String, Instant)>,
}

/// Counts acquisitions per key and frees entries idle longer than a TTL.
///
/// A release that drops an entry to zero references stamps it and queues
/// it. Every acquire and release first sweeps the front of the queue,
/// freeing idle entries whose stamp is older than the TTL, in the order
/// they went idle. A queued key that was acquired again in the meantime is
/// skipped. A zero TTL disables eviction and nothing is queued.
///
/// Every call mutates the queue, so the state sits behind one mutex.
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<TtlState>,
    stats: CacheStats,
}

impl TtlCache {
    /// Creates an empty cache reading the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates an empty cache reading `clock`.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            state: Mutex::new(TtlState::default()),
            stats: CacheStats::new(),
        }
    }

    /// Returns the configured TTL.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of keys waiting in the idle queue, stale ones included.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.lock().idle.len()
    }

    fn remove_expired(&self, state: &mut TtlState, now: Instant) {
        if self.ttl.is_zero() {
            return;
        }
        let mut evicted = 0;
        while let Some((key, stamp)) = state.idle.front() {
            let current = state
                .entries
                .get(key)
                .is_some_and(|entry| entry.refs == 0 && entry.idle_since == Some(*stamp));
            if current {
                if now.saturating_duration_since(*stamp) <= self.ttl {
                    break;
                }
                state.entries.remove(key);
                evicted += 1;
                debug!(key = key.as_str(), "evicted idle cache entry");
            }
            state.idle.pop_front();
        }
        if evicted > 0 {
            self.stats.record_evictions(evicted);
        }
    }
}

impl NativeStringCache for TtlCache {
    fn acquire(&self, key: &str) -> NativeString {
        let now = self.clock.now();
        let mut state = self.state.lock();
        // Sweep first, so an expired entry is replaced rather than revived.
        self.remove_expired(&mut state, now);

        if let Some(entry) = state.entries.get_mut(key) {
            entry.refs += 1;
            entry.idle_since = None;
            self.stats.record_hit();
            return entry.handle.clone();
        }
        self.stats.record_miss();
        let handle = NativeString::new(key);
        state.entries.insert(
            key.to_owned(),
            TtlEntry {
                handle: handle.clone(),
                refs: 1,
                idle_since: None,
            },
        );
        handle
    }

    fn release(&self, key: &str) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            if entry.refs > 0 {
                entry.refs -= 1;
                if entry.refs == 0 && !self.ttl.is_zero() {
                    entry.idle_since = Some(now);
                    state.idle.push_back((key.to_owned(), now));
                }
            }
        }
        self.remove_expired(&mut state, now);
    }

    fn clear(&self) {
        let freed = {
            let mut state = self.state.lock();
            let freed = state.entries.len();
            state.entries.clear();
            state.idle.clear();
            freed
        };
        self.stats.record_clear();
        debug!(freed, "cleared ttl cache");
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn refcount(&self, key: &str) -> Option<usize> {
        self.state.lock().entries.get(key).map(|entry| entry.refs)
    }

    fn policy(&self) -> CachePolicy {
        CachePolicy::Ttl { ttl: self.ttl }
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::thread;

    fn manual(ttl_ms: u64) -> (Arc<ManualClock>, TtlCache) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(Duration::from_millis(ttl_ms), clock.clone());
        (clock, cache)
    }

    #[test]
    fn reacquire_within_ttl_keeps_handle() {
        let (clock, cache) = manual(10);
        let first = cache.acquire("k");
        cache.release("k");
        clock.advance(Duration::from_millis(5));
        let second = cache.acquire("k");
        assert!(NativeString::ptr_eq(&first, &second));
        assert_eq!(cache.refcount("k"), Some(1));
    }

    #[test]
    fn idle_past_ttl_allocates_fresh_handle() {
        let (clock, cache) = manual(10);
        let first = cache.acquire("k");
        cache.release("k");
        clock.advance(Duration::from_millis(15));
        let second = cache.acquire("k");
        assert!(!NativeString::ptr_eq(&first, &second));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn held_entries_never_expire() {
        let (clock, cache) = manual(10);
        let first = cache.acquire("k");
        clock.advance(Duration::from_secs(1));
        cache.acquire("other");
        assert!(NativeString::ptr_eq(&first, &cache.acquire("k")));
    }

    #[test]
    fn eviction_follows_idle_order() {
        let (clock, cache) = manual(10);
        cache.acquire("a");
        cache.acquire("b");
        cache.release("a");
        clock.advance(Duration::from_millis(6));
        cache.release("b");
        clock.advance(Duration::from_millis(6));

        cache.acquire("c");
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        clock.advance(Duration::from_millis(6));
        cache.release("c");
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn revived_entry_is_skipped_in_queue() {
        let (clock, cache) = manual(10);
        cache.acquire("a");
        cache.release("a");
        cache.acquire("a");
        clock.advance(Duration::from_millis(20));
        cache.release("other");
        assert_eq!(cache.refcount("a"), Some(1));
        assert_eq!(cache.queued(), 0);
    }

    #[test]
    fn zero_ttl_disables_eviction() {
        let (clock, cache) = manual(0);
        let first = cache.acquire("k");
        cache.release("k");
        clock.advance(Duration::from_secs(60));
        assert!(NativeString::ptr_eq(&first, &cache.acquire("k")));
    }

    #[test]
    fn zero_ttl_queue_stays_empty() {
        let (clock, cache) = manual(0);
        for _ in 0..10_000 {
            cache.acquire("k");
            cache.release("k");
            clock.advance(Duration::from_millis(1));
        }
        assert_eq!(cache.queued(), 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.refcount("k"), Some(0));
    }

    #[test]
    fn clear_resets_queue() {
        let (_clock, cache) = manual(10);
        cache.acquire("a");
        cache.release("a");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.queued(), 0);
    }

    #[test]
    fn real_clock_expiry() {
        let cache = TtlCache::new(Duration::from_millis(10));
        let first = cache.acquire("k");
        cache.release("k");
        thread::sleep(Duration::from_millis(40));
        let second = cache.acquire("k");
        assert!(!NativeString::ptr_eq(&first, &second));
    }

    #[test]
    fn concurrent_cycles_balance() {
        let cache = Arc::new(TtlCache::new(Duration::from_millis(1)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    let key = format!("key{}", t % 3);
                    for _ in 0..100 {
                        cache.acquire(&key);
                        cache.release(&key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for t in 0..3 {
            let key = format!("key{t}");
            assert!(matches!(cache.refcount(&key), None | Some(0)));
        }
    }
}
