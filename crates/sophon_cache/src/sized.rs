//! Reference-counted cache bounded by entry count.

use crate::cache::NativeStringCache;
use crate::native::NativeString;
use crate::policy::CachePolicy;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, trace};

#[derive(Debug)]
struct SizedEntry {
    handle: NativeString,
    refs: AtomicUsize,
}

/// Counts acquisitions per key and evicts idle entries over capacity.
///
/// When a release drops an entry to zero references and the cache holds
/// `capacity` or more entries, that entry is freed. Entries still held are
/// never evicted, so the cache may grow past its capacity while they are
/// in use. A capacity of zero disables eviction.
///
/// Reference counts are atomics updated under the read lock; the write lock
/// is only taken to insert or remove entries.
///
/// # Example
///
/// ```rust
/// use sophon_cache::{NativeStringCache, SizedCache};
///
/// let cache = SizedCache::new(1);
/// cache.acquire("a");
/// cache.acquire("b");
/// cache.release("a");
/// assert!(!cache.contains("a"));
/// assert!(cache.contains("b"));
/// ```
#[derive(Debug)]
pub struct SizedCache {
    capacity: usize,
    entries: RwLock<HashMap<String, SizedEntry>>,
    stats: CacheStats,
}

impl SizedCache {
    /// Creates an empty cache with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(HashMap::new()),
            stats: CacheStats::new(),
        }
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn over_capacity(&self, len: usize) -> bool {
        self.capacity > 0 && len >= self.capacity
    }

    fn evict_if_idle(&self, key: &str) {
        let mut entries = self.entries.write();
        // Someone may have acquired the key between the two locks.
        let idle = entries
            .get(key)
            .is_some_and(|entry| entry.refs.load(Ordering::Acquire) == 0);
        if idle && self.over_capacity(entries.len()) {
            entries.remove(key);
            self.stats.record_evictions(1);
            debug!(key, capacity = self.capacity, "evicted sized cache entry");
        }
    }
}

impl NativeStringCache for SizedCache {
    fn acquire(&self, key: &str) -> NativeString {
        if let Some(entry) = self.entries.read().get(key) {
            entry.refs.fetch_add(1, Ordering::AcqRel);
            self.stats.record_hit();
            return entry.handle.clone();
        }

        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(key) {
            entry.refs.fetch_add(1, Ordering::AcqRel);
            self.stats.record_hit();
            return entry.handle.clone();
        }
        self.stats.record_miss();
        let handle = NativeString::new(key);
        entries.insert(
            key.to_owned(),
            SizedEntry {
                handle: handle.clone(),
                refs: AtomicUsize::new(1),
            },
        );
        handle
    }

    fn release(&self, key: &str) {
        let now_idle = {
            let entries = self.entries.read();
            let Some(entry) = entries.get(key) else {
                trace!(key, "release of uncached key");
                return;
            };
            let released = entry
                .refs
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| refs.checked_sub(1));
            released == Ok(1) && self.over_capacity(entries.len())
        };
        if now_idle {
            self.evict_if_idle(key);
        }
    }

    fn clear(&self) {
        let freed = {
            let mut entries = self.entries.write();
            let freed = entries.len();
            entries.clear();
            freed
        };
        self.stats.record_clear();
        debug!(freed, "cleared sized cache");
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn refcount(&self, key: &str) -> Option<usize> {
        self.entries
            .read()
            .get(key)
            .map(|entry| entry.refs.load(Ordering::Acquire))
    }

    fn policy(&self) -> CachePolicy {
        CachePolicy::Sized {
            capacity: self.capacity,
        }
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn balanced_release_keeps_identity() {
        let cache = SizedCache::new(0);
        let a = cache.acquire("k");
        cache.release("k");
        let b = cache.acquire("k");
        assert!(NativeString::ptr_eq(&a, &b));
        assert_eq!(cache.refcount("k"), Some(1));
    }

    #[test]
    fn capacity_one_evicts_idle_entries() {
        let cache = SizedCache::new(1);
        cache.acquire("a");
        cache.acquire("b");
        assert_eq!(cache.len(), 2);

        cache.release("a");
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        cache.release("b");
        assert!(cache.is_empty());
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn held_entries_survive_over_capacity() {
        let cache = SizedCache::new(1);
        cache.acquire("a");
        cache.acquire("a");
        cache.acquire("b");
        cache.release("a");
        assert_eq!(cache.refcount("a"), Some(1));
    }

    #[test]
    fn under_capacity_keeps_idle_entries() {
        let cache = SizedCache::new(4);
        let first = cache.acquire("a");
        cache.release("a");
        assert_eq!(cache.refcount("a"), Some(0));
        let second = cache.acquire("a");
        assert!(NativeString::ptr_eq(&first, &second));
    }

    #[test]
    fn over_release_is_noop() {
        let cache = SizedCache::new(0);
        cache.acquire("a");
        cache.release("a");
        cache.release("a");
        cache.release("never");
        assert_eq!(cache.refcount("a"), Some(0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_acquire_converges() {
        let cache = Arc::new(SizedCache::new(2));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = if i % 2 == 0 { "even" } else { "odd" };
                        let handle = cache.acquire(key);
                        assert_eq!(handle.to_bytes(), key.as_bytes());
                        cache.release(key);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for key in ["even", "odd"] {
            assert!(matches!(cache.refcount(key), None | Some(0)));
        }
        assert!(cache.len() <= 2);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use std::collections::HashMap;

        proptest! {
            #[test]
            fn refcounts_follow_model(ops in prop::collection::vec((any::<bool>(), 0u8..4), 0..64)) {
                let cache = SizedCache::new(0);
                let mut model: HashMap<String, usize> = HashMap::new();
                for (acquire, key) in ops {
                    let key = format!("k{key}");
                    if acquire {
                        cache.acquire(&key);
                        *model.entry(key).or_default() += 1;
                    } else {
                        cache.release(&key);
                        if let Some(refs) = model.get_mut(&key) {
                            *refs = refs.saturating_sub(1);
                        }
                    }
                }
                for (key, refs) in &model {
                    prop_assert_eq!(cache.refcount(key), Some(*refs));
                }
                prop_assert_eq!(cache.len(), model.len());
            }
        }
    }
}
