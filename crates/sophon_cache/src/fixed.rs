//! Cache that never evicts.

use crate::cache::NativeStringCache;
use crate::native::NativeString;
use crate::policy::CachePolicy;
use crate::stats::{CacheStats, CacheStatsSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Keeps every native string until [`clear`](NativeStringCache::clear).
///
/// Release is a no-op, so entries carry no reference count and
/// [`refcount`](NativeStringCache::refcount) reports zero for cached keys.
#[derive(Debug, Default)]
pub struct StaticCache {
    entries: RwLock<HashMap<String, NativeString>>,
    stats: CacheStats,
}

impl StaticCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NativeStringCache for StaticCache {
    fn acquire(&self, key: &str) -> NativeString {
        if let Some(handle) = self.entries.read().get(key) {
            self.stats.record_hit();
            return handle.clone();
        }

        let mut entries = self.entries.write();
        if let Some(handle) = entries.get(key) {
            self.stats.record_hit();
            return handle.clone();
        }
        self.stats.record_miss();
        let handle = NativeString::new(key);
        entries.insert(key.to_owned(), handle.clone());
        handle
    }

    fn release(&self, _key: &str) {}

    fn clear(&self) {
        let freed = {
            let mut entries = self.entries.write();
            let freed = entries.len();
            entries.clear();
            freed
        };
        self.stats.record_clear();
        debug!(freed, "cleared static cache");
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn refcount(&self, key: &str) -> Option<usize> {
        self.entries.read().get(key).map(|_| 0)
    }

    fn policy(&self) -> CachePolicy {
        CachePolicy::Static
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}
