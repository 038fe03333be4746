//! The cache trait and its scope guard.

use crate::native::NativeString;
use crate::policy::CachePolicy;
use crate::stats::CacheStatsSnapshot;
use std::ffi::CStr;
use std::fmt;
use std::ops::Deref;

/// A cache of native strings keyed by Rust strings.
///
/// Every [`acquire`](Self::acquire) of a key should be balanced by one
/// [`release`](Self::release); the policy decides what happens to an entry
/// once nobody holds it. Releasing a key that was never acquired, or more
/// often than it was acquired, is a no-op.
///
/// Implementations must be safe to share across threads. Concurrent
/// acquisitions of one key converge on a single entry.
///
/// # Implementors
///
/// - [`StaticCache`](crate::StaticCache) - Keeps every entry until cleared
/// - [`SizedCache`](crate::SizedCache) - Evicts idle entries over capacity
/// - [`TtlCache`](crate::TtlCache) - Evicts entries idle longer than a TTL
pub trait NativeStringCache: Send + Sync + fmt::Debug {
    /// Returns the native string for `key`, allocating it on a miss.
    fn acquire(&self, key: &str) -> NativeString;

    /// Gives back one acquisition of `key`.
    fn release(&self, key: &str);

    /// Frees every entry and resets the bookkeeping.
    fn clear(&self);

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Returns true when the cache holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Outstanding acquisitions of `key`, or `None` when it is not cached.
    fn refcount(&self, key: &str) -> Option<usize>;

    /// Returns true when `key` has a live entry.
    fn contains(&self, key: &str) -> bool {
        self.refcount(key).is_some()
    }

    /// Returns the policy this cache implements.
    fn policy(&self) -> CachePolicy;

    /// Returns a copy of the cache counters.
    fn stats(&self) -> CacheStatsSnapshot;
}

impl<'c> dyn NativeStringCache + 'c {
    /// Acquires `key` for the lifetime of the returned guard.
    pub fn guard<'a>(&'a self, key: &'a str) -> CacheGuard<'a> {
        CacheGuard::new(self, key)
    }
}

/// An acquisition that is released when dropped.
///
/// # Example
///
/// ```rust
/// use sophon_cache::{CacheGuard, NativeStringCache, SizedCache};
///
/// let cache = SizedCache::new(8);
/// {
///     let name = CacheGuard::new(&cache, "field");
///     assert_eq!(name.to_bytes(), b"field");
///     assert_eq!(cache.refcount("field"), Some(1));
/// }
/// assert_eq!(cache.refcount("field"), Some(0));
/// ```
pub struct CacheGuard<'a> {
    cache: &'a dyn NativeStringCache,
    key: &'a str,
    handle: NativeString,
}

impl<'a> CacheGuard<'a> {
    /// Acquires `key` from `cache`.
    pub fn new(cache: &'a dyn NativeStringCache, key: &'a str) -> Self {
        let handle = cache.acquire(key);
        Self { cache, key, handle }
    }

    /// The key this guard holds.
    #[must_use]
    pub fn key(&self) -> &str {
        self.key
    }

    /// The cached native string.
    #[must_use]
    pub fn handle(&self) -> &NativeString {
        &self.handle
    }
}

impl Deref for CacheGuard<'_> {
    type Target = CStr;

    fn deref(&self) -> &CStr {
        &self.handle
    }
}

impl fmt::Debug for CacheGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheGuard")
            .field("key", &self.key)
            .field("handle", &self.handle)
            .finish()
    }
}

impl Drop for CacheGuard<'_> {
    fn drop(&mut self) {
        self.cache.release(self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SizedCache, StaticCache};
    use std::sync::Arc;

    #[test]
    fn guard_releases_on_drop() {
        let cache: Arc<dyn NativeStringCache> = Arc::new(SizedCache::new(0));
        {
            let a = cache.guard("a");
            let b = cache.guard("a");
            assert!(NativeString::ptr_eq(a.handle(), b.handle()));
            assert_eq!(cache.refcount("a"), Some(2));
            assert_eq!(a.key(), "a");
        }
        assert_eq!(cache.refcount("a"), Some(0));
    }

    #[test]
    fn guard_derefs_to_c_str() {
        let cache = StaticCache::new();
        let guard = CacheGuard::new(&cache, "name");
        assert_eq!(&*guard, c"name");
    }
}
