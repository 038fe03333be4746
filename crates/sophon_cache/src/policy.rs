//! Eviction policy selection.

use crate::cache::NativeStringCache;
use crate::{SizedCache, StaticCache, TtlCache};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which cache to build for an environment.
///
/// The default is [`CachePolicy::Static`]: schema field names recur for the
/// life of a process and are few.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Entries live until the cache is cleared.
    #[default]
    Static,
    /// Idle entries are evicted while the cache holds `capacity` or more.
    /// A capacity of zero never evicts.
    Sized {
        /// Entry count at which idle entries are evicted.
        capacity: usize,
    },
    /// Idle entries are evicted once idle longer than `ttl`. A zero TTL
    /// never evicts.
    Ttl {
        /// Idle time after which an entry is evicted.
        ttl: Duration,
    },
}

impl CachePolicy {
    /// Builds an empty cache implementing this policy.
    #[must_use]
    pub fn build(self) -> Arc<dyn NativeStringCache> {
        match self {
            Self::Static => Arc::new(StaticCache::new()),
            Self::Sized { capacity } => Arc::new(SizedCache::new(capacity)),
            Self::Ttl { ttl } => Arc::new(TtlCache::new(ttl)),
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => f.write_str("static"),
            Self::Sized { capacity } => write!(f, "sized({capacity})"),
            Self::Ttl { ttl } => write!(f, "ttl({ttl:?})"),
        }
    }
}
