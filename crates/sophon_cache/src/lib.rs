//! # Sophon Cache
//!
//! Caches of native strings for crossing the engine boundary.
//!
//! Every typed row access names its field with a NUL-terminated string.
//! Converting the same field names on every call is wasted work, so the
//! client layer acquires them from a [`NativeStringCache`] and releases them
//! when the call returns.
//!
//! ## Policies
//!
//! - [`StaticCache`] - Entries live until cleared
//! - [`SizedCache`] - Idle entries are evicted at or over capacity
//! - [`TtlCache`] - Entries idle longer than a TTL are evicted
//!
//! [`CachePolicy`] selects one at runtime.
//!
//! ## Example
//!
//! ```rust
//! use sophon_cache::{CachePolicy, NativeString};
//!
//! let cache = CachePolicy::Sized { capacity: 16 }.build();
//! let a = cache.acquire("name");
//! cache.release("name");
//! let b = cache.acquire("name");
//! assert!(NativeString::ptr_eq(&a, &b));
//! {
//!     let guard = cache.guard("name");
//!     assert_eq!(guard.to_bytes(), b"name");
//! }
//! cache.release("name");
//! assert_eq!(cache.refcount("name"), Some(0));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod clock;
mod fixed;
mod native;
mod policy;
mod sized;
mod stats;
mod ttl;

pub use cache::{CacheGuard, NativeStringCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fixed::StaticCache;
pub use native::NativeString;
pub use policy::CachePolicy;
pub use sized::SizedCache;
pub use stats::{CacheStats, CacheStatsSnapshot};
pub use ttl::TtlCache;
