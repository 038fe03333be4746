//! State shared by every object of one environment.

use crate::error::{CoreError, CoreResult};
use sophon_cache::{CacheGuard, NativeStringCache};
use sophon_engine::{Engine, ObjectHandle};
use std::ffi::CStr;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The reserved diagnostic key, as a native string.
pub(crate) const DIAGNOSTIC: &CStr = c"sophon.error";

/// The engine, the environment handle and the field-name cache.
///
/// Databases, rows, cursors and transactions keep an `Arc` of this so they
/// can reach the engine and know whether their environment is closed.
pub(crate) struct Native {
    pub(crate) engine: Arc<dyn Engine>,
    pub(crate) env: ObjectHandle,
    pub(crate) cache: Arc<dyn NativeStringCache>,
    closed: AtomicBool,
}

impl Native {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        env: ObjectHandle,
        cache: Arc<dyn NativeStringCache>,
    ) -> Self {
        Self {
            engine,
            env,
            cache,
            closed: AtomicBool::new(false),
        }
    }

    /// Borrows the native form of a field or setting name.
    pub(crate) fn name<'a>(&'a self, key: &'a str) -> CacheGuard<'a> {
        self.cache.guard(key)
    }

    /// The engine diagnostic left by the last primitive, if any.
    pub(crate) fn last_error(&self) -> Option<String> {
        self.engine
            .get_string(self.env, DIAGNOSTIC)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Wraps the current diagnostic into an error for `operation`.
    pub(crate) fn engine_error(&self, operation: &'static str) -> CoreError {
        let message = self
            .last_error()
            .unwrap_or_else(|| "engine reported no diagnostic".to_owned());
        CoreError::engine(operation, message)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the environment closed. Returns false if it already was.
    pub(crate) fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::EnvironmentClosed)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native")
            .field("env", &self.env)
            .field("cache", &self.cache)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_key_matches_engine() {
        assert_eq!(
            DIAGNOSTIC.to_bytes(),
            sophon_engine::DIAGNOSTIC_KEY.as_bytes()
        );
    }
}
