//! Environment configuration.

use crate::types::ScanTermination;
use sophon_cache::CachePolicy;
use std::path::PathBuf;

/// Configuration for creating an environment.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Storage directory handed to the engine, if any.
    pub path: Option<PathBuf>,

    /// Policy of the field-name cache.
    pub cache: CachePolicy,

    /// Default termination policy for cursors.
    pub scan_termination: ScanTermination,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage directory.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the field-name cache policy.
    #[must_use]
    pub const fn cache(mut self, policy: CachePolicy) -> Self {
        self.cache = policy;
        self
    }

    /// Sets the default cursor termination policy.
    #[must_use]
    pub const fn scan_termination(mut self, termination: ScanTermination) -> Self {
        self.scan_termination = termination;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.cache, CachePolicy::Static);
        assert_eq!(config.scan_termination, ScanTermination::Early);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .path("/tmp/sophon")
            .cache(CachePolicy::Sized { capacity: 32 })
            .scan_termination(ScanTermination::Exhaustive);

        assert_eq!(config.path, Some(PathBuf::from("/tmp/sophon")));
        assert_eq!(config.cache, CachePolicy::Sized { capacity: 32 });
        assert_eq!(config.scan_termination, ScanTermination::Exhaustive);
    }
}
