//! Log output for tests.

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly `tracing` subscriber.
///
/// Filtering follows `RUST_LOG` and defaults to `warn`. Safe to call from
/// every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
