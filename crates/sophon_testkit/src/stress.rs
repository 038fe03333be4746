//! Stress helpers.
//!
//! These drive caches and databases from several threads at once and
//! report what happened.

use rand::seq::SliceRandom;
use sophon_cache::NativeStringCache;
use sophon_core::{DataStore, Database};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Number of distinct keys.
    pub key_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 100,
            threads: 8,
            key_count: 16,
        }
    }
}

/// Hammers a cache with balanced acquire/release cycles.
///
/// Every thread walks the key space in its own random order. An operation
/// fails when the handle returned for a key does not spell that key. Once
/// the run is over no key has outstanding acquisitions.
pub fn stress_cache(cache: &dyn NativeStringCache, config: &StressConfig) -> StressTestResult {
    let keys: Vec<String> = (0..config.key_count).map(|i| format!("field_{i}")).collect();
    if keys.is_empty() {
        return StressTestResult::new(0, 0, Duration::ZERO);
    }
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                let mut order = keys.clone();
                order.shuffle(&mut rand::thread_rng());
                for i in 0..config.operations {
                    let key = &order[i % order.len()];
                    let handle = cache.acquire(key);
                    if handle.to_bytes() == key.as_bytes() {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    cache.release(key);
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}

/// Writes disjoint key ranges from several threads into a database with
/// the [`integer_schema`](crate::fixtures::integer_schema) layout.
///
/// Thread `t` writes keys `t * operations .. (t + 1) * operations`.
pub fn stress_concurrent_writes(db: &Database, config: &StressConfig) -> StressTestResult {
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed) = (&successful, &failed);
            scope.spawn(move || {
                let base = (t * config.operations) as u64;
                for key in base..base + config.operations as u64 {
                    let written = db.document().and_then(|mut row| {
                        row.set_uint("key", key)?;
                        row.set_string("value", format!("v{key}"))?;
                        db.set(row)
                    });
                    match written {
                        Ok(()) => successful.fetch_add(1, Ordering::Relaxed),
                        Err(_) => failed.fetch_add(1, Ordering::Relaxed),
                    };
                }
            });
        }
    });

    StressTestResult::new(
        successful.into_inner(),
        failed.into_inner(),
        start.elapsed(),
    )
}
