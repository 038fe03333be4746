//! Native string cache benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sophon_bench::{field_names, random_picks};
use sophon_cache::CachePolicy;
use std::thread;
use std::time::Duration;

fn policies() -> [CachePolicy; 4] {
    [
        CachePolicy::Static,
        CachePolicy::Sized { capacity: 4 },
        CachePolicy::Sized { capacity: 64 },
        CachePolicy::Ttl {
            ttl: Duration::from_millis(10),
        },
    ]
}

/// Benchmark balanced acquire/release on a warm key.
fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release");
    group.throughput(Throughput::Elements(1));

    for policy in policies() {
        group.bench_with_input(BenchmarkId::from_parameter(policy), &policy, |b, policy| {
            let cache = policy.build();
            cache.acquire("key");
            b.iter(|| {
                let handle = cache.acquire(black_box("key"));
                cache.release("key");
                handle
            });
        });
    }
    group.finish();
}

/// Benchmark a random walk over a schema-sized key space.
fn bench_mixed_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_keys");
    let names = field_names(16);
    let picks = random_picks(&names, 1024);
    group.throughput(Throughput::Elements(picks.len() as u64));

    for policy in policies() {
        group.bench_with_input(BenchmarkId::from_parameter(policy), &policy, |b, policy| {
            let cache = policy.build();
            b.iter(|| {
                for key in &picks {
                    black_box(cache.acquire(key));
                    cache.release(key);
                }
            });
        });
    }
    group.finish();
}

/// Benchmark contended access from several threads.
fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    let names = field_names(8);

    for threads in [2usize, 4, 8] {
        group.throughput(Throughput::Elements((threads * 256) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            let cache = CachePolicy::Sized { capacity: 4 }.build();
            b.iter(|| {
                thread::scope(|scope| {
                    for t in 0..threads {
                        let (cache, names) = (&cache, &names);
                        scope.spawn(move || {
                            for i in 0..256 {
                                let key = &names[(i + t) % names.len()];
                                black_box(cache.acquire(key));
                                cache.release(key);
                            }
                        });
                    }
                });
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_acquire_release,
    bench_mixed_keys,
    bench_contended
);
criterion_main!(benches);
