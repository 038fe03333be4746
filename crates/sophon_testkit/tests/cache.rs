//! Field-name caches behind an environment.

use sophon_cache::{CachePolicy, ManualClock, NativeStringCache, SizedCache, TtlCache};
use sophon_testkit::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn env_with_cache(cache: Arc<dyn NativeStringCache>) -> (Environment, Database) {
    let engine = Arc::new(sophon_engine::MemoryEngine::new());
    let env = Environment::with_cache(engine, Config::default(), cache).unwrap();
    let db = env
        .new_database(DatabaseConfig::new("numbers").schema(integer_schema(FieldType::U32)))
        .unwrap();
    env.open().unwrap();
    (env, db)
}

#[test]
fn operations_leave_no_outstanding_references() {
    for policy in [
        CachePolicy::Static,
        CachePolicy::Sized { capacity: 2 },
        CachePolicy::Ttl {
            ttl: Duration::from_secs(60),
        },
    ] {
        let (env, db) = env_with_cache(policy.build());
        insert_uints(&db, 0..20);
        let mut cursor = db.cursor(CriteriaSet::new().range("key", 5u32, 9u32)).unwrap();
        assert_eq!(collect_uints(&mut cursor, "key").unwrap().len(), 5, "{policy}");

        let cache = env.cache();
        for key in ["key", "value", "order"] {
            assert_eq!(cache.refcount(key).unwrap_or(0), 0, "{policy}: {key}");
        }
        assert!(cache.stats().hits > 0, "{policy}");
    }
}

#[test]
fn sized_cache_stays_within_capacity() {
    let cache = Arc::new(SizedCache::new(1));
    let (_env, db) = env_with_cache(cache.clone());
    insert_uints(&db, 0..10);
    assert!(cache.len() <= 1);
    assert!(cache.stats().evictions > 0);
}

#[test]
fn ttl_cache_expires_field_names() {
    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(TtlCache::with_clock(Duration::from_millis(10), clock.clone()));
    let (_env, db) = env_with_cache(cache.clone());
    insert_uints(&db, 0..3);
    assert!(cache.contains("key"));
    let first = cache.acquire("key");
    cache.release("key");

    clock.advance(Duration::from_millis(5));
    let again = cache.acquire("key");
    assert!(sophon_cache::NativeString::ptr_eq(&first, &again));
    cache.release("key");

    clock.advance(Duration::from_millis(15));
    let fresh = cache.acquire("key");
    assert!(!sophon_cache::NativeString::ptr_eq(&first, &fresh));
    cache.release("key");

    insert_uints(&db, 3..6);
    assert_eq!(cache.refcount("key"), Some(0));
}

#[test]
fn closing_the_environment_clears_the_cache() {
    let (env, db) = env_with_cache(CachePolicy::Static.build());
    insert_uints(&db, 0..3);
    assert!(!env.cache().is_empty());
    env.close().unwrap();
    assert!(env.cache().is_empty());
    assert_eq!(env.cache().stats().clears, 1);
}

#[test]
fn cache_race() {
    init_tracing();
    let config = StressConfig {
        operations: 100,
        threads: 16,
        key_count: 8,
    };
    for policy in [
        CachePolicy::Static,
        CachePolicy::Sized { capacity: 1 },
        CachePolicy::Sized { capacity: 0 },
        CachePolicy::Ttl {
            ttl: Duration::from_micros(50),
        },
    ] {
        let cache = policy.build();
        let result = stress_cache(cache.as_ref(), &config);
        assert_eq!(result.failed_ops, 0, "{policy}");
        assert_eq!(result.successful_ops, 1600, "{policy}");
        for i in 0..config.key_count {
            assert_eq!(
                cache.refcount(&format!("field_{i}")).unwrap_or(0),
                0,
                "{policy}"
            );
        }
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 1600, "{policy}");
    }
}

#[test]
fn concurrent_writers_share_one_environment() {
    let env = TestEnv::with_config(Config::new().cache(CachePolicy::Sized { capacity: 1 }));
    let db = env.database("numbers", integer_schema(FieldType::U64));
    env.open();
    let config = StressConfig {
        operations: 100,
        threads: 8,
        key_count: 0,
    };
    let result = stress_concurrent_writes(&db, &config);
    assert_eq!(result.failed_ops, 0);

    let mut cursor = db.cursor(CriteriaSet::new()).unwrap();
    assert_eq!(
        collect_uints(&mut cursor, "key").unwrap(),
        (0..800).collect::<Vec<_>>()
    );
}
