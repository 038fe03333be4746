//! Property-based test generators using proptest.
//!
//! Provides strategies for generating keys, ranges, orders and cache
//! configurations that respect the invariants the client layer expects.

use proptest::prelude::*;
use sophon_cache::CachePolicy;
use sophon_core::{Order, ScanTermination};
use std::time::Duration;

/// Strategy for valid field and database names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for a set of distinct keys below `max`.
pub fn key_set_strategy(max: u64, size: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(0..max, 0..=size).prop_map(|keys| keys.into_iter().collect())
}

/// Strategy for an ordered `(from, to)` pair below `max`.
pub fn range_strategy(max: u64) -> impl Strategy<Value = (u64, u64)> {
    (0..max, 0..max).prop_map(|(a, b)| (a.min(b), a.max(b)))
}

/// Strategy for every scan order.
pub fn order_strategy() -> impl Strategy<Value = Order> {
    prop_oneof![
        Just(Order::Gte),
        Just(Order::Gt),
        Just(Order::Lte),
        Just(Order::Lt),
    ]
}

/// Strategy for both termination policies.
pub fn termination_strategy() -> impl Strategy<Value = ScanTermination> {
    prop_oneof![Just(ScanTermination::Early), Just(ScanTermination::Exhaustive)]
}

/// Strategy for short lowercase base-36 prefixes, including the empty one.
pub fn prefix_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-z]{0,2}").expect("Invalid regex")
}

/// Strategy for every cache policy with small parameters.
pub fn cache_policy_strategy() -> impl Strategy<Value = CachePolicy> {
    prop_oneof![
        Just(CachePolicy::Static),
        (0usize..8).prop_map(|capacity| CachePolicy::Sized { capacity }),
        (0u64..50).prop_map(|ms| CachePolicy::Ttl {
            ttl: Duration::from_millis(ms)
        }),
    ]
}

/// Strategy for a sequence of cache operations over a few keys.
///
/// `true` acquires, `false` releases.
pub fn cache_ops_strategy() -> impl Strategy<Value = Vec<(bool, String)>> {
    prop::collection::vec(
        (
            any::<bool>(),
            prop::sample::select(vec!["key", "value", "order", "prefix", "id"])
                .prop_map(str::to_owned),
        ),
        0..64,
    )
}

/// Reference model of a range scan over `keys`.
///
/// Bounds are inclusive; an exclusive order drops only the bound the scan
/// starts from.
pub fn expected_range(keys: &[u64], from: u64, to: u64, order: Order) -> Vec<u64> {
    let mut out: Vec<u64> = keys
        .iter()
        .copied()
        .filter(|k| (from..=to).contains(k))
        .filter(|k| match order {
            Order::Gt => *k != from,
            Order::Lt => *k != to,
            Order::Gte | Order::Lte => true,
        })
        .collect();
    out.sort_unstable();
    if order.is_descending() {
        out.reverse();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_handles_exclusive_bounds() {
        let keys: Vec<u64> = (0..10).collect();
        assert_eq!(expected_range(&keys, 2, 4, Order::Gte), [2, 3, 4]);
        assert_eq!(expected_range(&keys, 2, 4, Order::Gt), [3, 4]);
        assert_eq!(expected_range(&keys, 2, 4, Order::Lte), [4, 3, 2]);
        assert_eq!(expected_range(&keys, 2, 4, Order::Lt), [3, 2]);
    }

    proptest! {
        #[test]
        fn ranges_are_ordered((from, to) in range_strategy(100)) {
            prop_assert!(from <= to);
        }

        #[test]
        fn key_sets_are_sorted_and_distinct(keys in key_set_strategy(50, 20)) {
            prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
