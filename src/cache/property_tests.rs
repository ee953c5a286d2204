//! Property-Based Tests for Cache Module
//!
//! Uses proptest over a manual clock, so TTL properties need no sleeping.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{CacheStore, KeyBuilder, ManualClock, Ttl};
use crate::config::CacheSettings;

// == Test Configuration ==
const TEST_DEFAULT_TTL: Duration = Duration::from_secs(300);

fn test_store() -> (CacheStore<Value, ManualClock>, ManualClock) {
    let clock = ManualClock::new(0);
    let store = CacheStore::with_clock(CacheSettings::unbounded(TEST_DEFAULT_TTL), clock.clone());
    (store, clock)
}

// == Strategies ==
/// Generates valid cache keys (non-empty)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}:[a-zA-Z0-9_-]{1,24}"
}

/// Generates JSON payloads
fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,64}".prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        prop::collection::vec("[a-z]{1,8}", 0..8).prop_map(|items| json!(items)),
        ("[a-z]{1,8}", any::<u32>()).prop_map(|(name, n)| json!({ "name": name, "n": n })),
    ]
}

/// Generates a flat filter parameter set
fn params_strategy() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::hash_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..6)
        .prop_map(|params| params.into_iter().collect())
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: Value },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    let keys = prop::sample::select(vec!["a:1", "a:2", "b:1", "b:2", "c:3"]);
    prop_oneof![
        (keys.clone(), value_strategy()).prop_map(|(key, value)| CacheOp::Set {
            key: key.to_string(),
            value
        }),
        keys.clone().prop_map(|key| CacheOp::Get {
            key: key.to_string()
        }),
        keys.clone().prop_map(|key| CacheOp::Has {
            key: key.to_string()
        }),
        keys.prop_map(|key| CacheOp::Delete {
            key: key.to_string()
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing then reading before expiry returns the exact value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in value_strategy()) {
        let (mut store, _) = test_store();

        store.set(&key, value.clone(), Ttl::Default);
        prop_assert_eq!(store.get(&key), Some(value));
    }

    // Reversing parameter order never changes the key.
    #[test]
    fn prop_deterministic_keys(params in params_strategy()) {
        let forward = KeyBuilder::build("activities", "list", params.clone());
        let backward = KeyBuilder::build("activities", "list", params.into_iter().rev());
        prop_assert_eq!(forward, backward);
    }

    // Hits, misses and invalidations match a hand-kept tally.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (mut store, _) = test_store();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;
        let mut expected_invalidations = 0u64;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => store.set(&key, value, Ttl::Default),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Has { key } => {
                    store.has(&key);
                }
                CacheOp::Delete { key } => {
                    if store.delete(&key) {
                        expected_invalidations += 1;
                    }
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.invalidations, expected_invalidations);
        prop_assert_eq!(stats.size, store.len());
    }

    // Reading before the TTL elapses hits; at or after it misses.
    #[test]
    fn prop_ttl_boundary(
        key in valid_key_strategy(),
        value in value_strategy(),
        ttl_ms in 1u64..1_000_000,
        early in 0u64..1_000_000,
        late in 0u64..1_000_000,
    ) {
        let early = early % ttl_ms;

        let (mut store, clock) = test_store();
        store.set(&key, value.clone(), Ttl::millis(ttl_ms));
        clock.advance_ms(early);
        prop_assert_eq!(store.get(&key), Some(value));

        let (mut store, clock) = test_store();
        store.set(&key, json!(1), Ttl::millis(ttl_ms));
        clock.advance_ms(ttl_ms + late);
        prop_assert_eq!(store.get(&key), None);
        prop_assert!(!store.has(&key));
    }

    // Entries stored with no expiry survive any clock advance.
    #[test]
    fn prop_infinite_ttl(key in valid_key_strategy(), advance in any::<u64>()) {
        let (mut store, clock) = test_store();

        store.set(&key, json!("kept"), Ttl::Never);
        clock.set(advance);
        prop_assert_eq!(store.get(&key), Some(json!("kept")));
    }

    // Substring invalidation removes every matching key and nothing else.
    #[test]
    fn prop_invalidation_completeness(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..30),
        fragment in "[a-z0-9]{1,3}",
    ) {
        let (mut store, _) = test_store();
        for key in &keys {
            store.set(key, json!(key), Ttl::Default);
        }

        let matching: HashSet<&String> = keys.iter().filter(|key| key.contains(&fragment)).collect();
        let removed = store.invalidate_matching(&fragment);
        prop_assert_eq!(removed, matching.len());

        for key in &keys {
            prop_assert_eq!(store.has(key), !matching.contains(key));
        }
    }

    // The entry count never exceeds the configured bound.
    #[test]
    fn prop_capacity_enforcement(
        entries in prop::collection::vec((valid_key_strategy(), value_strategy()), 1..200)
    ) {
        let max_entries = 50;
        let settings = CacheSettings::unbounded(TEST_DEFAULT_TTL).with_max_entries(max_entries);
        let mut store: CacheStore<Value, _> = CacheStore::with_clock(settings, ManualClock::new(0));

        for (key, value) in entries {
            store.set(&key, value, Ttl::Default);
            prop_assert!(store.len() <= max_entries);
        }
    }

    // The running memory total always equals the sum over live entries.
    #[test]
    fn prop_memory_matches_live_entries(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let (mut store, _) = test_store();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => store.set(&key, value, Ttl::Default),
                CacheOp::Get { key } => {
                    store.get(&key);
                }
                CacheOp::Has { key } => {
                    store.has(&key);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let live: usize = store
            .keys()
            .iter()
            .filter_map(|key| store.peek_entry(key))
            .map(|entry| entry.footprint())
            .sum();
        prop_assert_eq!(store.stats().memory_usage, live);
    }
}
