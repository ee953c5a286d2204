//! Invalidation Module
//!
//! Bulk removal of keys by namespace, by substring, or by exact key.
//!
//! Substring matching runs over the whole key, not just the identifier
//! segment, so one call drops an entity from every namespace. A fragment
//! that happens to occur inside unrelated keys removes those too; callers
//! should invalidate by identifiers unique enough (UUIDs) to avoid that.

use tracing::{info, warn};

use crate::cache::clock::Clock;
use crate::cache::key::KEY_SEPARATOR;
use crate::cache::CacheStore;

impl<V, C: Clock> CacheStore<V, C> {
    // == Invalidate Namespace ==
    /// Removes every key in `namespace`, returning how many were removed.
    pub fn invalidate_namespace(&mut self, namespace: &str) -> usize {
        if namespace.is_empty() {
            warn!("Ignoring namespace invalidation with empty namespace");
            return 0;
        }

        let prefix = format!("{namespace}{KEY_SEPARATOR}");
        let removed = self.remove_where(|key| key.starts_with(&prefix));
        info!(namespace, keys_invalidated = removed, "Namespace cache invalidated");
        removed
    }

    // == Invalidate Matching ==
    /// Removes every key containing `fragment`, returning how many were removed.
    pub fn invalidate_matching(&mut self, fragment: &str) -> usize {
        if fragment.is_empty() {
            warn!("Ignoring invalidation with empty fragment");
            return 0;
        }

        let removed = self.remove_where(|key| key.contains(fragment));
        info!(fragment, keys_invalidated = removed, "Matching cache entries invalidated");
        removed
    }

    // == Invalidate Keys ==
    /// Removes the listed keys, returning how many existed.
    pub fn invalidate_keys<I, K>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        keys.into_iter()
            .filter(|key| self.delete(key.as_ref()))
            .count()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use crate::cache::{CacheStore, ManualClock, Ttl};
    use crate::config::CacheSettings;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn populated() -> CacheStore<Value, ManualClock> {
        let mut store =
            CacheStore::with_clock(CacheSettings::unbounded(Duration::from_secs(60)), ManualClock::new(0));
        for key in [
            "activities:list:childId=c-42&limit=20",
            "activities:list:limit=10",
            "progress:c-42",
            "achievements:c-42",
            "profile:c-7",
            "completions:c-42:a-1",
        ] {
            store.set(key, json!(key), Ttl::Default);
        }
        store
    }

    #[test]
    fn test_invalidate_namespace() {
        let mut store = populated();

        assert_eq!(store.invalidate_namespace("activities"), 2);
        assert_eq!(store.len(), 4);
        assert!(store.has("progress:c-42"));
        assert_eq!(store.stats().invalidations, 2);
    }

    #[test]
    fn test_invalidate_namespace_requires_full_segment() {
        let mut store = populated();

        assert_eq!(store.invalidate_namespace("activ"), 0);
        assert_eq!(store.invalidate_namespace("profil"), 0);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_invalidate_matching_spans_namespaces() {
        let mut store = populated();

        assert_eq!(store.invalidate_matching("c-42"), 4);
        assert!(!store.has("progress:c-42"));
        assert!(!store.has("activities:list:childId=c-42&limit=20"));
        assert!(store.has("profile:c-7"));
        assert!(store.has("activities:list:limit=10"));
    }

    #[test]
    fn test_invalidate_matching_over_invalidates_substrings() {
        let mut store = populated();

        // "c-4" is a prefix of "c-42", so every c-42 key goes too.
        assert_eq!(store.invalidate_matching("c-4"), 4);
    }

    #[test]
    fn test_invalidation_is_idempotent() {
        let mut store = populated();

        assert_eq!(store.invalidate_matching("c-42"), 4);
        assert_eq!(store.invalidate_matching("c-42"), 0);
        assert_eq!(store.invalidate_namespace("nothing"), 0);
        assert_eq!(store.stats().invalidations, 4);
    }

    #[test]
    fn test_empty_selectors_are_ignored() {
        let mut store = populated();

        assert_eq!(store.invalidate_matching(""), 0);
        assert_eq!(store.invalidate_namespace(""), 0);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_invalidate_keys() {
        let mut store = populated();

        let removed = store.invalidate_keys(["progress:c-42", "achievements:c-42", "missing"]);
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 4);
        assert_eq!(store.stats().invalidations, 2);
    }

    #[test]
    fn test_invalidation_releases_memory() {
        let mut store = populated();

        store.invalidate_matching(":");
        assert!(store.is_empty());
        assert_eq!(store.stats().memory_usage, 0);
    }
}
