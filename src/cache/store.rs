//! Cache Store Module
//!
//! Main cache engine: a key to entry map with lazy TTL expiration, a running
//! memory estimate, and LRU eviction once a capacity bound is exceeded.
//!
//! Every operation is total. Invalid keys are logged and treated as misses
//! or no-ops so that a failing cache never breaks the caller's request path.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::namespace_of;
use crate::cache::{CacheEntry, LruTracker, MemoryEstimator, StatsCollector, StatsSnapshot, Ttl};
use crate::config::CacheSettings;

/// The process-wide cache handle passed to the data-access layer.
pub type SharedCache<V = Value, C = SystemClock> = Arc<RwLock<CacheStore<V, C>>>;

/// Wraps a store for sharing across tasks.
pub fn shared<V, C>(store: CacheStore<V, C>) -> SharedCache<V, C> {
    Arc::new(RwLock::new(store))
}

// == Maintenance Report ==
/// Outcome of one maintenance pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Entries before the pass
    pub before: usize,
    /// Entries after the pass
    pub after: usize,
    /// Expired entries removed
    pub cleaned: usize,
}

// == Cache Store ==
/// TTL cache over opaque values.
#[derive(Debug)]
pub struct CacheStore<V = Value, C = SystemClock> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Recency order for capacity eviction
    lru: LruTracker,
    /// Performance statistics
    stats: StatsCollector,
    settings: CacheSettings,
    clock: C,
}

impl<V> CacheStore<V, SystemClock> {
    // == Constructor ==
    /// Creates a store on the monotonic system clock.
    pub fn new(settings: CacheSettings) -> Self {
        Self::with_clock(settings, SystemClock::new())
    }
}

impl<V, C: Clock> CacheStore<V, C> {
    /// Creates a store reading time from `clock`.
    pub fn with_clock(settings: CacheSettings, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: StatsCollector::new(),
            settings,
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // == Has ==
    /// Reports whether a live entry exists.
    ///
    /// Expired entries found here are dropped, but hit and miss counters and
    /// recency are left alone.
    pub fn has(&mut self, key: &str) -> bool {
        if key.is_empty() {
            return false;
        }

        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return false,
        };

        if expired {
            self.remove_entry(key);
            self.stats.record_expirations(1);
            debug!(key, "Cache expired");
        }
        !expired
    }

    // == Delete ==
    /// Removes an entry, returning whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if key.is_empty() {
            warn!("Ignoring cache delete with empty key");
            return false;
        }

        let removed = self.remove_entry(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
            debug!(key, "Cache entry deleted");
        }
        removed
    }

    // == Clear ==
    /// Removes every entry, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.lru.clear();
        self.stats.reset_memory();
        self.stats.record_invalidations(removed);

        info!(entries_cleared = removed, "Cache cleared");
        removed
    }

    // == Stats ==
    /// Returns current statistics. `size` is the live entry count.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.entries.len())
    }

    /// Returns the raw entry under `key`, expired or not, without touching
    /// counters or recency.
    pub fn peek_entry(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Lists every stored key, including expired entries not yet swept.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Purge Expired ==
    /// Removes all expired entries, returning the number removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now();
        // Collect first so the table is only mutated after the scan.
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        self.stats.record_expirations(expired.len());

        if !expired.is_empty() {
            info!(cleaned = expired.len(), "Expired cache entries cleaned");
        }
        expired.len()
    }

    // == Maintenance ==
    /// Purges expired entries and logs the table size before and after.
    pub fn maintenance(&mut self) -> MaintenanceReport {
        let before = self.entries.len();
        let cleaned = self.purge_expired();
        let after = self.entries.len();
        let stats = self.stats();

        info!(
            before,
            after,
            cleaned,
            hits = stats.hits,
            misses = stats.misses,
            memory_usage = stats.memory_usage,
            hit_rate = stats.hit_rate,
            "Cache maintenance completed"
        );

        MaintenanceReport {
            before,
            after,
            cleaned,
        }
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unlinks an entry from the table, recency order and memory total.
    pub(crate) fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.lru.remove(key);
        self.stats.release_memory(entry.footprint);
        Some(entry)
    }

    /// Removes every key matching `predicate`, counting them as invalidations.
    pub(crate) fn remove_where(&mut self, predicate: impl Fn(&str) -> bool) -> usize {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        for key in &doomed {
            self.remove_entry(key);
        }
        self.stats.record_invalidations(doomed.len());
        doomed.len()
    }

    /// Drops expired entries, then evicts least recently used entries until
    /// both bounds hold.
    fn enforce_capacity(&mut self) {
        if !self.over_capacity() {
            return;
        }
        self.purge_expired();

        let mut evicted = 0;
        while self.over_capacity() {
            let Some(key) = self.lru.evict_oldest() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.stats.release_memory(entry.footprint);
                evicted += 1;
                warn!(key = %key, "Evicted cache entry to respect capacity");
            }
        }
        self.stats.record_evictions(evicted);
    }

    fn over_capacity(&self) -> bool {
        let too_many = self
            .settings
            .max_entries
            .is_some_and(|max| self.entries.len() > max);
        let too_big = self
            .settings
            .max_bytes
            .is_some_and(|max| self.stats.memory_usage() > max);
        too_many || too_big
    }
}

impl<V: Serialize, C: Clock> CacheStore<V, C> {
    // == Set ==
    /// Stores a value, fully replacing any previous entry under `key`.
    ///
    /// `Ttl::Default` and zero durations use the key's namespace TTL. Empty
    /// keys are ignored with a warning.
    pub fn set(&mut self, key: &str, value: V, ttl: impl Into<Ttl>) {
        if key.is_empty() {
            warn!("Invalid cache key provided");
            return;
        }

        let ttl = ttl.into();
        let lifetime = ttl.resolve(self.settings.ttl_for(namespace_of(key)));
        let now = self.clock.now();

        let value_bytes = MemoryEstimator::estimate(&value);
        let mut entry = CacheEntry::new(value, now, lifetime);
        entry.footprint = MemoryEstimator::entry_footprint(key, value_bytes);

        self.stats.add_memory(entry.footprint);
        debug!(key, ?lifetime, expires_at = ?entry.expires_at, "Cache entry set");

        if let Some(previous) = self.entries.insert(key.to_owned(), entry) {
            self.stats.release_memory(previous.footprint);
        }
        self.lru.touch(key);
        self.enforce_capacity();
    }
}

impl<V: Clone, C: Clock> CacheStore<V, C> {
    // == Get ==
    /// Returns a clone of the live value under `key`.
    ///
    /// Expired entries are removed on the spot and count as misses.
    pub fn get(&mut self, key: &str) -> Option<V> {
        if key.is_empty() {
            warn!("Cache lookup with empty key");
            self.stats.record_miss();
            return None;
        }

        let now = self.clock.now();
        let Some(entry) = self.entries.get(key) else {
            self.stats.record_miss();
            debug!(key, "Cache miss");
            return None;
        };

        if entry.is_expired(now) {
            let overdue = entry.expires_at.map(|expires| now - expires);
            self.remove_entry(key);
            self.stats.record_miss();
            self.stats.record_expirations(1);
            debug!(key, ?overdue, "Cache expired");
            return None;
        }

        let value = entry.value.clone();
        debug!(
            key,
            age_ms = entry.age_ms(now),
            ttl_remaining_ms = ?entry.ttl_remaining_ms(now),
            "Cache hit"
        );
        self.stats.record_hit();
        self.lru.touch(key);
        Some(value)
    }
}

impl<V: Clone + Serialize, C: Clock> CacheStore<V, C> {
    /// Returns the cached value or stores the one produced by `compute`.
    pub fn get_or_insert_with<F>(&mut self, key: &str, ttl: impl Into<Ttl>, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = compute();
        self.set(key, value.clone(), ttl);
        value
    }
}
