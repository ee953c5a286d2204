//! Cache Statistics Module
//!
//! Counts hits, misses, invalidations, evictions and expirations, and keeps
//! a running memory total that the store adjusts as entries come and go.

use serde::{Deserialize, Serialize};

// == Stats Collector ==
/// Running counters owned by a cache store.
#[derive(Debug, Clone, Default)]
pub struct StatsCollector {
    hits: u64,
    misses: u64,
    invalidations: u64,
    evictions: u64,
    expirations: u64,
    memory_usage: usize,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Adds entries removed by delete, clear or bulk invalidation.
    pub fn record_invalidations(&mut self, count: usize) {
        self.invalidations += count as u64;
    }

    /// Adds entries removed to respect the capacity bound.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    /// Adds entries removed because their TTL elapsed.
    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn add_memory(&mut self, bytes: usize) {
        self.memory_usage = self.memory_usage.saturating_add(bytes);
    }

    pub fn release_memory(&mut self, bytes: usize) {
        self.memory_usage = self.memory_usage.saturating_sub(bytes);
    }

    pub fn reset_memory(&mut self) {
        self.memory_usage = 0;
    }

    pub fn memory_usage(&self) -> usize {
        self.memory_usage
    }

    // == Hit Rate ==
    /// Hit percentage in `0..=100`, or 0 if no lookups happened yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }

    /// Freezes the counters together with the live entry count.
    pub fn snapshot(&self, size: usize) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits,
            misses: self.misses,
            invalidations: self.invalidations,
            evictions: self.evictions,
            expirations: self.expirations,
            size,
            memory_usage: self.memory_usage,
            hit_rate: self.hit_rate(),
        }
    }
}

// == Stats Snapshot ==
/// Point-in-time view of cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Live entry count
    pub size: usize,
    /// Estimated bytes held by all entries
    pub memory_usage: usize,
    /// Percentage of lookups that hit
    pub hit_rate: f64,
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let snapshot = StatsCollector::new().snapshot(0);
        assert_eq!(snapshot.hits, 0);
        assert_eq!(snapshot.misses, 0);
        assert_eq!(snapshot.invalidations, 0);
        assert_eq!(snapshot.memory_usage, 0);
        assert_eq!(snapshot.hit_rate, 0.0);
    }

    #[test]
    fn test_hit_rate_is_percentage() {
        let mut stats = StatsCollector::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 50.0);

        stats.record_hit();
        assert!((stats.hit_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_hit_rate_all_hits() {
        let mut stats = StatsCollector::new();
        stats.record_hit();
        stats.record_hit();
        assert_eq!(stats.hit_rate(), 100.0);
    }

    #[test]
    fn test_bulk_counters() {
        let mut stats = StatsCollector::new();
        stats.record_invalidations(3);
        stats.record_invalidations(0);
        stats.record_evictions(2);
        stats.record_expirations(4);

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.invalidations, 3);
        assert_eq!(snapshot.evictions, 2);
        assert_eq!(snapshot.expirations, 4);
        assert_eq!(snapshot.size, 7);
    }

    #[test]
    fn test_memory_never_underflows() {
        let mut stats = StatsCollector::new();
        stats.add_memory(100);
        stats.release_memory(40);
        assert_eq!(stats.memory_usage(), 60);

        stats.release_memory(1_000);
        assert_eq!(stats.memory_usage(), 0);

        stats.add_memory(5);
        stats.reset_memory();
        assert_eq!(stats.memory_usage(), 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut stats = StatsCollector::new();
        stats.record_hit();
        let json = serde_json::to_value(stats.snapshot(1)).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["hit_rate"], 100.0);
    }
}
