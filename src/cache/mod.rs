//! Cache Module
//!
//! Process-local TTL cache over opaque values: deterministic keys, lazy
//! expiration, bulk invalidation, cycle-safe memory accounting and an LRU
//! capacity bound.

mod clock;
mod entry;
mod estimate;
mod invalidation;
mod key;
mod lru;
mod snapshot;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{millis_of, Clock, ManualClock, SystemClock, Timestamp};
pub use entry::{CacheEntry, Ttl};
pub use estimate::{EstimateError, MemoryEstimator, ENTRY_OVERHEAD_BYTES};
pub use key::{namespace_of, CacheKey, KeyBuilder, KEY_SEPARATOR};
pub use lru::LruTracker;
pub use snapshot::JsonSnapshot;
pub use stats::{StatsCollector, StatsSnapshot};
pub use store::{shared, CacheStore, MaintenanceReport, SharedCache};
