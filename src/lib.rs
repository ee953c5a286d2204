//! Kids Cache - a process-local TTL cache for the kids activities data layer
//!
//! Deterministic namespaced keys, per-namespace lifetimes, bulk
//! invalidation, statistics with a cycle-safe memory estimate, and a
//! periodic maintenance sweeper. A small admin HTTP surface exposes stats
//! and invalidation for operators.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod kids;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, SharedCache, Ttl};
pub use config::{CacheSettings, Config};
pub use kids::{ChildData, KidsCache};
pub use tasks::{spawn_sweep_task, Sweeper};
