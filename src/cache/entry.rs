//! Cache Entry Module
//!
//! Defines the structure for individual cache entries and their lifetimes.

use std::time::Duration;

use crate::cache::clock::{millis_of, Timestamp};

// == TTL ==
/// Requested lifetime for a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the namespace default, or the store default.
    #[default]
    Default,
    /// Expire after the given duration. A zero duration means `Default`.
    After(Duration),
    /// Never expire.
    Never,
}

impl Ttl {
    /// Shorthand for `Ttl::After` in milliseconds.
    pub fn millis(ms: u64) -> Self {
        Ttl::After(Duration::from_millis(ms))
    }

    /// Resolves to a concrete lifetime; `None` means the entry never expires.
    pub fn resolve(self, fallback: Duration) -> Option<Duration> {
        match self {
            Ttl::Default => Some(fallback),
            Ttl::After(ttl) if ttl.is_zero() => Some(fallback),
            Ttl::After(ttl) => Some(ttl),
            Ttl::Never => None,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Ttl::Default, Ttl::After)
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Creation timestamp (clock milliseconds)
    pub created_at: Timestamp,
    /// Expiration timestamp (clock milliseconds), None = never expires
    pub expires_at: Option<Timestamp>,
    /// Estimated bytes charged to the cache for this entry
    pub(crate) footprint: usize,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry stamped at `now` living for `lifetime`.
    pub fn new(value: V, now: Timestamp, lifetime: Option<Duration>) -> Self {
        let expires_at = lifetime.map(|ttl| now.saturating_add(millis_of(ttl)));

        Self {
            value,
            created_at: now,
            expires_at,
            footprint: 0,
        }
    }

    // == Is Expired ==
    /// An entry is expired once `now` reaches its expiration time.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Milliseconds since the entry was stored.
    pub fn age_ms(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// Remaining lifetime in milliseconds, `None` if the entry never expires.
    pub fn ttl_remaining_ms(&self, now: Timestamp) -> Option<u64> {
        self.expires_at.map(|expires| expires.saturating_sub(now))
    }

    pub fn footprint(&self) -> usize {
        self.footprint
    }
}
