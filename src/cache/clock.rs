//! Clock Module
//!
//! Single source of time for TTL comparisons. Production code uses a
//! monotonic [`SystemClock`]; tests drive a [`ManualClock`] by hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Milliseconds on a clock's own timeline.
pub type Timestamp = u64;

/// Whole milliseconds in `duration`, saturating at `Timestamp::MAX`.
pub fn millis_of(duration: Duration) -> Timestamp {
    Timestamp::try_from(duration.as_millis()).unwrap_or(Timestamp::MAX)
}

// == Clock Trait ==
/// Source of "now" for expiration checks.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds.
    fn now(&self) -> Timestamp;
}

// == System Clock ==
/// Monotonic clock measuring milliseconds since its creation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        millis_of(self.origin.elapsed())
    }
}

// == Manual Clock ==
/// Clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// hand another to the cache.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start` milliseconds.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Moves the clock forward by `by`, stopping at the end of time.
    pub fn advance(&self, by: Duration) {
        self.advance_ms(millis_of(by));
    }

    /// Moves the clock forward by `ms` milliseconds, stopping at the end of time.
    pub fn advance_ms(&self, ms: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(ms))
            });
    }

    /// Jumps to an absolute time.
    pub fn set(&self, to: Timestamp) {
        self.now.store(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), 1_000);

        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now(), 3_000);

        clock.advance_ms(5);
        assert_eq!(clock.now(), 3_005);
    }

    #[test]
    fn test_millis_of_saturates() {
        assert_eq!(millis_of(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis_of(Duration::from_secs(1 << 61)), Timestamp::MAX);
        assert_eq!(millis_of(Duration::MAX), Timestamp::MAX);
    }

    #[test]
    fn test_manual_clock_advance_saturates() {
        let clock = ManualClock::new(10);

        clock.advance(Duration::from_secs(1 << 61));
        assert_eq!(clock.now(), Timestamp::MAX);

        clock.advance_ms(1);
        assert_eq!(clock.now(), Timestamp::MAX);
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(0);
        let handle = clock.clone();

        handle.set(42);
        assert_eq!(clock.now(), 42);
    }
}
