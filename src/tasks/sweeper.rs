//! Maintenance Sweeper
//!
//! Background task that periodically removes expired cache entries, so
//! entries nobody reads again do not hold memory until the next lookup.
//!
//! Each sweep runs under a single write guard: other tasks see the table
//! either before or after a sweep, never halfway through one.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::{millis_of, Clock, MaintenanceReport, SharedCache, SystemClock};

/// Shortest interval a sweep loop will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Spawns a task that runs `maintenance` on `cache` every `interval` until
/// `shutdown` flips to true or its sender is dropped.
///
/// # Example
/// ```ignore
/// let (stop, stopped) = tokio::sync::watch::channel(false);
/// let handle = spawn_sweep_task(cache.clone(), Duration::from_secs(300), stopped);
/// // Later, during shutdown:
/// stop.send(true).ok();
/// handle.await.ok();
/// ```
pub fn spawn_sweep_task<V, C>(
    cache: SharedCache<V, C>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
    C: Clock + 'static,
{
    let interval = interval.max(MIN_INTERVAL);

    tokio::spawn(async move {
        info!(interval_ms = millis_of(interval), "Starting cache maintenance sweeper");

        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = cache.write().await.maintenance();
                    if report.cleaned == 0 {
                        debug!("Maintenance sweep found no expired entries");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Cache maintenance sweeper stopped");
    })
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

// == Sweeper ==
/// Owns the lifecycle of the maintenance task for one cache.
pub struct Sweeper<V, C = SystemClock> {
    cache: SharedCache<V, C>,
    interval: Duration,
    running: Option<Running>,
}

impl<V, C> Sweeper<V, C>
where
    V: Send + Sync + 'static,
    C: Clock + 'static,
{
    pub fn new(cache: SharedCache<V, C>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            running: None,
        }
    }

    /// Starts the periodic sweep. Must be called inside a tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            debug!("Sweeper already running");
            return;
        }

        let (shutdown, stopped) = watch::channel(false);
        let handle = spawn_sweep_task(self.cache.clone(), self.interval, stopped);
        self.running = Some(Running { shutdown, handle });
    }

    /// Stops the sweep and waits for an in-flight pass to finish.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(true);
        if let Err(err) = running.handle.await {
            if !err.is_cancelled() {
                warn!(error = %err, "Sweeper task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Runs one maintenance pass immediately.
    pub async fn sweep_now(&self) -> MaintenanceReport {
        self.cache.write().await.maintenance()
    }
}

impl<V, C> Drop for Sweeper<V, C> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{shared, CacheStore, ManualClock, Ttl};
    use crate::config::CacheSettings;
    use serde_json::{json, Value};

    fn shared_store() -> (SharedCache<Value, ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let store = CacheStore::with_clock(
            CacheSettings::unbounded(Duration::from_secs(300)),
            clock.clone(),
        );
        (shared(store), clock)
    }

    #[tokio::test]
    async fn test_sweeper_removes_expired_entries() {
        let (cache, clock) = shared_store();
        cache
            .write()
            .await
            .set("progress:c1", json!(1), Ttl::millis(10));
        clock.advance_ms(20);

        let mut sweeper = Sweeper::new(cache.clone(), Duration::from_millis(20));
        sweeper.start();
        tokio::time::sleep(Duration::from_millis(150)).await;
        sweeper.stop().await;

        let store = cache.read().await;
        assert!(store.is_empty(), "Expired entry should have been swept");
        assert_eq!(store.stats().expirations, 1);
        assert_eq!(store.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_sweeper_preserves_live_entries() {
        let (cache, _) = shared_store();
        cache
            .write()
            .await
            .set("profile:c1", json!("v"), Ttl::Never);

        let mut sweeper = Sweeper::new(cache.clone(), Duration::from_millis(20));
        sweeper.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.stop().await;

        assert_eq!(cache.write().await.get("profile:c1"), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_sweeper_start_stop_lifecycle() {
        let (cache, _) = shared_store();
        let mut sweeper = Sweeper::new(cache, Duration::from_secs(3600));

        assert!(!sweeper.is_running());
        sweeper.start();
        sweeper.start();
        assert!(sweeper.is_running());

        sweeper.stop().await;
        assert!(!sweeper.is_running());

        // Stopping twice is a no-op
        sweeper.stop().await;
    }

    #[tokio::test]
    async fn test_sweep_now() {
        let (cache, clock) = shared_store();
        {
            let mut store = cache.write().await;
            store.set("a:1", json!(1), Ttl::millis(5));
            store.set("a:2", json!(2), Ttl::Never);
        }
        clock.advance_ms(5);

        let sweeper = Sweeper::new(cache, Duration::from_secs(3600));
        let report = sweeper.sweep_now().await;
        assert_eq!(
            report,
            MaintenanceReport {
                before: 2,
                after: 1,
                cleaned: 1
            }
        );
    }

    #[tokio::test]
    async fn test_task_ends_when_sender_dropped() {
        let (cache, _) = shared_store();
        let (shutdown, stopped) = watch::channel(false);
        let handle = spawn_sweep_task(cache, Duration::from_secs(3600), stopped);

        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .expect("sweeper should not panic");
    }
}
