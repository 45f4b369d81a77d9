//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::cache::{LruCache, ManagedCache};
use crate::config::MAX_DURATION;

// == Sweep Target ==
/// Something the sweep task can clean.
pub trait SweepTarget: Send + Sync + 'static {
    /// Removes expired entries and returns how many were dropped.
    fn sweep_expired(&self) -> usize;
}

impl<V: Clone + Send + 'static> SweepTarget for LruCache<V> {
    fn sweep_expired(&self) -> usize {
        let caches: [&dyn ManagedCache; 1] = [self];
        sweep_caches(&caches)
    }
}

/// Cleans each cache in turn. A cache that panics is logged and skipped so
/// the remaining caches are still swept.
pub fn sweep_caches(caches: &[&dyn ManagedCache]) -> usize {
    let mut removed = 0;
    for cache in caches {
        match panic::catch_unwind(AssertUnwindSafe(|| cache.cleanup_expired())) {
            Ok(count) => removed += count,
            Err(_) => {
                error!(cache = %cache.name(), "Expiry sweep failed, continuing with remaining caches");
            }
        }
    }
    removed
}

/// Spawns a background task that sweeps `target` every `interval`.
///
/// The task only holds a weak reference: it stops on its own once the
/// target is dropped. Abort the returned handle to stop it earlier.
/// Intervals longer than [`MAX_DURATION`] are clamped to it.
///
/// # Panics
/// Panics if called outside a tokio runtime or with a zero interval.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(LruCache::<String>::new("sessions", config)?);
/// let handle = spawn_sweep_task(Arc::downgrade(&cache), Duration::from_secs(60));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_sweep_task<T: SweepTarget>(target: Weak<T>, interval: Duration) -> JoinHandle<()> {
    let interval = interval.min(MAX_DURATION);
    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs_f64()
        );

        let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(target) = target.upgrade() else {
                info!("Sweep target dropped, stopping cache sweep task");
                break;
            };
            let removed = target.sweep_expired();
            drop(target);

            if removed > 0 {
                info!("Cache sweep: removed {} expired entries", removed);
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    })
}
