//! Cache registry - the closed set of named caches the data layer uses.
//!
//! ## Architecture
//!
//! - `CacheName` - the five cache categories
//! - `CacheSchema` - payload type stored in each category
//! - `CacheRegistry` - owns one independently tuned `LruCache` per category
//!   and the background expiry sweep
//! - `keys` - key builders shared by readers and writers
//!
//! ## Usage
//!
//! ```rust,ignore
//! let registry: CacheRegistry<AppSchema> = CacheRegistry::start(&RegistryConfig::default())?;
//!
//! let key = keys::event_detail_key(&event_id);
//! if let Some(event) = registry.event_detail().get(&key) {
//!     return Ok(event);
//! }
//! let event = api.fetch_event(&event_id).await?;
//! registry.event_detail().put(key, event.clone());
//! ```

pub mod keys;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{CacheStats, Clock, LruCache, ManagedCache, SystemClock};
use crate::config::RegistryConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, sweep_caches, SweepTarget};

pub use keys::{
    all_events_key, event_detail_key, recent_activity_key, user_events_key, user_profile_key,
};

// == Cache Name ==
/// Identifies one of the registry's caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheName {
    AllEvents,
    EventDetail,
    UserProfile,
    UserEvents,
    RecentActivity,
}

impl CacheName {
    /// Every cache, in sweep order.
    pub const ALL: [CacheName; 5] = [
        CacheName::AllEvents,
        CacheName::EventDetail,
        CacheName::UserProfile,
        CacheName::UserEvents,
        CacheName::RecentActivity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheName::AllEvents => "all_events",
            CacheName::EventDetail => "event_detail",
            CacheName::UserProfile => "user_profile",
            CacheName::UserEvents => "user_events",
            CacheName::RecentActivity => "recent_activity",
        }
    }

    /// True for caches whose content belongs to the signed-in user and must
    /// not survive a logout.
    pub fn is_user_scoped(self) -> bool {
        matches!(
            self,
            CacheName::UserProfile | CacheName::UserEvents | CacheName::RecentActivity
        )
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Cache Schema ==
/// Payload types stored in each cache category.
///
/// Implemented once by the application on a marker type, so every cache is
/// strongly typed while the set of caches stays fixed.
pub trait CacheSchema: Send + Sync + 'static {
    type EventList: Clone + Send + 'static;
    type Event: Clone + Send + 'static;
    type UserProfile: Clone + Send + 'static;
    type UserEvents: Clone + Send + 'static;
    type RecentActivity: Clone + Send + 'static;
}

// == Registry Snapshot ==
/// Point-in-time statistics for every cache.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub taken_at: DateTime<Utc>,
    pub caches: BTreeMap<CacheName, CacheStats>,
}

struct RegistryInner<S: CacheSchema> {
    all_events: LruCache<S::EventList>,
    event_detail: LruCache<S::Event>,
    user_profile: LruCache<S::UserProfile>,
    user_events: LruCache<S::UserEvents>,
    recent_activity: LruCache<S::RecentActivity>,
    sweep_interval: Duration,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl<S: CacheSchema> RegistryInner<S> {
    fn cache(&self, name: CacheName) -> &dyn ManagedCache {
        match name {
            CacheName::AllEvents => &self.all_events,
            CacheName::EventDetail => &self.event_detail,
            CacheName::UserProfile => &self.user_profile,
            CacheName::UserEvents => &self.user_events,
            CacheName::RecentActivity => &self.recent_activity,
        }
    }
}

impl<S: CacheSchema> SweepTarget for RegistryInner<S> {
    fn sweep_expired(&self) -> usize {
        let caches = CacheName::ALL.map(|name| self.cache(name));
        sweep_caches(&caches)
    }
}

impl<S: CacheSchema> Drop for RegistryInner<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweep.get_mut().take() {
            handle.abort();
        }
    }
}

// == Cache Registry ==
/// Central registry holding one cache per data category.
///
/// Cloning is cheap and every clone shares the same caches, so the registry
/// can be constructed once at startup and handed to each repository.
pub struct CacheRegistry<S: CacheSchema> {
    inner: Arc<RegistryInner<S>>,
}

impl<S: CacheSchema> Clone for CacheRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: CacheSchema> CacheRegistry<S> {
    /// Builds every cache on the system clock. The sweep is not started.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds every cache reading time from `clock`.
    pub fn with_clock(config: &RegistryConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let inner = RegistryInner {
            all_events: build(config, CacheName::AllEvents, &clock)?,
            event_detail: build(config, CacheName::EventDetail, &clock)?,
            user_profile: build(config, CacheName::UserProfile, &clock)?,
            user_events: build(config, CacheName::UserEvents, &clock)?,
            recent_activity: build(config, CacheName::RecentActivity, &clock)?,
            sweep_interval: config.sweep_interval,
            sweep: Mutex::new(None),
        };

        info!(
            sweep_interval_secs = config.sweep_interval.as_secs(),
            "Cache registry initialized"
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Builds the registry and starts the background sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &RegistryConfig) -> Result<Self> {
        let registry = Self::new(config)?;
        registry.start_sweep()?;
        Ok(registry)
    }

    pub fn all_events(&self) -> &LruCache<S::EventList> {
        &self.inner.all_events
    }

    pub fn event_detail(&self) -> &LruCache<S::Event> {
        &self.inner.event_detail
    }

    pub fn user_profile(&self) -> &LruCache<S::UserProfile> {
        &self.inner.user_profile
    }

    pub fn user_events(&self) -> &LruCache<S::UserEvents> {
        &self.inner.user_events
    }

    pub fn recent_activity(&self) -> &LruCache<S::RecentActivity> {
        &self.inner.recent_activity
    }

    /// Untyped handle to a cache, for operations that don't touch values.
    pub fn cache(&self, name: CacheName) -> &dyn ManagedCache {
        self.inner.cache(name)
    }

    // == Bulk Operations ==
    /// Clears every cache. Each cache is cleared atomically on its own;
    /// there is no lock across caches.
    pub fn clear_all(&self) {
        for name in CacheName::ALL {
            self.cache(name).clear();
        }
        info!("Cleared all caches");
    }

    /// Clears only the caches tied to the signed-in user, leaving global
    /// content such as the events list in place.
    pub fn clear_user_scoped(&self) {
        for name in CacheName::ALL.into_iter().filter(|name| name.is_user_scoped()) {
            self.cache(name).clear();
        }
        info!("Cleared user-scoped caches");
    }

    /// Entry count per cache.
    pub fn stats(&self) -> BTreeMap<CacheName, usize> {
        CacheName::ALL
            .into_iter()
            .map(|name| (name, self.cache(name).len()))
            .collect()
    }

    /// Full statistics per cache.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            taken_at: Utc::now(),
            caches: CacheName::ALL
                .into_iter()
                .map(|name| (name, self.cache(name).stats()))
                .collect(),
        }
    }

    /// Runs one expiry sweep over every cache and returns the number of
    /// entries removed.
    pub fn cleanup_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    // == Background Sweep ==
    /// Starts the periodic expiry sweep. Calling it while a sweep is already
    /// running does nothing.
    pub fn start_sweep(&self) -> Result<()> {
        tokio::runtime::Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let mut sweep = self.inner.sweep.lock();
        if sweep.as_ref().is_some_and(|handle| !handle.is_finished()) {
            warn!("Cache sweep already running");
            return Ok(());
        }
        *sweep = Some(spawn_sweep_task(
            Arc::downgrade(&self.inner),
            self.inner.sweep_interval,
        ));
        Ok(())
    }

    /// Stops the periodic sweep. Caches stay usable.
    pub fn shutdown(&self) {
        if let Some(handle) = self.inner.sweep.lock().take() {
            handle.abort();
            info!("Cache sweep stopped");
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweep
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn sweep_interval(&self) -> Duration {
        self.inner.sweep_interval
    }
}

impl<S: CacheSchema> fmt::Debug for CacheRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.stats())
            .field("sweep_interval", &self.inner.sweep_interval)
            .finish()
    }
}

fn build<V: Clone>(
    config: &RegistryConfig,
    name: CacheName,
    clock: &Arc<dyn Clock>,
) -> Result<LruCache<V>> {
    LruCache::with_clock(name.as_str(), *config.get(name), Arc::clone(clock))
}
