//! Configuration Module
//!
//! Per-cache tunings and the registry-wide configuration, loadable from
//! environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::registry::CacheName;

/// Default interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Longest accepted TTL or sweep interval (ten years). Longer durations
/// would overflow `Instant` arithmetic.
pub const MAX_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

const ENV_PREFIX: &str = "EVENT_CACHE";

// == Cache Config ==
/// Configuration for a single cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries held before LRU eviction kicks in
    pub capacity: usize,
    /// Lifetime of an entry after its last write, `None` = never expires
    pub ttl: Option<Duration>,
}

impl CacheConfig {
    /// Creates a config with the given capacity and TTL.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self { capacity, ttl }
    }

    /// Creates a config with the given capacity and no TTL.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ttl: None,
        }
    }

    /// Set time-to-live for cache entries.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable TTL (entries only leave through eviction or removal).
    #[must_use]
    pub fn no_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Rejects configurations no cache can be built from.
    pub fn validate(&self, cache: &str) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidCapacity {
                cache: cache.to_string(),
                capacity: self.capacity,
            });
        }
        if let Some(ttl) = self.ttl {
            check_duration(&format!("{cache} ttl"), ttl)?;
        }
        Ok(())
    }
}

// == Registry Config ==
/// Tunings for every named cache plus the background sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Broad, long-lived list of all events
    pub all_events: CacheConfig,
    /// Per-event detail lookups
    pub event_detail: CacheConfig,
    /// The signed-in user's profile
    pub user_profile: CacheConfig,
    /// Parameterized "my events" queries
    pub user_events: CacheConfig,
    /// Volatile recent-activity feed
    pub recent_activity: CacheConfig,
    /// Interval between proactive expiry sweeps
    pub sweep_interval: Duration,
}

impl RegistryConfig {
    /// Loads the configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `EVENT_CACHE_<NAME>_CAPACITY` - entry limit for the named cache
    /// - `EVENT_CACHE_<NAME>_TTL_SECS` - TTL in seconds, `0` disables expiry
    /// - `EVENT_CACHE_SWEEP_INTERVAL_SECS` - sweep frequency (default: 300)
    ///
    /// `<NAME>` is one of `ALL_EVENTS`, `EVENT_DETAIL`, `USER_PROFILE`,
    /// `USER_EVENTS`, `RECENT_ACTIVITY`. Unset variables keep their defaults;
    /// set but unparsable ones are an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`RegistryConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for name in CacheName::ALL {
            let upper = name.as_str().to_ascii_uppercase();
            let cache = config.get_mut(name);

            let capacity_var = format!("{ENV_PREFIX}_{upper}_CAPACITY");
            if let Some(capacity) = parse_var::<usize, _>(&lookup, &capacity_var)? {
                cache.capacity = capacity;
            }

            let ttl_var = format!("{ENV_PREFIX}_{upper}_TTL_SECS");
            if let Some(secs) = parse_var::<u64, _>(&lookup, &ttl_var)? {
                cache.ttl = (secs > 0).then(|| Duration::from_secs(secs));
            }
        }

        let sweep_var = format!("{ENV_PREFIX}_SWEEP_INTERVAL_SECS");
        if let Some(secs) = parse_var::<u64, _>(&lookup, &sweep_var)? {
            config.sweep_interval = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Returns the config of one named cache.
    pub fn get(&self, name: CacheName) -> &CacheConfig {
        match name {
            CacheName::AllEvents => &self.all_events,
            CacheName::EventDetail => &self.event_detail,
            CacheName::UserProfile => &self.user_profile,
            CacheName::UserEvents => &self.user_events,
            CacheName::RecentActivity => &self.recent_activity,
        }
    }

    fn get_mut(&mut self, name: CacheName) -> &mut CacheConfig {
        match name {
            CacheName::AllEvents => &mut self.all_events,
            CacheName::EventDetail => &mut self.event_detail,
            CacheName::UserProfile => &mut self.user_profile,
            CacheName::UserEvents => &mut self.user_events,
            CacheName::RecentActivity => &mut self.recent_activity,
        }
    }

    /// Checks every cache config and the sweep interval.
    pub fn validate(&self) -> Result<()> {
        for name in CacheName::ALL {
            self.get(name).validate(name.as_str())?;
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::InvalidSweepInterval);
        }
        check_duration("sweep interval", self.sweep_interval)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            all_events: CacheConfig::with_capacity(50).ttl(Duration::from_secs(30 * 60)),
            event_detail: CacheConfig::with_capacity(200).ttl(Duration::from_secs(15 * 60)),
            user_profile: CacheConfig::with_capacity(10).ttl(Duration::from_secs(15 * 60)),
            user_events: CacheConfig::with_capacity(50).ttl(Duration::from_secs(5 * 60)),
            recent_activity: CacheConfig::with_capacity(20).ttl(Duration::from_secs(2 * 60)),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

fn check_duration(setting: &str, duration: Duration) -> Result<()> {
    if duration > MAX_DURATION {
        return Err(CacheError::DurationTooLong {
            setting: setting.to_string(),
            secs: duration.as_secs(),
            max_secs: MAX_DURATION.as_secs(),
        });
    }
    Ok(())
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CacheError::InvalidEnv {
                var: var.to_string(),
                value: raw,
            }),
    }
}
