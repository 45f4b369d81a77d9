//! Event Cache - client-side caching layer for the app's data repositories
//!
//! Provides thread-safe LRU caches with TTL expiration, a registry of named
//! caches with a background expiry sweep, and event-driven invalidation.

pub mod cache;
pub mod config;
pub mod error;
pub mod invalidation;
pub mod registry;
pub mod tasks;

pub use cache::{CacheStats, Clock, LruCache, ManagedCache, ManualClock, SystemClock};
pub use config::{CacheConfig, RegistryConfig};
pub use error::{CacheError, Result};
pub use invalidation::{CacheInvalidator, DataChange, DataType, Invalidation, InvalidationTarget};
pub use registry::{keys, CacheName, CacheRegistry, CacheSchema, RegistrySnapshot};
pub use tasks::spawn_sweep_task;
