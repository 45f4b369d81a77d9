//! Cache Module
//!
//! Provides a thread-safe in-memory cache with TTL expiration and LRU eviction.

mod clock;
mod entry;
mod lru;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::CacheEntry;
pub use lru::{Iter, LruList, NodeId};
pub use stats::CacheStats;
pub use store::{LruCache, ManagedCache};
