//! Cache Store Module
//!
//! Main cache engine combining a key index with an arena-backed recency list
//! and lazy TTL expiration.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::cache::{CacheEntry, CacheStats, Clock, LruList, NodeId, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache State ==
/// Where a key lives in the two orderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    /// Node in the recency list
    node: NodeId,
    /// Node in the write-order list
    write: NodeId,
}

/// Everything guarded by a cache's lock.
///
/// `index`, `order` and `writes` always hold the same keys: every indexed key
/// points at exactly one recency node and one write node. `writes` keeps the
/// most recently written entry at the front; with one TTL per cache that is
/// also expiry order, so the oldest write is always the first to expire.
struct CacheState<V> {
    index: HashMap<String, Slot>,
    order: LruList<CacheEntry<V>>,
    writes: LruList<NodeId>,
    stats: CacheStats,
}

impl<V> CacheState<V> {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            order: LruList::with_capacity(capacity),
            writes: LruList::with_capacity(capacity),
            stats: CacheStats::new(),
        }
    }

    /// Resolves `key` to a live node, dropping it first if it has expired.
    fn live(&mut self, key: &str, now: Instant) -> Option<NodeId> {
        let slot = *self.index.get(key)?;
        let expired = match self.order.get(slot.node) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.remove_key(key);
                return None;
            }
        };
        if expired {
            self.remove_key(key);
            self.stats.record_expiration();
            return None;
        }
        Some(slot.node)
    }

    fn insert(&mut self, entry: CacheEntry<V>) {
        let key = entry.key.clone();
        let node = self.order.push_front(entry);
        let write = self.writes.push_front(node);
        self.index.insert(key, Slot { node, write });
    }

    fn remove_key(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let slot = self.index.remove(key)?;
        self.writes.remove(slot.write);
        self.order.remove(slot.node)
    }

    fn evict_least_recent(&mut self) -> Option<CacheEntry<V>> {
        let entry = self.order.evict_oldest()?;
        if let Some(slot) = self.index.remove(&entry.key) {
            self.writes.remove(slot.write);
        }
        Some(entry)
    }

    /// Drops the oldest write if it has expired. False once the oldest
    /// remaining entry is still live.
    fn expire_oldest_write(&mut self, now: Instant) -> bool {
        let Some(&node) = self.writes.peek_oldest() else {
            return false;
        };
        if !self.order.get(node).is_some_and(|entry| entry.is_expired(now)) {
            return false;
        }
        self.writes.evict_oldest();
        if let Some(entry) = self.order.remove(node) {
            self.index.remove(&entry.key);
        }
        self.stats.record_expiration();
        true
    }

    fn reset(&mut self) {
        self.index.clear();
        self.order.clear();
        self.writes.clear();
    }
}

// == LRU Cache ==
/// Thread-safe, capacity-bounded LRU cache with optional TTL.
///
/// Every operation takes the cache's own lock for a bounded amount of work,
/// so independent caches never contend with each other. Expired entries are
/// dropped lazily when touched by [`get`](Self::get),
/// [`contains_key`](Self::contains_key) or [`keys`](Self::keys), and eagerly
/// by [`cleanup_expired`](Self::cleanup_expired).
pub struct LruCache<V> {
    name: String,
    capacity: usize,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> LruCache<V> {
    // == Constructor ==
    /// Creates a cache on the system clock.
    ///
    /// Fails with [`CacheError::InvalidCapacity`](crate::CacheError::InvalidCapacity)
    /// when `config.capacity` is zero.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Result<Self> {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock(
        name: impl Into<String>,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let name = name.into();
        config.validate(&name)?;

        Ok(Self {
            name,
            capacity: config.capacity,
            ttl: config.ttl,
            clock,
            state: Mutex::new(CacheState::new(config.capacity)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    // == Get ==
    /// Returns the value for `key` if present and unexpired.
    ///
    /// A hit promotes the entry to most recently used; an expired entry is
    /// removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        self.with_state("get", None, |state, now| match state.live(key, now) {
            Some(id) => {
                state.order.touch(id);
                state.stats.record_hit();
                state.order.get(id).map(|entry| entry.value.clone())
            }
            None => {
                state.stats.record_miss();
                None
            }
        })
    }

    // == Put ==
    /// Inserts or updates `key`.
    ///
    /// An update replaces the value, restarts the TTL and promotes the entry
    /// without evicting anything. An insert that takes the cache past its
    /// capacity evicts the least recently used entry.
    pub fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        self.with_state("put", (), |state, now| {
            if let Some(&slot) = state.index.get(&key) {
                if let Some(entry) = state.order.get_mut(slot.node) {
                    entry.refresh(value, now, self.ttl);
                    state.order.touch(slot.node);
                    state.writes.touch(slot.write);
                    return;
                }
                state.remove_key(&key);
            }

            state.insert(CacheEntry::new(key, value, now, self.ttl));

            if state.index.len() > self.capacity {
                if let Some(evicted) = state.evict_least_recent() {
                    state.stats.record_eviction();
                    debug!(cache = %self.name, key = %evicted.key, "evicted least recently used entry");
                }
            }
        })
    }

    // == Remove ==
    /// Removes `key` and returns its value.
    ///
    /// An entry that had already expired is dropped and reported as absent.
    pub fn remove(&self, key: &str) -> Option<V> {
        self.with_state("remove", None, |state, now| {
            let entry = state.remove_key(key)?;
            if entry.is_expired(now) {
                state.stats.record_expiration();
                return None;
            }
            Some(entry.value)
        })
    }

    // == Clear ==
    /// Empties the cache in one step under the lock.
    pub fn clear(&self) {
        self.with_state("clear", (), |state, _| state.reset());
    }

    // == Contains Key ==
    /// True if `key` is present and unexpired. Does not promote the entry.
    pub fn contains_key(&self, key: &str) -> bool {
        self.with_state("contains_key", false, |state, now| {
            state.live(key, now).is_some()
        })
    }

    // == Length ==
    /// Returns the number of stored entries.
    ///
    /// Expired entries that have not been touched or swept yet are still
    /// counted, so this may overcount but never undercounts.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Keys ==
    /// Snapshot of the unexpired keys. Expired entries found on the way are
    /// removed.
    pub fn keys(&self) -> HashSet<String> {
        self.with_state("keys", HashSet::new(), |state, now| {
            while state.expire_oldest_write(now) {}
            state.index.keys().cloned().collect()
        })
    }

    // == Time To Live ==
    /// Remaining lifetime of `key`. Does not promote the entry.
    ///
    /// Returns None when the key is absent, expired, or never expires.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.with_state("ttl_remaining", None, |state, now| {
            let id = state.live(key, now)?;
            state.order.get(id)?.ttl_remaining(now)
        })
    }

    // == Cleanup Expired ==
    /// Removes every expired entry and returns how many were dropped.
    ///
    /// Entries are dropped oldest write first, each under its own short lock
    /// acquisition, so concurrent callers are never blocked for the whole
    /// sweep. It stops at the first entry that is still live.
    pub fn cleanup_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }

        let mut removed = 0;
        while self.with_state("cleanup_expired", false, |state, now| {
            state.expire_oldest_write(now)
        }) {
            removed += 1;
        }

        if removed > 0 {
            debug!(cache = %self.name, removed, "removed expired entries");
        }
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_entries(state.index.len());
        stats
    }

    // == Get Or Fetch ==
    /// Cache-aside lookup: returns the cached value for `key`, or awaits
    /// `fetch`, stores its successful result and returns it.
    ///
    /// Errors from `fetch` are passed through and nothing is cached. The lock
    /// is never held while `fetch` runs.
    pub async fn get_or_try_fetch<F, Fut, E>(&self, key: &str, fetch: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.put(key, value.clone());
        Ok(value)
    }

    /// Runs `f` under the lock. A panic inside `f` is logged, the cache is
    /// reset to empty so the index and order stay consistent, and `fallback`
    /// is returned instead.
    fn with_state<R>(
        &self,
        op: &'static str,
        fallback: R,
        f: impl FnOnce(&mut CacheState<V>, Instant) -> R,
    ) -> R {
        let mut state = self.state.lock();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let now = self.clock.now();
            f(&mut *state, now)
        }));

        match result {
            Ok(value) => value,
            Err(_) => {
                error!(cache = %self.name, op, "cache operation panicked, resetting cache");
                state.reset();
                fallback
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let state = self.state.lock();
        assert_eq!(state.index.len(), state.order.len(), "index/order size mismatch");
        assert_eq!(state.index.len(), state.writes.len(), "index/writes size mismatch");
        assert!(state.index.len() <= self.capacity, "capacity exceeded");
        for (id, entry) in state.order.iter() {
            let slot = state.index.get(&entry.key).copied();
            assert_eq!(slot.map(|slot| slot.node), Some(id), "order node not indexed");
            let write = slot.and_then(|slot| state.writes.get(slot.write));
            assert_eq!(write, Some(&id), "write node out of sync");
        }
        let mut previous: Option<Instant> = None;
        for (_, node) in state.writes.iter() {
            let written_at = state
                .order
                .get(*node)
                .map(|entry| entry.written_at)
                .expect("write node points at a freed entry");
            if let Some(previous) = previous {
                assert!(previous >= written_at, "write order not newest first");
            }
            previous = Some(written_at);
        }
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.state.lock().index.len())
            .finish()
    }
}

// == Managed Cache ==
/// Type-erased view of a cache used by the registry for bulk operations.
pub trait ManagedCache: Send + Sync {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    /// Drops `key`; true if an unexpired entry was removed.
    fn remove_key(&self, key: &str) -> bool;
    fn clear(&self);
    fn cleanup_expired(&self) -> usize;
    fn stats(&self) -> CacheStats;
}

impl<V: Clone + Send> ManagedCache for LruCache<V> {
    fn name(&self) -> &str {
        LruCache::name(self)
    }

    fn len(&self) -> usize {
        LruCache::len(self)
    }

    fn remove_key(&self, key: &str) -> bool {
        LruCache::remove(self, key).is_some()
    }

    fn clear(&self) {
        LruCache::clear(self)
    }

    fn cleanup_expired(&self) -> usize {
        LruCache::cleanup_expired(self)
    }

    fn stats(&self) -> CacheStats {
        LruCache::stats(self)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::CacheError;
    use std::thread;

    fn cache(capacity: usize) -> LruCache<i32> {
        LruCache::new("test", CacheConfig::with_capacity(capacity)).unwrap()
    }

    fn ttl_cache(capacity: usize, ttl_secs: u64) -> (LruCache<i32>, ManualClock) {
        let clock = ManualClock::new();
        let config = CacheConfig::with_capacity(capacity).ttl(Duration::from_secs(ttl_secs));
        let cache = LruCache::with_clock("test", config, Arc::new(clock.clone())).unwrap();
        (cache, clock)
    }

    fn key_set(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = LruCache::<i32>::new("broken", CacheConfig::with_capacity(0));
        assert!(matches!(
            result,
            Err(CacheError::InvalidCapacity { capacity: 0, .. })
        ));
    }

    #[test]
    fn test_store_put_and_get() {
        let cache = cache(10);

        cache.put("key1", 1);

        assert_eq!(cache.get("key1"), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let cache = cache(10);
        assert_eq!(cache.get("nonexistent"), None);
    }

    #[test]
    fn test_store_remove() {
        let cache = cache(10);

        cache.put("key1", 1);

        assert_eq!(cache.remove("key1"), Some(1));
        assert_eq!(cache.remove("key1"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_store_update_keeps_size_and_promotes() {
        let cache = cache(2);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);

        // "a" is most recent after its update, so "b" goes next
        cache.put("c", 3);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_store_lru_eviction() {
        let cache = cache(2);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let cache = cache(2);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.get("a");
        cache.put("c", 3);

        assert_eq!(cache.keys(), key_set(&["a", "c"]));
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_contains_key_does_not_promote() {
        let cache = cache(2);

        cache.put("a", 1);
        cache.put("b", 2);
        assert!(cache.contains_key("a"));
        cache.put("c", 3);

        assert!(!cache.contains_key("a"));
        assert!(cache.contains_key("b"));
    }

    #[test]
    fn test_store_ttl_expiration_boundary() {
        let (cache, clock) = ttl_cache(10, 60);

        cache.put("key1", 1);

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("key1"), Some(1));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("key1"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expirations, 1);
    }

    #[test]
    fn test_store_ttl_restarted_by_update() {
        let (cache, clock) = ttl_cache(10, 60);

        cache.put("key1", 1);
        clock.advance(Duration::from_secs(50));
        cache.put("key1", 2);
        clock.advance(Duration::from_secs(50));

        assert_eq!(cache.get("key1"), Some(2));
    }

    #[test]
    fn test_get_does_not_extend_ttl() {
        let (cache, clock) = ttl_cache(10, 60);

        cache.put("key1", 1);
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get("key1"), Some(1));
        clock.advance(Duration::from_secs(30));

        assert_eq!(cache.get("key1"), None);
    }

    #[test]
    fn test_len_overcounts_until_touched() {
        let (cache, clock) = ttl_cache(10, 1);

        cache.put("a", 1);
        cache.put("b", 2);
        clock.advance(Duration::from_secs(2));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains_key("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_keys_drops_expired_entries() {
        let clock = ManualClock::new();
        let short = LruCache::with_clock(
            "short",
            CacheConfig::with_capacity(10).ttl(Duration::from_secs(5)),
            Arc::new(clock.clone()),
        )
        .unwrap();

        short.put("old", 1);
        clock.advance(Duration::from_secs(3));
        short.put("new", 2);
        clock.advance(Duration::from_secs(3));

        assert_eq!(short.keys(), key_set(&["new"]));
        assert_eq!(short.len(), 1);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let (cache, clock) = ttl_cache(10, 10);

        cache.put("key1", 1);
        clock.advance(Duration::from_secs(5));
        cache.put("key2", 2);
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("key2"), Some(2));
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_cleanup_skips_refreshed_entries() {
        let (cache, clock) = ttl_cache(10, 10);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        clock.advance(Duration::from_secs(6));
        cache.put("a", 10);
        cache.put("d", 4);
        clock.advance(Duration::from_secs(4));

        assert_eq!(cache.cleanup_expired(), 2);
        assert_eq!(cache.keys(), key_set(&["a", "d"]));
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.stats().expirations, 2);
        cache.assert_consistent();
    }

    #[test]
    fn test_cleanup_ignores_recency_order() {
        let (cache, clock) = ttl_cache(10, 10);

        cache.put("old", 1);
        clock.advance(Duration::from_secs(5));
        cache.put("new", 2);
        // Reading promotes "old" without restarting its TTL
        assert_eq!(cache.get("old"), Some(1));
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.keys(), key_set(&["new"]));
        cache.assert_consistent();
    }

    #[test]
    fn test_cleanup_after_eviction_and_removal() {
        let (cache, clock) = ttl_cache(3, 10);

        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        cache.put("d", 4);
        cache.remove("c");
        cache.assert_consistent();
        clock.advance(Duration::from_secs(10));

        assert_eq!(cache.cleanup_expired(), 2);
        assert!(cache.is_empty());
        cache.assert_consistent();
    }

    #[test]
    fn test_cleanup_without_ttl_is_noop() {
        let cache = cache(10);
        cache.put("key1", 1);
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_remove_expired_reports_absent() {
        let (cache, clock) = ttl_cache(10, 1);

        cache.put("key1", 1);
        clock.advance(Duration::from_secs(1));

        assert_eq!(cache.remove("key1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let cache = cache(10);
        cache.put("a", 1);
        cache.put("b", 2);

        cache.clear();
        assert_eq!(cache.len(), 0);
        assert!(cache.keys().is_empty());
        assert_eq!(cache.get("a"), None);

        cache.clear();
        assert_eq!(cache.len(), 0);
        cache.assert_consistent();
    }

    #[test]
    fn test_ttl_remaining() {
        let (cache, clock) = ttl_cache(10, 60);

        cache.put("key1", 1);
        clock.advance(Duration::from_secs(20));

        assert_eq!(cache.ttl_remaining("key1"), Some(Duration::from_secs(40)));
        assert_eq!(cache.ttl_remaining("missing"), None);
    }

    #[test]
    fn test_store_stats() {
        let cache = cache(10);

        cache.put("key1", 1);
        cache.get("key1");
        cache.get("nonexistent");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[derive(Debug)]
    struct Fragile(bool);

    impl Clone for Fragile {
        fn clone(&self) -> Self {
            if self.0 {
                panic!("clone failed");
            }
            Fragile(self.0)
        }
    }

    #[test]
    fn test_panic_during_get_resets_cache() {
        let cache = LruCache::new("fragile", CacheConfig::with_capacity(4)).unwrap();
        cache.put("ok", Fragile(false));
        cache.put("bad", Fragile(true));

        assert!(cache.get("bad").is_none());

        // The cache is emptied but still usable
        assert!(cache.is_empty());
        cache.put("ok", Fragile(false));
        assert!(cache.get("ok").is_some());
        cache.assert_consistent();
    }

    #[test]
    fn test_debug_output() {
        let cache = cache(3);
        cache.put("a", 1);
        let debug = format!("{:?}", cache);
        assert!(debug.contains("\"test\""));
        assert!(debug.contains("len: 1"));
    }

    #[test]
    fn test_concurrent_access_keeps_structure_consistent() {
        let cache = Arc::new(cache(64));

        thread::scope(|scope| {
            for t in 0..8 {
                let cache = Arc::clone(&cache);
                scope.spawn(move || {
                    for i in 0..2_000 {
                        let key = format!("k{}", (i * 7 + t * 13) % 150);
                        match i % 4 {
                            0 | 1 => cache.put(key, i),
                            2 => {
                                cache.get(&key);
                            }
                            _ => {
                                cache.remove(&key);
                            }
                        }
                    }
                });
            }
        });

        cache.assert_consistent();
        for key in cache.keys() {
            assert!(cache.get(&key).is_some(), "key {key} listed but not retrievable");
        }
    }

    #[test]
    fn test_get_or_try_fetch_caches_success() {
        let cache = cache(4);

        let first: std::result::Result<i32, String> =
            tokio_test::block_on(cache.get_or_try_fetch("k", || async { Ok(5) }));
        assert_eq!(first, Ok(5));

        let second: std::result::Result<i32, String> = tokio_test::block_on(
            cache.get_or_try_fetch("k", || async { Err("should not be called".to_string()) }),
        );
        assert_eq!(second, Ok(5));
    }

    #[test]
    fn test_get_or_try_fetch_does_not_cache_errors() {
        let cache = cache(4);

        let result: std::result::Result<i32, &str> =
            tokio_test::block_on(cache.get_or_try_fetch("k", || async { Err("offline") }));

        assert_eq!(result, Err("offline"));
        assert!(!cache.contains_key("k"));
    }
}
