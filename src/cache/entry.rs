//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// A single cached value and its write metadata.
///
/// Entries never leave the cache that owns them; callers only ever see
/// clones of `value`.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Key the entry is indexed under
    pub key: String,
    /// The stored value
    pub value: V,
    /// Time of the last insert or update
    pub written_at: Instant,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry written at `now`.
    ///
    /// # Arguments
    /// * `key` - The key the entry is stored under
    /// * `value` - The value to store
    /// * `now` - Write time
    /// * `ttl` - Optional lifetime measured from `now`
    pub fn new(key: String, value: V, now: Instant, ttl: Option<Duration>) -> Self {
        Self {
            key,
            value,
            written_at: now,
            expires_at: deadline(now, ttl),
        }
    }

    // == Refresh ==
    /// Replaces the value and restarts the TTL from `now`.
    pub fn refresh(&mut self, value: V, now: Instant, ttl: Option<Duration>) {
        self.value = value;
        self.written_at = now;
        self.expires_at = deadline(now, ttl);
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches the
    /// expiration instant, so a TTL of `d` gives exactly `d` of validity.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns the remaining lifetime, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the entry has expired
    /// - `Some(remaining)` if the entry has TTL and hasn't expired
    /// - `None` if the entry never expires
    pub fn ttl_remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(now))
    }
}

/// `now + ttl`; a deadline past what `Instant` can represent never expires.
fn deadline(now: Instant, ttl: Option<Duration>) -> Option<Instant> {
    ttl.and_then(|ttl| now.checked_add(ttl))
}
