//! Invalidation - maps domain changes to the caches they make stale.
//!
//! The invalidator holds no cache state. [`DataType::plan`] turns a
//! change into a list of [`Invalidation`]s, and the invalidator applies that
//! list to an [`InvalidationTarget`] (the registry in production, a recorder
//! in tests).

use std::fmt;

use tracing::debug;

use crate::registry::{event_detail_key, CacheName, CacheRegistry, CacheSchema};

// == Data Type ==
/// Kind of change, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    EventCreated,
    EventUpdated,
    EventDeleted,
    UserProfileUpdated,
    UserEventRegistered,
    UserEventUnregistered,
    UserActivityChanged,
    UserLogout,
}

impl DataType {
    /// Computes the invalidations for a change.
    ///
    /// A targeted event-detail removal needs `event_id`; without one the
    /// whole event-detail cache is cleared instead. Any event mutation also
    /// clears the aggregate lists it may appear in.
    pub fn plan(self, event_id: Option<&str>) -> Vec<Invalidation> {
        let event_detail = || match event_id {
            Some(id) => Invalidation::RemoveKey {
                cache: CacheName::EventDetail,
                key: event_detail_key(id),
            },
            None => Invalidation::Clear(CacheName::EventDetail),
        };

        match self {
            DataType::EventCreated => vec![
                Invalidation::Clear(CacheName::AllEvents),
                Invalidation::Clear(CacheName::UserEvents),
            ],
            DataType::EventUpdated | DataType::EventDeleted => vec![
                event_detail(),
                Invalidation::Clear(CacheName::AllEvents),
                Invalidation::Clear(CacheName::UserEvents),
            ],
            DataType::UserProfileUpdated => vec![Invalidation::Clear(CacheName::UserProfile)],
            DataType::UserEventRegistered | DataType::UserEventUnregistered => vec![
                event_detail(),
                Invalidation::Clear(CacheName::UserEvents),
                Invalidation::Clear(CacheName::RecentActivity),
            ],
            DataType::UserActivityChanged => vec![Invalidation::Clear(CacheName::RecentActivity)],
            DataType::UserLogout => vec![Invalidation::ClearUserScoped],
        }
    }
}

// == Data Change ==
/// A change reported after a successful mutating call, carrying only the
/// identifiers relevant to that change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataChange {
    EventCreated,
    EventUpdated { event_id: String },
    EventDeleted { event_id: String },
    UserProfileUpdated,
    UserEventRegistered { event_id: String },
    UserEventUnregistered { event_id: String },
    UserActivityChanged,
    UserLogout,
}

impl DataChange {
    pub fn kind(&self) -> DataType {
        match self {
            DataChange::EventCreated => DataType::EventCreated,
            DataChange::EventUpdated { .. } => DataType::EventUpdated,
            DataChange::EventDeleted { .. } => DataType::EventDeleted,
            DataChange::UserProfileUpdated => DataType::UserProfileUpdated,
            DataChange::UserEventRegistered { .. } => DataType::UserEventRegistered,
            DataChange::UserEventUnregistered { .. } => DataType::UserEventUnregistered,
            DataChange::UserActivityChanged => DataType::UserActivityChanged,
            DataChange::UserLogout => DataType::UserLogout,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        match self {
            DataChange::EventUpdated { event_id }
            | DataChange::EventDeleted { event_id }
            | DataChange::UserEventRegistered { event_id }
            | DataChange::UserEventUnregistered { event_id } => Some(event_id),
            _ => None,
        }
    }
}

// == Invalidation ==
/// A single registry call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Invalidation {
    /// Drop one key from one cache
    RemoveKey { cache: CacheName, key: String },
    /// Empty one cache
    Clear(CacheName),
    /// Empty every user-scoped cache
    ClearUserScoped,
    /// Empty every cache
    ClearAll,
}

impl fmt::Display for Invalidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalidation::RemoveKey { cache, key } => write!(f, "remove {cache}/{key}"),
            Invalidation::Clear(cache) => write!(f, "clear {cache}"),
            Invalidation::ClearUserScoped => f.write_str("clear user-scoped"),
            Invalidation::ClearAll => f.write_str("clear all"),
        }
    }
}

// == Invalidation Target ==
/// Receiver of invalidation calls.
pub trait InvalidationTarget {
    fn remove_key(&self, cache: CacheName, key: &str);
    fn clear_cache(&self, cache: CacheName);
    fn clear_user_scoped(&self);
    fn clear_all(&self);

    fn apply(&self, invalidation: &Invalidation) {
        match invalidation {
            Invalidation::RemoveKey { cache, key } => self.remove_key(*cache, key),
            Invalidation::Clear(cache) => self.clear_cache(*cache),
            Invalidation::ClearUserScoped => self.clear_user_scoped(),
            Invalidation::ClearAll => self.clear_all(),
        }
    }
}

impl<S: CacheSchema> InvalidationTarget for CacheRegistry<S> {
    fn remove_key(&self, cache: CacheName, key: &str) {
        self.cache(cache).remove_key(key);
    }

    fn clear_cache(&self, cache: CacheName) {
        self.cache(cache).clear();
    }

    fn clear_user_scoped(&self) {
        CacheRegistry::clear_user_scoped(self);
    }

    fn clear_all(&self) {
        CacheRegistry::clear_all(self);
    }
}

// == Cache Invalidator ==
/// Translates domain changes into targeted or blanket invalidations.
#[derive(Debug, Clone)]
pub struct CacheInvalidator<T> {
    target: T,
}

impl<T: InvalidationTarget> CacheInvalidator<T> {
    pub fn new(target: T) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Applies the invalidations for `change`.
    pub fn invalidate(&self, change: &DataChange) {
        self.invalidate_by_data_type(change.kind(), change.event_id());
    }

    /// Applies the invalidations for a change kind and optional identifier.
    pub fn invalidate_by_data_type(&self, kind: DataType, event_id: Option<&str>) {
        self.apply_all(&kind, kind.plan(event_id));
    }

    // == Convenience Calls ==
    /// Drops one event's detail along with the lists it may appear in.
    pub fn invalidate_event_cache(&self, event_id: &str) {
        self.invalidate_by_data_type(DataType::EventUpdated, Some(event_id));
    }

    pub fn invalidate_all_events_cache(&self) {
        self.apply_all(&"all_events", [Invalidation::Clear(CacheName::AllEvents)]);
    }

    pub fn invalidate_user_profile_cache(&self) {
        self.invalidate_by_data_type(DataType::UserProfileUpdated, None);
    }

    pub fn invalidate_user_events_cache(&self) {
        self.apply_all(&"user_events", [Invalidation::Clear(CacheName::UserEvents)]);
    }

    pub fn invalidate_recent_activity_cache(&self) {
        self.invalidate_by_data_type(DataType::UserActivityChanged, None);
    }

    /// Clears everything tied to the signed-in user.
    pub fn invalidate_user_scoped(&self) {
        self.invalidate_by_data_type(DataType::UserLogout, None);
    }

    pub fn invalidate_all(&self) {
        self.apply_all(&"all", [Invalidation::ClearAll]);
    }

    /// Logs and applies each invalidation in order.
    fn apply_all<I>(&self, reason: &dyn fmt::Debug, invalidations: I)
    where
        I: IntoIterator<Item = Invalidation>,
    {
        for invalidation in invalidations {
            debug!(?reason, %invalidation, "Invalidating cache");
            self.target.apply(&invalidation);
        }
    }
}
