//! In-memory weather cache, the single source of truth for presenters.
//!
//! Every mutation runs under one commit lock: the snapshot is swapped, queued
//! for persistence, then observers are called in registration order. Readers
//! only take the state read lock, so they see the snapshot before or after a
//! commit, never in between.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::persistence::SnapshotStore;
use crate::types::{
    BulkRecord, CacheSnapshot, FetchOutcome, Location, LocationId, SingleLocationRecord,
    WeatherObservation,
};

type Observer = Arc<dyn Fn() + Send + Sync>;

/// Handle returned by [`CacheStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Results gathered by one refresh round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundResult {
    /// One record per bookmarked location whose fetch completed
    pub bookmarked: Vec<SingleLocationRecord>,
    pub nearby: Option<BulkRecord>,
}

impl RoundResult {
    pub fn is_empty(&self) -> bool {
        self.bookmarked.is_empty() && self.nearby.is_none()
    }
}

pub struct CacheStore {
    state: RwLock<CacheSnapshot>,
    commit_lock: Mutex<()>,
    persistence: Arc<dyn SnapshotStore>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("snapshot", &*self.state.read())
            .field("observers", &self.observers.lock().len())
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Restore the cache from `persistence`, or start from the seed location.
    pub fn open(persistence: Arc<dyn SnapshotStore>) -> Self {
        let snapshot = persistence.load().unwrap_or_else(|| {
            tracing::info!("Starting weather cache from seed location");
            CacheSnapshot::seeded()
        });
        Self::with_snapshot(snapshot, persistence)
    }

    pub fn with_snapshot(snapshot: CacheSnapshot, persistence: Arc<dyn SnapshotStore>) -> Self {
        Self {
            state: RwLock::new(snapshot),
            commit_lock: Mutex::new(()),
            persistence,
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    // =========== Reads ===========

    /// Observation for `location_id`, preferring bookmarked records over nearby ones.
    pub fn lookup(&self, location_id: LocationId) -> Option<WeatherObservation> {
        let snapshot = self.state.read();

        let bookmarked = snapshot
            .bookmarked_records
            .iter()
            .flatten()
            .filter(|record| record.location_id == location_id)
            .find_map(SingleLocationRecord::observation);

        bookmarked
            .or_else(|| {
                snapshot
                    .nearby_observations()
                    .iter()
                    .find(|obs| obs.location_id == location_id)
            })
            .cloned()
    }

    pub fn current_snapshot(&self) -> CacheSnapshot {
        self.state.read().clone()
    }

    pub fn bookmarked_locations(&self) -> Vec<Location> {
        self.state.read().bookmarked_locations.clone()
    }

    /// Observation of the first bookmarked location, shown on the app badge.
    pub fn preferred_observation(&self) -> Option<WeatherObservation> {
        let preferred = self
            .state
            .read()
            .bookmarked_locations
            .first()
            .map(|location| location.id)?;
        self.lookup(preferred)
    }

    /// Wall-clock time of the last committed refresh round, kept across restarts.
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_refreshed_at
    }

    /// True if there is anything to render, error records included.
    pub fn has_any_displayable_data(&self) -> bool {
        let snapshot = self.state.read();
        snapshot
            .bookmarked_records
            .as_ref()
            .is_some_and(|records| !records.is_empty())
            || snapshot.nearby_record.is_some()
    }

    /// True if at least one real observation is cached.
    pub fn has_any_weather_data(&self) -> bool {
        let snapshot = self.state.read();
        snapshot
            .bookmarked_records
            .iter()
            .flatten()
            .any(|record| record.outcome.is_success())
            || !snapshot.nearby_observations().is_empty()
    }

    /// True if any stored fetch failed because the API key was rejected.
    pub fn is_api_key_unauthorized(&self) -> bool {
        let snapshot = self.state.read();
        let bookmarked = snapshot
            .bookmarked_records
            .iter()
            .flatten()
            .filter_map(|record| record.outcome.error());
        let nearby = snapshot.nearby_record.iter().filter_map(FetchOutcome::error);

        bookmarked.chain(nearby).any(|err| err.is_unauthorized())
    }

    // =========== Observers ===========

    /// Register `observer` to run after every committed change.
    ///
    /// Observers run synchronously, in registration order, while the commit
    /// lock is held. They may read the store but must not mutate it.
    pub fn subscribe(&self, observer: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push((id, Arc::new(observer)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    // =========== Mutations ===========

    /// Replace the bookmarked location list. Existing records stay until the next fetch.
    pub fn set_bookmarked_locations(&self, locations: Vec<Location>) {
        tracing::info!("Bookmarked locations set to {} entries", locations.len());
        self.commit(false, |snapshot| {
            snapshot.bookmarked_locations = locations;
            true
        });
    }

    /// Merge one refresh round. Returns false, touching nothing, when the round obtained nothing.
    pub fn apply_round(&self, round: RoundResult) -> bool {
        if round.is_empty() {
            return false;
        }

        let RoundResult { bookmarked, nearby } = round;
        self.commit(true, |snapshot| {
            if !bookmarked.is_empty() {
                snapshot.bookmarked_records = Some(bookmarked);
            }
            if let Some(nearby) = nearby {
                snapshot.nearby_record = Some(nearby);
            }
            true
        })
    }

    /// Replace or insert the record for one location, keeping the others.
    ///
    /// Records end up in bookmark order; records for locations no longer
    /// bookmarked are dropped.
    pub fn upsert_bookmarked_record(&self, record: SingleLocationRecord) -> bool {
        self.commit(true, |snapshot| {
            let mut existing = snapshot.bookmarked_records.take().unwrap_or_default();
            existing.retain(|r| r.location_id != record.location_id);
            existing.push(record);

            let ordered: Vec<SingleLocationRecord> = snapshot
                .bookmarked_locations
                .iter()
                .filter_map(|location| {
                    existing
                        .iter()
                        .position(|r| r.location_id == location.id)
                        .map(|index| existing.swap_remove(index))
                })
                .collect();

            snapshot.bookmarked_records = Some(ordered);
            true
        })
    }

    /// Drop the nearby record. Returns false if there was none.
    pub fn clear_nearby(&self) -> bool {
        self.commit(false, |snapshot| snapshot.nearby_record.take().is_some())
    }

    fn commit(&self, refreshed: bool, mutate: impl FnOnce(&mut CacheSnapshot) -> bool) -> bool {
        let _commit = self.commit_lock.lock();

        let snapshot = {
            let mut state = self.state.write();
            if !mutate(&mut *state) {
                return false;
            }
            if refreshed {
                state.last_refreshed_at = Some(Utc::now());
            }
            state.clone()
        };

        self.persistence.save(&snapshot);
        self.notify();
        true
    }

    fn notify(&self) {
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        tracing::debug!("Weather cache updated, notifying {} observers", observers.len());
        for observer in observers {
            observer();
        }
    }
}
