//! Refresh rounds: fan out one fetch per bookmarked location plus the nearby
//! query, wait under a global deadline, then merge into the cache once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use stratus_core::{AmountOfResults, WeatherConfig, WeatherError};
use tokio::task::{self, JoinHandle, JoinSet};

use crate::cache::{CacheStore, RoundResult};
use crate::gateway::{FetchGateway, LocationServices};
use crate::types::{
    BulkQuery, BulkRecord, FetchError, FetchOutcome, Location, LocationId, Reachability,
    SingleLocationRecord,
};

/// How a refresh round ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Offline; nothing was attempted.
    NotReachable,
    /// No fetch completed; the cache was left alone.
    NoData,
    /// Results were committed and observers notified.
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("Weather refresh timed out after {0:?}")]
    Timeout(Duration),
}

impl From<RefreshError> for WeatherError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Timeout(_) => WeatherError::Timeout,
        }
    }
}

#[derive(Debug)]
enum FetchResult {
    Single(SingleLocationRecord),
    Bulk(BulkRecord),
}

/// What a spawned fetch task was for, so a crashed task still yields a record.
#[derive(Debug, Clone, Copy)]
enum FetchTask {
    Single(LocationId),
    Bulk,
}

pub struct RefreshCoordinator {
    store: Arc<CacheStore>,
    gateway: Arc<dyn FetchGateway>,
    location_services: Arc<dyn LocationServices>,
    nearby_results: AmountOfResults,
    timeout: Duration,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("nearby_results", &self.nearby_results)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<CacheStore>,
        gateway: Arc<dyn FetchGateway>,
        location_services: Arc<dyn LocationServices>,
        config: &WeatherConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            location_services,
            nearby_results: config.nearby_results,
            timeout: config.refresh_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Refresh every bookmarked location and the nearby stations.
    ///
    /// Being offline is not an error. On timeout nothing gathered so far is
    /// committed, and fetches still in flight are left to finish unobserved.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        if self.gateway.reachability() != Reachability::Connected {
            tracing::info!("Skipping weather refresh: network not reachable");
            return Ok(RefreshOutcome::NotReachable);
        }

        let locations = self.store.bookmarked_locations();
        let bulk_query = self.bulk_query(&locations);

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for location in &locations {
            let gateway = Arc::clone(&self.gateway);
            let location_id = location.id;
            let handle = tasks.spawn(async move {
                let outcome = gateway.fetch_single(location_id).await;
                FetchResult::Single(SingleLocationRecord {
                    location_id,
                    outcome,
                })
            });
            spawned.insert(handle.id(), FetchTask::Single(location_id));
        }
        if let Some(query) = bulk_query {
            let gateway = Arc::clone(&self.gateway);
            let handle =
                tasks.spawn(async move { FetchResult::Bulk(gateway.fetch_bulk(&query).await) });
            spawned.insert(handle.id(), FetchTask::Bulk);
        }

        tracing::info!(
            "Refreshing weather for {} bookmarked locations{}",
            locations.len(),
            if bulk_query.is_some() { " and nearby stations" } else { "" }
        );

        let round = self.gather(tasks, &spawned, &locations).await?;
        if round.is_empty() {
            tracing::info!("Weather refresh obtained no results; cache unchanged");
            return Ok(RefreshOutcome::NoData);
        }

        self.store.apply_round(round);
        tracing::info!("Weather refresh committed");
        Ok(RefreshOutcome::Updated)
    }

    /// Refresh only the preferred (first bookmarked) location.
    ///
    /// Its record is merged in place; other records and the nearby record are kept.
    pub async fn refresh_preferred(&self) -> Result<RefreshOutcome, RefreshError> {
        if self.gateway.reachability() != Reachability::Connected {
            tracing::info!("Skipping preferred location refresh: network not reachable");
            return Ok(RefreshOutcome::NotReachable);
        }

        let Some(preferred) = self.store.bookmarked_locations().into_iter().next() else {
            return Ok(RefreshOutcome::NoData);
        };

        let gateway = Arc::clone(&self.gateway);
        let location_id = preferred.id;
        let handle = tokio::spawn(async move { gateway.fetch_single(location_id).await });

        match tokio::time::timeout(self.timeout, handle).await {
            Err(_) => {
                tracing::warn!("Preferred location refresh timed out after {:?}", self.timeout);
                Err(RefreshError::Timeout(self.timeout))
            }
            Ok(joined) => {
                let outcome = joined.unwrap_or_else(|e| {
                    tracing::warn!("Preferred location fetch task failed: {}", e);
                    FetchOutcome::Failure(task_failure(&e))
                });
                self.store.upsert_bookmarked_record(SingleLocationRecord {
                    location_id,
                    outcome,
                });
                Ok(RefreshOutcome::Updated)
            }
        }
    }

    /// Replace the bookmarked locations and start a refresh in the background.
    pub fn set_bookmarked_locations(
        self: &Arc<Self>,
        locations: Vec<Location>,
    ) -> JoinHandle<Result<RefreshOutcome, RefreshError>> {
        self.store.set_bookmarked_locations(locations);

        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let result = coordinator.refresh().await;
            if let Err(e) = &result {
                tracing::warn!("Refresh after bookmark change failed: {}", e);
            }
            result
        })
    }

    /// Centered on the device when its position is known, otherwise on the
    /// first bookmark. Nearby weather is never fetched without location permission.
    fn bulk_query(&self, locations: &[Location]) -> Option<BulkQuery> {
        if !self.location_services.is_authorized() {
            return None;
        }

        let center = self
            .location_services
            .current_coordinates()
            .or_else(|| locations.first().map(|l| l.coordinates))?;
        Some(BulkQuery {
            center,
            max_results: self.nearby_results.count(),
        })
    }

    async fn gather(
        &self,
        mut tasks: JoinSet<FetchResult>,
        spawned: &HashMap<task::Id, FetchTask>,
        order: &[Location],
    ) -> Result<RoundResult, RefreshError> {
        let mut singles = Vec::with_capacity(order.len());
        let mut nearby = None;

        let waited = tokio::time::timeout(self.timeout, async {
            while let Some(joined) = tasks.join_next_with_id().await {
                match joined {
                    Ok((_, FetchResult::Single(record))) => singles.push(record),
                    Ok((_, FetchResult::Bulk(record))) => nearby = Some(record),
                    Err(e) => {
                        tracing::warn!("Weather fetch task failed: {}", e);
                        let failure = task_failure(&e);
                        match spawned.get(&e.id()) {
                            Some(FetchTask::Single(location_id)) => {
                                singles.push(SingleLocationRecord {
                                    location_id: *location_id,
                                    outcome: FetchOutcome::Failure(failure),
                                })
                            }
                            Some(FetchTask::Bulk) => nearby = Some(FetchOutcome::Failure(failure)),
                            None => {}
                        }
                    }
                }
            }
        })
        .await;

        if waited.is_err() {
            // Late results land in the detached tasks and are dropped there
            tasks.detach_all();
            tracing::warn!(
                "Weather refresh timed out after {:?}; discarding {} partial results",
                self.timeout,
                singles.len() + usize::from(nearby.is_some())
            );
            return Err(RefreshError::Timeout(self.timeout));
        }

        let bookmarked = order
            .iter()
            .filter_map(|location| {
                singles
                    .iter()
                    .position(|r| r.location_id == location.id)
                    .map(|index| singles.swap_remove(index))
            })
            .collect();

        Ok(RoundResult { bookmarked, nearby })
    }
}

/// Record stored for a fetch whose task panicked or was cancelled.
fn task_failure(err: &task::JoinError) -> FetchError {
    FetchError::new(0, format!("weather fetch did not complete: {}", err))
}
