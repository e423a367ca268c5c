//! Seams to the collaborators the refresh engine calls out to: the weather
//! API, the transport's reachability signal and the platform location service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{
    BulkQuery, Coordinates, FetchOutcome, LocationId, Reachability, WeatherObservation,
};

/// Source of weather observations.
///
/// Implementations report failures as `FetchOutcome::Failure` rather than
/// returning an error, so one failed location never aborts a round.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// Current weather for one location.
    async fn fetch_single(&self, location_id: LocationId) -> FetchOutcome<WeatherObservation>;

    /// Current weather for the stations around `query.center`.
    async fn fetch_bulk(&self, query: &BulkQuery) -> FetchOutcome<Vec<WeatherObservation>>;

    fn reachability(&self) -> Reachability;
}

/// Platform location permission and position.
pub trait LocationServices: Send + Sync {
    fn is_authorized(&self) -> bool;

    /// Last known device position, `None` if unknown or not authorized.
    fn current_coordinates(&self) -> Option<Coordinates>;
}

/// Shared connectivity flag, updated by whatever watches the network.
#[derive(Debug, Clone)]
pub struct ReachabilityMonitor {
    connected: Arc<AtomicBool>,
}

impl ReachabilityMonitor {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(connected)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        if previous != connected {
            tracing::info!("Network reachability changed: connected={}", connected);
        }
    }

    pub fn status(&self) -> Reachability {
        if self.connected.load(Ordering::SeqCst) {
            Reachability::Connected
        } else {
            Reachability::Disconnected
        }
    }
}

impl Default for ReachabilityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Location services for hosts without a positioning backend: never authorized.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocationServices;

impl LocationServices for NoLocationServices {
    fn is_authorized(&self) -> bool {
        false
    }

    fn current_coordinates(&self) -> Option<Coordinates> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_clones_share_state() {
        let monitor = ReachabilityMonitor::default();
        let handle = monitor.clone();
        assert_eq!(monitor.status(), Reachability::Connected);

        handle.set_connected(false);
        assert_eq!(monitor.status(), Reachability::Disconnected);
    }

    #[test]
    fn no_location_services_is_unauthorized() {
        let services = NoLocationServices;
        assert!(!services.is_authorized());
        assert!(services.current_coordinates().is_none());
    }

    #[test]
    fn gateway_trait_is_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn FetchGateway>();
        assert_send_sync::<dyn LocationServices>();
    }
}
