//! Drops nearby weather when the user revokes location permission.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::gateway::LocationServices;

/// Host application lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    BecameActive,
    EnteredBackground,
}

pub struct LifecycleGuard {
    store: Arc<CacheStore>,
    location_services: Arc<dyn LocationServices>,
}

impl std::fmt::Debug for LifecycleGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleGuard").finish_non_exhaustive()
    }
}

impl LifecycleGuard {
    pub fn new(store: Arc<CacheStore>, location_services: Arc<dyn LocationServices>) -> Self {
        Self {
            store,
            location_services,
        }
    }

    /// Check permission after the app came to the foreground.
    ///
    /// Returns true if the nearby record was cleared.
    pub fn app_became_active(&self) -> bool {
        if self.location_services.is_authorized() {
            return false;
        }

        let cleared = self.store.clear_nearby();
        if cleared {
            tracing::info!("Location permission not granted; cleared nearby weather");
        }
        cleared
    }

    /// Handle lifecycle events until the channel closes or `shutdown` fires.
    pub async fn watch(
        self: Arc<Self>,
        mut events: broadcast::Receiver<AppEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(AppEvent::BecameActive) => {
                        self.app_became_active();
                    }
                    Ok(AppEvent::EnteredBackground) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed signals collapse into one check
                        tracing::debug!("Lifecycle watcher lagged by {} events", skipped);
                        self.app_became_active();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        tracing::debug!("Lifecycle watcher stopped");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::cache::RoundResult;
    use crate::persistence::MemorySnapshotStore;
    use crate::types::{CacheSnapshot, Coordinates, FetchOutcome, Location};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TogglePermission(AtomicBool);

    impl LocationServices for TogglePermission {
        fn is_authorized(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn current_coordinates(&self) -> Option<Coordinates> {
            None
        }
    }

    fn store_with_nearby() -> Arc<CacheStore> {
        let store = Arc::new(CacheStore::with_snapshot(
            CacheSnapshot::with_locations(vec![Location::seed()]),
            Arc::new(MemorySnapshotStore::new()),
        ));
        store.apply_round(RoundResult {
            bookmarked: vec![],
            nearby: Some(FetchOutcome::Success(vec![])),
        });
        store
    }

    #[test]
    fn granted_permission_keeps_nearby() {
        let store = store_with_nearby();
        let guard = LifecycleGuard::new(
            store.clone(),
            Arc::new(TogglePermission(AtomicBool::new(true))),
        );

        assert!(!guard.app_became_active());
        assert!(store.current_snapshot().nearby_record.is_some());
    }

    #[test]
    fn revoked_permission_clears_once() {
        let store = store_with_nearby();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let guard = LifecycleGuard::new(
            store.clone(),
            Arc::new(TogglePermission(AtomicBool::new(false))),
        );

        assert!(guard.app_became_active());
        assert!(!guard.app_became_active());
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn watch_reacts_to_became_active() {
        let store = store_with_nearby();
        let guard = Arc::new(LifecycleGuard::new(
            store.clone(),
            Arc::new(TogglePermission(AtomicBool::new(false))),
        ));
        let (tx, rx) = broadcast::channel(4);
        let shutdown = CancellationToken::new();
        let watcher = tokio::spawn(guard.watch(rx, shutdown.clone()));

        tx.send(AppEvent::EnteredBackground).unwrap();
        tx.send(AppEvent::BecameActive).unwrap();
        drop(tx);
        watcher.await.unwrap();

        assert!(store.current_snapshot().nearby_record.is_none());
    }
}
