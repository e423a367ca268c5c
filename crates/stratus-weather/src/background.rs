//! Entry point for OS-scheduled background refreshes.

use std::time::Duration;

use crate::coordinator::{RefreshCoordinator, RefreshOutcome};

/// What the host scheduler is told after a background refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundFetchResult {
    NewData,
    NoData,
    Failed,
}

impl From<RefreshOutcome> for BackgroundFetchResult {
    fn from(outcome: RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Updated => Self::NewData,
            RefreshOutcome::NotReachable | RefreshOutcome::NoData => Self::NoData,
        }
    }
}

/// Refresh the preferred location within the host's `allotted` window.
pub async fn perform_background_fetch(
    coordinator: &RefreshCoordinator,
    allotted: Duration,
) -> BackgroundFetchResult {
    let window = allotted.min(coordinator.timeout());

    let result = match tokio::time::timeout(window, coordinator.refresh_preferred()).await {
        Ok(Ok(outcome)) => outcome.into(),
        Ok(Err(e)) => {
            tracing::warn!("Background refresh failed: {}", e);
            BackgroundFetchResult::Failed
        }
        Err(_) => {
            tracing::warn!("Background refresh exceeded its {:?} window", window);
            BackgroundFetchResult::Failed
        }
    };

    tracing::info!("Background refresh finished: {:?}", result);
    result
}
