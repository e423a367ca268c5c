//! Weather refresh-and-cache engine for Stratus
//!
//! Fetches current weather for bookmarked locations and nearby stations,
//! merges the results into a persisted cache and notifies observers.

pub mod background;
pub mod cache;
pub mod coordinator;
pub mod gateway;
pub mod lifecycle;
pub mod persistence;
pub mod provider;
pub mod retry;
pub mod types;

pub use background::{perform_background_fetch, BackgroundFetchResult};
pub use cache::{CacheStore, RoundResult, SubscriptionId};
pub use coordinator::{RefreshCoordinator, RefreshError, RefreshOutcome};
pub use gateway::{FetchGateway, LocationServices, NoLocationServices, ReachabilityMonitor};
pub use lifecycle::{AppEvent, LifecycleGuard};
pub use persistence::{JsonFileStore, MemorySnapshotStore, SnapshotStore};
pub use provider::OpenWeatherProvider;
pub use types::*;
