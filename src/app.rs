use anyhow::Result;
use std::sync::Arc;

use stratus_core::{AppError, Config, WeatherError};
use stratus_weather::{
    AppEvent, CacheStore, JsonFileStore, LifecycleGuard, NoLocationServices, OpenWeatherProvider,
    ReachabilityMonitor, RefreshCoordinator, RefreshOutcome, SubscriptionId,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LIFECYCLE_CHANNEL_CAPACITY: usize = 16;

/// Wires the weather engine together and owns its background tasks
pub struct App {
    config: Arc<Config>,
    persistence: Arc<JsonFileStore>,
    store: Arc<CacheStore>,
    coordinator: Arc<RefreshCoordinator>,
    lifecycle_tx: broadcast::Sender<AppEvent>,
    shutdown: CancellationToken,
    watcher: Option<JoinHandle<()>>,
    log_subscription: SubscriptionId,
}

impl App {
    /// Create a new application instance.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Result<Self> {
        let (config, _) = Config::load_validated()?;
        let config = Arc::new(config);

        let reachability = ReachabilityMonitor::default();
        let provider =
            OpenWeatherProvider::new(&config.weather, reachability).map_err(AppError::from)?;

        let cache_path = config.weather_cache_path();
        tracing::info!("Using weather cache at {}", cache_path.display());
        let persistence = Arc::new(JsonFileStore::open(cache_path).map_err(AppError::from)?);
        let store = Arc::new(CacheStore::open(persistence.clone()));

        let log_store = Arc::downgrade(&store);
        let log_subscription = store.subscribe(move || {
            if let Some(store) = log_store.upgrade() {
                tracing::debug!(
                    "Weather cache changed (unauthorized: {})",
                    store.is_api_key_unauthorized()
                );
            }
        });

        let location_services = Arc::new(NoLocationServices);
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            Arc::new(provider),
            location_services,
            &config.weather,
        ));

        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            persistence,
            store,
            coordinator,
            lifecycle_tx,
            shutdown: CancellationToken::new(),
            watcher: None,
            log_subscription,
        })
    }

    /// Start the lifecycle watcher and report the app as active
    pub fn initialize(&mut self) {
        let guard = Arc::new(LifecycleGuard::new(
            self.store.clone(),
            Arc::new(NoLocationServices),
        ));
        let events = self.lifecycle_tx.subscribe();
        self.watcher = Some(tokio::spawn(guard.watch(events, self.shutdown.clone())));

        self.send_event(AppEvent::BecameActive);
        tracing::info!("Application initialized successfully");
    }

    pub fn send_event(&self, event: AppEvent) {
        if self.lifecycle_tx.send(event).is_err() {
            tracing::debug!("No lifecycle watcher for {:?}", event);
        }
    }

    /// Run one full refresh round and log how it ended
    pub async fn refresh(&self) -> Option<RefreshOutcome> {
        match self.coordinator.refresh().await {
            Ok(RefreshOutcome::NotReachable) => {
                tracing::info!("{}", WeatherError::NotReachable.user_message());
                Some(RefreshOutcome::NotReachable)
            }
            Ok(outcome) => {
                tracing::info!("Refresh finished: {:?}", outcome);
                Some(outcome)
            }
            Err(e) => {
                let err = AppError::from(WeatherError::from(e));
                tracing::warn!("{} ({})", err.user_message(), err);
                None
            }
        }
    }

    /// Print what the cache currently holds
    pub fn print_summary(&self) {
        let weather = &self.config.weather;
        let snapshot = self.store.current_snapshot();

        if let Some(preferred) = self.store.preferred_observation() {
            println!(
                "\nNow in {}: {:.0}{}",
                preferred.location_name,
                preferred.temperature_in(weather.temperature_unit),
                weather.temperature_unit.symbol()
            );
        }

        println!("\nBookmarked locations:");
        for location in &snapshot.bookmarked_locations {
            match self.store.lookup(location.id) {
                Some(observation) => println!(
                    "  {:<20} {:>6.1}{}  wind {:.1} {}  {}",
                    location.name,
                    observation.temperature_in(weather.temperature_unit),
                    weather.temperature_unit.symbol(),
                    observation.wind_speed_in(weather.speed_unit),
                    weather.speed_unit.symbol(),
                    observation.condition.description()
                ),
                None => {
                    let failure = snapshot
                        .bookmarked_records
                        .iter()
                        .flatten()
                        .find(|record| record.location_id == location.id)
                        .and_then(|record| record.outcome.error());
                    match failure {
                        Some(err) => println!(
                            "  {:<20} {}",
                            location.name,
                            WeatherError::from_status(err.status_code, err.message.clone())
                                .user_message()
                        ),
                        None => println!("  {:<20} no data", location.name),
                    }
                }
            }
        }

        let nearby = snapshot.nearby_observations();
        if !nearby.is_empty() {
            println!("\nNearby stations: {}", nearby.len());
        }

        match self.store.last_refreshed_at() {
            Some(at) => println!("\nLast refreshed: {}", at.to_rfc3339()),
            None => println!("\nNever refreshed"),
        }

        if self.store.is_api_key_unauthorized() {
            println!("The weather API rejected the configured key; check weather.api_key");
        } else if !self.store.has_any_displayable_data() {
            println!("No weather data available yet");
        }
    }

    /// Stop background tasks and wait for pending cache writes
    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("Shutting down application");

        self.shutdown.cancel();
        if let Some(watcher) = self.watcher.take() {
            if let Err(e) = watcher.await {
                tracing::error!("Lifecycle watcher ended abnormally: {}", e);
            }
        }

        self.store.unsubscribe(self.log_subscription);
        self.persistence.flush().await;
        Ok(())
    }

    /// Get reference to application config
    pub fn config(&self) -> &Config {
        &self.config
    }
}
