//! OpenWeatherMap implementation of [`FetchGateway`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stratus_core::error::UNAUTHORIZED_STATUS;
use stratus_core::{NetworkError, ReqwestErrorExt, WeatherConfig};
use url::Url;

use crate::gateway::{FetchGateway, ReachabilityMonitor};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{
    BulkQuery, Coordinates, FetchError, FetchOutcome, LocationId, Reachability,
    WeatherCondition, WeatherObservation,
};

const REQUEST_TIMEOUT_SECS: u64 = 15;
const USER_AGENT: &str = concat!("Stratus/", env!("CARGO_PKG_VERSION"));
const UNITS: &str = "metric";

#[derive(Debug, Deserialize)]
struct OwmCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    id: i32,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    humidity: u8,
}

#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OwmClouds {
    #[serde(default)]
    all: u8,
}

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    id: LocationId,
    #[serde(default)]
    name: String,
    coord: OwmCoord,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    clouds: OwmClouds,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct OwmFind {
    #[serde(default)]
    list: Vec<OwmCurrent>,
}

#[derive(Debug, Deserialize)]
struct OwmErrorBody {
    message: Option<String>,
}

impl OwmCurrent {
    fn into_observation(self) -> WeatherObservation {
        let (condition_code, description) = self
            .weather
            .into_iter()
            .next()
            .map(|c| (c.id, c.description))
            .unwrap_or((800, String::new()));

        WeatherObservation {
            location_id: self.id,
            location_name: self.name,
            coordinates: Coordinates {
                latitude: self.coord.lat,
                longitude: self.coord.lon,
            },
            temperature: self.main.temp,
            feels_like: self.main.feels_like.unwrap_or(self.main.temp),
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            cloud_coverage: self.clouds.all,
            condition_code,
            condition: WeatherCondition::from_owm_code(condition_code),
            description,
            observed_at: DateTime::<Utc>::from_timestamp(self.dt, 0).unwrap_or_else(Utc::now),
        }
    }
}

impl From<NetworkError> for FetchError {
    fn from(err: NetworkError) -> Self {
        FetchError::new(err.status_code(), err.to_string())
    }
}

/// Weather API client over HTTP.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    client: Arc<Client>,
    base_url: Url,
    api_key: Option<String>,
    retry: RetryConfig,
    reachability: ReachabilityMonitor,
}

impl OpenWeatherProvider {
    pub fn new(config: &WeatherConfig, reachability: ReachabilityMonitor) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(ReqwestErrorExt::into_network_error)?;

        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| NetworkError::ClientSetup(format!("invalid API base URL: {}", e)))?;

        let api_key = config.has_api_key().then(|| config.api_key.clone()).flatten();

        Ok(Self {
            client: Arc::new(client),
            base_url,
            api_key,
            retry: RetryConfig::default(),
            reachability,
        })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| FetchError::new(UNAUTHORIZED_STATUS, "missing API key"))?;

        let url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::new(0, format!("invalid request URL: {}", e)))?;

        let response = with_retry(&self.retry, || {
            self.client
                .get(url.clone())
                .query(query)
                .query(&[("appid", api_key), ("units", UNITS)])
                .send()
        })
        .await
        .map_err(|e| FetchError::from(e.into_network_error()))?;

        let status = response.status();
        if !status.is_success() {
            // The API puts a human-readable reason in `message`
            let message = response
                .json::<OwmErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            tracing::debug!("Weather API {} returned {}: {}", path, status, message);
            return Err(FetchError::new(status.as_u16(), message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::from(e.into_network_error()))
    }
}

#[async_trait]
impl FetchGateway for OpenWeatherProvider {
    async fn fetch_single(&self, location_id: LocationId) -> FetchOutcome<WeatherObservation> {
        tracing::debug!("Fetching weather for location {}", location_id);
        self.get_json::<OwmCurrent>("data/2.5/weather", &[("id", location_id.to_string())])
            .await
            .map(OwmCurrent::into_observation)
            .into()
    }

    async fn fetch_bulk(&self, query: &BulkQuery) -> FetchOutcome<Vec<WeatherObservation>> {
        tracing::debug!(
            "Fetching {} nearby stations around {:.3}, {:.3}",
            query.max_results,
            query.center.latitude,
            query.center.longitude
        );
        self.get_json::<OwmFind>(
            "data/2.5/find",
            &[
                ("lat", query.center.latitude.to_string()),
                ("lon", query.center.longitude.to_string()),
                ("cnt", query.max_results.to_string()),
            ],
        )
        .await
        .map(|found| {
            found
                .list
                .into_iter()
                .map(OwmCurrent::into_observation)
                .collect()
        })
        .into()
    }

    fn reachability(&self) -> Reachability {
        self.reachability.status()
    }
}
