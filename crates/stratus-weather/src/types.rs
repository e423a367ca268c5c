use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratus_core::error::UNAUTHORIZED_STATUS;
use stratus_core::{SpeedUnit, TemperatureUnit};

/// Identifier the weather API assigns to a city or station.
pub type LocationId = u64;

/// Weather condition categories mapped from OpenWeatherMap condition codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    #[default]
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    Sleet,
    Thunderstorm,
}

impl WeatherCondition {
    /// Convert an OpenWeatherMap condition code to WeatherCondition
    /// See: https://openweathermap.org/weather-conditions
    pub fn from_owm_code(code: i32) -> Self {
        match code {
            200..=232 => Self::Thunderstorm,
            300..=321 => Self::Drizzle,
            500 | 501 | 520 | 521 => Self::Rain,
            502..=504 | 522 | 531 => Self::HeavyRain,
            511 => Self::Sleet, // Freezing rain
            611..=616 => Self::Sleet,
            600..=622 => Self::Snow,
            701..=781 => Self::Fog,
            800 => Self::Clear,
            801 | 802 => Self::PartlyCloudy,
            803 | 804 => Self::Cloudy,
            _ => Self::Clear,
        }
    }

    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::Sleet => "Sleet",
            Self::Thunderstorm => "Thunderstorm",
        }
    }
}

/// Geographic coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A bookmarked location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub country_code: String,
    pub coordinates: Coordinates,
}

impl Location {
    /// Location bookmarked on first run.
    pub fn seed() -> Self {
        Self {
            id: 2_950_159,
            name: "Berlin".to_string(),
            country_code: "DE".to_string(),
            coordinates: Coordinates {
                latitude: 52.524_37,
                longitude: 13.410_53,
            },
        }
    }
}

/// Current conditions reported for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub location_id: LocationId,
    pub location_name: String,
    pub coordinates: Coordinates,
    /// Degrees Celsius
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    /// Hectopascal
    pub pressure: f64,
    /// Meters per second
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub cloud_coverage: u8,
    pub condition_code: i32,
    pub condition: WeatherCondition,
    pub description: String,
    pub observed_at: DateTime<Utc>,
}

impl WeatherObservation {
    pub fn temperature_in(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.temperature,
            TemperatureUnit::Fahrenheit => self.temperature * 9.0 / 5.0 + 32.0,
            TemperatureUnit::Kelvin => self.temperature + 273.15,
        }
    }

    pub fn wind_speed_in(&self, unit: SpeedUnit) -> f64 {
        match unit {
            SpeedUnit::MetersPerSecond => self.wind_speed,
            SpeedUnit::KilometersPerHour => self.wind_speed * 3.6,
            SpeedUnit::MilesPerHour => self.wind_speed * 2.236_936,
        }
    }
}

/// Error stored in place of a payload when a fetch fails.
///
/// `status_code` is the HTTP status, or 0 when no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{status_code}: {message}")]
pub struct FetchError {
    pub status_code: u16,
    pub message: String,
}

impl FetchError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code == UNAUTHORIZED_STATUS
    }
}

/// Result of one completed fetch: a payload or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum FetchOutcome<T> {
    Success(T),
    Failure(FetchError),
}

impl<T> FetchOutcome<T> {
    pub fn success(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(err) => Some(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl<T> From<Result<T, FetchError>> for FetchOutcome<T> {
    fn from(result: Result<T, FetchError>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Failure(err),
        }
    }
}

/// Fetch result for one bookmarked location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleLocationRecord {
    pub location_id: LocationId,
    pub outcome: FetchOutcome<WeatherObservation>,
}

impl SingleLocationRecord {
    pub fn observation(&self) -> Option<&WeatherObservation> {
        self.outcome.success()
    }
}

/// Fetch result for the whole nearby query
pub type BulkRecord = FetchOutcome<Vec<WeatherObservation>>;

/// Criteria for the nearby (bulk) query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkQuery {
    pub center: Coordinates,
    pub max_results: u32,
}

/// Network status as reported by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Connected,
    Disconnected,
}

/// The persisted cache state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub bookmarked_locations: Vec<Location>,
    #[serde(default)]
    pub bookmarked_records: Option<Vec<SingleLocationRecord>>,
    #[serde(default)]
    pub nearby_record: Option<BulkRecord>,
    /// Set by every committed refresh round
    #[serde(default)]
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl CacheSnapshot {
    /// First-run state: the seed location and nothing fetched yet.
    pub fn seeded() -> Self {
        Self::with_locations(vec![Location::seed()])
    }

    pub fn with_locations(bookmarked_locations: Vec<Location>) -> Self {
        Self {
            bookmarked_locations,
            bookmarked_records: None,
            nearby_record: None,
            last_refreshed_at: None,
        }
    }

    pub fn nearby_observations(&self) -> &[WeatherObservation] {
        self.nearby_record
            .as_ref()
            .and_then(FetchOutcome::success)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn observation(id: LocationId, temperature: f64, wind_speed: f64) -> WeatherObservation {
        WeatherObservation {
            location_id: id,
            location_name: "Test".to_string(),
            coordinates: Coordinates {
                latitude: 0.0,
                longitude: 0.0,
            },
            temperature,
            feels_like: temperature,
            humidity: 50,
            pressure: 1013.0,
            wind_speed,
            wind_direction: None,
            cloud_coverage: 0,
            condition_code: 800,
            condition: WeatherCondition::Clear,
            description: "clear sky".to_string(),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_owm_code_thunderstorm() {
        assert_eq!(WeatherCondition::from_owm_code(200), WeatherCondition::Thunderstorm);
        assert_eq!(WeatherCondition::from_owm_code(232), WeatherCondition::Thunderstorm);
    }

    #[test]
    fn test_owm_code_drizzle() {
        assert_eq!(WeatherCondition::from_owm_code(300), WeatherCondition::Drizzle);
        assert_eq!(WeatherCondition::from_owm_code(321), WeatherCondition::Drizzle);
    }

    #[test]
    fn test_owm_code_rain() {
        assert_eq!(WeatherCondition::from_owm_code(500), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_code(521), WeatherCondition::Rain);
        assert_eq!(WeatherCondition::from_owm_code(502), WeatherCondition::HeavyRain);
        assert_eq!(WeatherCondition::from_owm_code(531), WeatherCondition::HeavyRain);
    }

    #[test]
    fn test_owm_code_frozen() {
        assert_eq!(WeatherCondition::from_owm_code(511), WeatherCondition::Sleet);
        assert_eq!(WeatherCondition::from_owm_code(613), WeatherCondition::Sleet);
        assert_eq!(WeatherCondition::from_owm_code(600), WeatherCondition::Snow);
        assert_eq!(WeatherCondition::from_owm_code(622), WeatherCondition::Snow);
    }

    #[test]
    fn test_owm_code_clouds_and_atmosphere() {
        assert_eq!(WeatherCondition::from_owm_code(741), WeatherCondition::Fog);
        assert_eq!(WeatherCondition::from_owm_code(800), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_code(802), WeatherCondition::PartlyCloudy);
        assert_eq!(WeatherCondition::from_owm_code(804), WeatherCondition::Cloudy);
    }

    #[test]
    fn test_owm_code_unknown_defaults_to_clear() {
        assert_eq!(WeatherCondition::from_owm_code(999), WeatherCondition::Clear);
        assert_eq!(WeatherCondition::from_owm_code(-1), WeatherCondition::Clear);
    }

    #[test]
    fn test_unit_conversions() {
        let obs = observation(1, 20.0, 10.0);
        assert!((obs.temperature_in(TemperatureUnit::Fahrenheit) - 68.0).abs() < 1e-9);
        assert!((obs.temperature_in(TemperatureUnit::Kelvin) - 293.15).abs() < 1e-9);
        assert!((obs.wind_speed_in(SpeedUnit::KilometersPerHour) - 36.0).abs() < 1e-9);
        assert!((obs.wind_speed_in(SpeedUnit::MilesPerHour) - 22.369_36).abs() < 1e-6);
    }

    #[test]
    fn test_fetch_error_unauthorized() {
        assert!(FetchError::new(401, "Invalid API key").is_unauthorized());
        assert!(!FetchError::new(404, "city not found").is_unauthorized());
    }

    #[test]
    fn test_outcome_accessors() {
        let ok: FetchOutcome<u8> = Ok(3).into();
        assert_eq!(ok.success(), Some(&3));
        assert!(ok.error().is_none());

        let failed: FetchOutcome<u8> = Err(FetchError::new(500, "boom")).into();
        assert!(failed.success().is_none());
        assert_eq!(failed.error().unwrap().status_code, 500);
    }

    #[test]
    fn test_snapshot_without_records_deserializes() {
        let json = serde_json::json!({
            "bookmarked_locations": [Location::seed()]
        });
        let snapshot: CacheSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(snapshot, CacheSnapshot::seeded());
    }

    #[test]
    fn test_nearby_observations_empty_on_failure() {
        let mut snapshot = CacheSnapshot::seeded();
        snapshot.nearby_record = Some(FetchOutcome::Failure(FetchError::new(401, "nope")));
        assert!(snapshot.nearby_observations().is_empty());

        snapshot.nearby_record = Some(FetchOutcome::Success(vec![observation(7, 1.0, 1.0)]));
        assert_eq!(snapshot.nearby_observations().len(), 1);
    }
}
