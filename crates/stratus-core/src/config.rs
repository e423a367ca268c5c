use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

const APP_DIR_NAME: &str = "stratus";
const CONFIG_FILE_NAME: &str = "config.toml";
const API_KEY_ENV: &str = "STRATUS_API_KEY";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Temperature unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Translate a settings-picker row into a unit.
    pub fn from_index(index: usize) -> Result<Self, ConfigError> {
        match index {
            0 => Ok(Self::Celsius),
            1 => Ok(Self::Fahrenheit),
            2 => Ok(Self::Kelvin),
            _ => Err(ConfigError::Invalid(format!(
                "temperature unit index {} out of range",
                index
            ))),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }
}

/// Wind speed unit preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    #[default]
    MetersPerSecond,
    KilometersPerHour,
    MilesPerHour,
}

impl SpeedUnit {
    /// Translate a settings-picker row into a unit.
    pub fn from_index(index: usize) -> Result<Self, ConfigError> {
        match index {
            0 => Ok(Self::MetersPerSecond),
            1 => Ok(Self::KilometersPerHour),
            2 => Ok(Self::MilesPerHour),
            _ => Err(ConfigError::Invalid(format!(
                "speed unit index {} out of range",
                index
            ))),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::MetersPerSecond => "m/s",
            Self::KilometersPerHour => "km/h",
            Self::MilesPerHour => "mph",
        }
    }
}

/// How many nearby stations the bulk query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmountOfResults {
    #[default]
    Ten,
    Twenty,
    Thirty,
    Forty,
    Fifty,
}

impl AmountOfResults {
    /// Translate a settings-picker row into a result count.
    pub fn from_index(index: usize) -> Result<Self, ConfigError> {
        match index {
            0 => Ok(Self::Ten),
            1 => Ok(Self::Twenty),
            2 => Ok(Self::Thirty),
            3 => Ok(Self::Forty),
            4 => Ok(Self::Fifty),
            _ => Err(ConfigError::Invalid(format!(
                "result amount index {} out of range",
                index
            ))),
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            Self::Ten => 10,
            Self::Twenty => 20,
            Self::Thirty => 30,
            Self::Forty => 40,
            Self::Fifty => 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (also holds the weather cache)
    pub config_dir: PathBuf,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// OpenWeatherMap API key (can also be set via STRATUS_API_KEY)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the weather API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Refresh all weather data once at startup
    #[serde(default = "default_refresh_on_start")]
    pub refresh_on_start: bool,

    /// Global deadline for one refresh round, in seconds
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,

    /// Nearby stations requested by the bulk query
    #[serde(default)]
    pub nearby_results: AmountOfResults,

    /// Temperature unit preference
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Wind speed unit preference
    #[serde(default)]
    pub speed_unit: SpeedUnit,
}

fn default_api_base_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_refresh_on_start() -> bool {
    true
}

fn default_refresh_timeout_secs() -> u64 {
    60
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: default_api_base_url(),
            refresh_on_start: default_refresh_on_start(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            nearby_results: AmountOfResults::default(),
            temperature_unit: TemperatureUnit::default(),
            speed_unit: SpeedUnit::default(),
        }
    }
}

impl WeatherConfig {
    /// Check if an API key is configured (not a placeholder)
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|k| !k.trim().is_empty() && !k.starts_with("YOUR_"))
            .unwrap_or(false)
    }

    pub fn refresh_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.refresh_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);

        Self {
            config_dir,
            weather: WeatherConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the user config directory, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path, creating default if it doesn't exist
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            config
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.weather.api_key = Some(key);
            }
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(
            &self.weather.api_base_url,
            "weather.api_base_url",
            &mut result,
        );

        if self.weather.refresh_timeout_secs == 0 {
            result.add_error(
                "weather.refresh_timeout_secs",
                "Refresh timeout must be greater than 0",
            );
        } else if self.weather.refresh_timeout_secs > 600 {
            result.add_warning(
                "weather.refresh_timeout_secs",
                "Refresh timeout is more than 10 minutes",
            );
        }

        if !self.weather.has_api_key() {
            result.add_warning(
                "weather.api_key",
                "No API key configured - every fetch will be reported as unauthorized",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the user config directory
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the persisted weather cache snapshot
    pub fn weather_cache_path(&self) -> PathBuf {
        self.config_dir.join("weather_cache.json")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_missing_api_key_is_warning() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.api_key"));
    }

    #[test]
    fn test_placeholder_api_key_not_configured() {
        let mut weather = WeatherConfig::default();
        weather.api_key = Some("YOUR_API_KEY".to_string());
        assert!(!weather.has_api_key());
        weather.api_key = Some("abc123".to_string());
        assert!(weather.has_api_key());
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.api_base_url = "ftp://api.example.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_timeout_is_error() {
        let mut config = Config::default();
        config.weather.refresh_timeout_secs = 0;
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result
            .errors
            .iter()
            .any(|e| e.field == "weather.refresh_timeout_secs"));
    }

    #[test]
    fn test_default_timeout_is_sixty_seconds() {
        let weather = WeatherConfig::default();
        assert_eq!(weather.refresh_timeout(), std::time::Duration::from_secs(60));
    }

    #[test]
    fn test_index_translation_in_range() {
        assert_eq!(TemperatureUnit::from_index(1).unwrap(), TemperatureUnit::Fahrenheit);
        assert_eq!(SpeedUnit::from_index(2).unwrap(), SpeedUnit::MilesPerHour);
        assert_eq!(AmountOfResults::from_index(4).unwrap().count(), 50);
    }

    #[test]
    fn test_index_translation_out_of_range_is_config_error() {
        assert!(matches!(
            TemperatureUnit::from_index(3),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(SpeedUnit::from_index(9), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            AmountOfResults::from_index(5),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_creates_default_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let mut edited = created.clone();
        edited.weather.nearby_results = AmountOfResults::Thirty;
        edited.weather.refresh_on_start = false;
        edited.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.weather.nearby_results, AmountOfResults::Thirty);
        assert!(!reloaded.weather.refresh_on_start);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
