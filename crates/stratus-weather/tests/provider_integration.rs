//! Integration tests for OpenWeatherProvider using wiremock.
//!
//! These tests verify request shape and error mapping against a mock HTTP server.

#![allow(clippy::unwrap_used)]

use stratus_core::WeatherConfig;
use stratus_weather::retry::RetryConfig;
use stratus_weather::{
    BulkQuery, Coordinates, FetchGateway, OpenWeatherProvider, ReachabilityMonitor,
    WeatherCondition,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a current-weather payload
fn station(id: u64, name: &str, temp: f64, code: i32) -> serde_json::Value {
    serde_json::json!({
        "coord": { "lon": 7.68, "lat": 45.07 },
        "weather": [{ "id": code, "main": "Weather", "description": "test weather" }],
        "main": { "temp": temp, "feels_like": temp - 2.0, "pressure": 1012, "humidity": 70 },
        "wind": { "speed": 3.1, "deg": 200 },
        "clouds": { "all": 40 },
        "dt": 1_790_000_000,
        "id": id,
        "name": name
    })
}

fn provider(server: &MockServer, retry: RetryConfig) -> OpenWeatherProvider {
    let config = WeatherConfig {
        api_key: Some("test-key".to_string()),
        api_base_url: server.uri(),
        ..WeatherConfig::default()
    };
    OpenWeatherProvider::new(&config, ReachabilityMonitor::default())
        .unwrap()
        .with_retry_config(retry)
}

#[tokio::test]
async fn test_fetch_single_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("id", "3165524"))
        .and(query_param("appid", "test-key"))
        .and(query_param("units", "metric"))
        .respond_with(ResponseTemplate::new(200).set_body_json(station(3165524, "Turin", 14.5, 500)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::disabled());
    let outcome = provider.fetch_single(3165524).await;

    let observation = outcome.success().unwrap();
    assert_eq!(observation.location_id, 3165524);
    assert_eq!(observation.location_name, "Turin");
    assert_eq!(observation.temperature, 14.5);
    assert_eq!(observation.humidity, 70);
    assert_eq!(observation.condition, WeatherCondition::Rain);
}

#[tokio::test]
async fn test_fetch_bulk_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/find"))
        .and(query_param("lat", "45.07"))
        .and(query_param("lon", "7.68"))
        .and(query_param("cnt", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": "accurate",
            "cod": "200",
            "count": 2,
            "list": [
                station(1, "Near", 10.0, 800),
                station(2, "Far", 11.0, 804),
            ]
        })))
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::disabled());
    let query = BulkQuery {
        center: Coordinates {
            latitude: 45.07,
            longitude: 7.68,
        },
        max_results: 20,
    };
    let outcome = provider.fetch_bulk(&query).await;

    let stations = outcome.success().unwrap();
    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].location_name, "Near");
    assert_eq!(stations[1].condition, WeatherCondition::Cloudy);
}

#[tokio::test]
async fn test_unauthorized_keeps_api_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "cod": 401,
            "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info."
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::default());
    let outcome = provider.fetch_single(1).await;

    let err = outcome.error().unwrap();
    assert!(err.is_unauthorized());
    assert!(err.message.starts_with("Invalid API key"));
}

#[tokio::test]
async fn test_unknown_city_is_failure_record() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404",
            "message": "city not found"
        })))
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::disabled());
    let err = provider.fetch_single(42).await.error().cloned().unwrap();

    assert_eq!(err.status_code, 404);
    assert_eq!(err.message, "city not found");
}

#[tokio::test]
async fn test_server_error_retried_then_reported() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::new(1, 0, 0));
    let err = provider.fetch_single(7).await.error().cloned().unwrap();

    assert_eq!(err.status_code, 503);
    assert_eq!(err.message, "Service Unavailable");
}

#[tokio::test]
async fn test_server_error_recovers_on_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(station(7, "Retry", 9.0, 800)))
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::new(2, 0, 0));
    let outcome = provider.fetch_single(7).await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_malformed_body_is_failure_record() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let provider = provider(&mock_server, RetryConfig::disabled());
    let outcome = provider.fetch_single(7).await;

    assert!(!outcome.is_success());
    assert!(!outcome.error().unwrap().is_unauthorized());
}
