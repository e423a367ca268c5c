//! Centralized error types for Stratus.
//!
//! This module provides a typed error hierarchy that:
//! - Separates per-record fetch failures from round-level refresh failures
//! - Provides user-friendly messages suitable for UI display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// HTTP status the weather API uses for a rejected or missing API key.
pub const UNAUTHORIZED_STATUS: u16 = 401;

/// Top-level application error type.
///
/// Use `user_message()` to get a UI-appropriate message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Persistence(e) => e.user_message(),
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Client setup failed: {0}")]
    ClientSetup(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
            NetworkError::ClientSetup(_) => "Networking could not be initialized.",
        }
    }

    /// Status code to store on a failed record; 0 when the request never got a response.
    pub fn status_code(&self) -> u16 {
        match self {
            NetworkError::ServerError { status, .. } => *status,
            _ => 0,
        }
    }
}

/// Configuration errors.
///
/// File-level failures go through `anyhow` with context; this covers values
/// that parse but are out of range.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Weather errors as shown to the user.
///
/// Per-location failures are stored in the cache as data and mapped here with
/// `from_status` when displayed.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network not reachable")]
    NotReachable,

    #[error("Weather API error: {status} - {message}")]
    Fetch { status: u16, message: String },

    #[error("Invalid API key")]
    Unauthorized,

    #[error("Weather refresh timed out")]
    Timeout,
}

impl WeatherError {
    /// Build the error for a failed fetch, promoting 401 to `Unauthorized`.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == UNAUTHORIZED_STATUS {
            WeatherError::Unauthorized
        } else {
            WeatherError::Fetch {
                status,
                message: message.into(),
            }
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::NotReachable => "You're offline. Showing the last known weather.",
            WeatherError::Fetch { .. } => "Weather unavailable for this location.",
            WeatherError::Unauthorized => "Weather API key is invalid. Check settings.",
            WeatherError::Timeout => "Updating weather took too long. Please try again.",
        }
    }
}

/// Snapshot storage errors. Never propagated into the in-memory cache path.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read snapshot: {0}")]
    Read(String),

    #[error("Failed to write snapshot: {0}")]
    Write(String),

    #[error("Snapshot is corrupt: {0}")]
    Corrupt(String),
}

impl PersistenceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PersistenceError::Read(_) => "Saved weather could not be loaded.",
            PersistenceError::Write(_) => "Weather could not be saved.",
            PersistenceError::Corrupt(_) => "Saved weather was unreadable and has been reset.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if self.is_builder() {
            NetworkError::ClientSetup(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
