//! Error types and handling for Helios
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Helios operations
pub type Result<T> = std::result::Result<T, HeliosError>;

/// Main error type for Helios
#[derive(Debug, Error)]
pub enum HeliosError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A job action was invoked before its configuration arrived
    #[error("Configuration missing: {message}")]
    ConfigMissing { message: String },

    /// Upstream fetch failures (HTTP transport, subprocess, source errors)
    #[error("Fetch error: {message}")]
    Fetch { message: String, retriable: bool },

    /// The price series has no sample at or before the queried instant
    #[error("No current price data available")]
    NoCurrentData,

    /// The price series has no sample on the local calendar day
    #[error("No price data for today")]
    NoTodayData,

    /// Cache file unreadable, unwritable, or structurally invalid
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl HeliosError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        HeliosError::Config {
            message: message.into(),
        }
    }

    /// Create a new configuration-missing error
    pub fn config_missing<S: Into<String>>(message: S) -> Self {
        HeliosError::ConfigMissing {
            message: message.into(),
        }
    }

    /// Create a new non-retriable fetch error
    pub fn fetch<S: Into<String>>(message: S) -> Self {
        HeliosError::Fetch {
            message: message.into(),
            retriable: false,
        }
    }

    /// Create a new retriable fetch error
    pub fn fetch_retriable<S: Into<String>>(message: S) -> Self {
        HeliosError::Fetch {
            message: message.into(),
            retriable: true,
        }
    }

    /// Create a new persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        HeliosError::Persistence {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        HeliosError::Io {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        HeliosError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        HeliosError::Generic {
            message: message.into(),
        }
    }

    /// Whether a retry has any chance of succeeding
    pub fn is_retriable(&self) -> bool {
        matches!(self, HeliosError::Fetch { retriable: true, .. })
    }
}

impl From<std::io::Error> for HeliosError {
    fn from(err: std::io::Error) -> Self {
        HeliosError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeliosError {
    fn from(err: serde_yaml::Error) -> Self {
        HeliosError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for HeliosError {
    fn from(err: serde_json::Error) -> Self {
        HeliosError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for HeliosError {
    fn from(err: chrono::ParseError) -> Self {
        HeliosError::validation("datetime", &err.to_string())
    }
}

impl From<reqwest::Error> for HeliosError {
    fn from(err: reqwest::Error) -> Self {
        // Transport-level failures are worth retrying; everything else is not.
        HeliosError::Fetch {
            message: err.to_string(),
            retriable: err.is_timeout() || err.is_connect() || err.is_request(),
        }
    }
}
