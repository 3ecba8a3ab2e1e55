// src/error.rs

//! Unified error handling for the trending harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Durable store error
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Dedup cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error. Fatal: aborts the run with no partial output.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every category came back empty. Fatal: the upstream source is
    /// unreachable or its layout changed.
    #[error("No trending data available: {0}")]
    NoData(String),

    /// Event sink rejected or failed a delivery
    #[error("Event sink error: {0}")]
    Sink(String),

    /// List extraction error
    #[error("Extraction error for {context}: {message}")]
    Extract { context: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a data-unavailable error.
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData(message.into())
    }

    /// Create an event sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink(message.into())
    }

    /// Create an extraction error with context.
    pub fn extract(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extract {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Map the error to a process exit code for the top-level runner.
    ///
    /// Configuration errors and the no-data condition get distinct codes so
    /// schedulers can tell a broken deployment from an upstream outage.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::NoData(_) => 3,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_taxonomy() {
        assert_eq!(AppError::config("bad window").exit_code(), 2);
        assert_eq!(AppError::no_data("all empty").exit_code(), 3);
        assert_eq!(AppError::sink("503").exit_code(), 1);
    }
}
