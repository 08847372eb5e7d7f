//! Configuration error types for the Meteo client.
//!
//! All configuration constructors return `Result<T, ConfigError>` to enable
//! fail-fast validation. Request-time failures use
//! [`ClassifiedError`](crate::clients::ClassifiedError) instead.
//!
//! # Example
//!
//! ```rust
//! use meteo_client::{AccessToken, ConfigError};
//!
//! let result = AccessToken::new("");
//! assert!(matches!(result, Err(ConfigError::EmptyAccessToken)));
//! ```

use thiserror::Error;

/// Errors that can occur while building client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Access token cannot be empty.
    #[error("Access token cannot be empty. Sign in again to obtain a session token.")]
    EmptyAccessToken,

    /// Base URL is invalid.
    #[error("Invalid base URL '{url}'. Please provide a URL with an http or https scheme (e.g., 'https://api.example.com/api').")]
    InvalidBaseUrl {
        /// The invalid URL that was provided.
        url: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'. This field must be set before building the configuration.")]
    MissingRequiredField {
        /// The name of the missing field.
        field: &'static str,
    },

    /// An environment value could not be parsed.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidEnvValue {
        /// The environment key.
        key: &'static str,
        /// The raw value that was read.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Default retry count is above the supported ceiling.
    #[error("Max retries {value} exceeds the limit of {limit}")]
    MaxRetriesTooHigh {
        /// The configured retry count.
        value: u32,
        /// The ceiling.
        limit: u32,
    },

    /// The underlying HTTP client could not be created.
    #[error("Failed to create HTTP client: {reason}")]
    HttpClient {
        /// The reason reported by the HTTP stack.
        reason: String,
    },
}
