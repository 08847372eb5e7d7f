//! Configuration types for the Meteo client.
//!
//! This module provides the configuration consumed by the request layer.
//!
//! # Overview
//!
//! - [`ClientConfig`]: The main configuration struct holding all client settings
//! - [`ClientConfigBuilder`]: A builder for constructing [`ClientConfig`] instances
//! - [`BaseUrl`]: A validated backend base URL
//! - [`AccessToken`]: A validated session token with masked debug output
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use meteo_client::{BaseUrl, ClientConfig};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com/api").unwrap())
//!     .max_retries(2)
//!     .default_timeout(Duration::from_secs(15))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.max_retries(), 2);
//! ```

mod newtypes;

pub use newtypes::{AccessToken, BaseUrl};

use std::time::Duration;

use crate::clients::{BackoffPolicy, MAX_RETRIES_LIMIT};
use crate::error::ConfigError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Environment key for the backend base URL.
pub const ENV_BASE_URL: &str = "BASE_URL";
/// Environment key for the default retry count.
pub const ENV_MAX_RETRIES: &str = "MAX_RETRIES";
/// Environment key for the default per-attempt timeout, in milliseconds.
pub const ENV_REQUEST_TIMEOUT_MS: &str = "REQUEST_TIMEOUT_MS";

/// Configuration for the request layer.
///
/// # Thread Safety
///
/// `ClientConfig` is `Clone`, `Send`, and `Sync`.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: BaseUrl,
    max_retries: u32,
    backoff: BackoffPolicy,
    default_timeout: Option<Duration>,
    user_agent_prefix: Option<String>,
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Builds a configuration from process environment variables.
    ///
    /// Reads `BASE_URL` (required), `MAX_RETRIES` and `REQUEST_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `BASE_URL` is missing or any value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the base URL is missing or any value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL).ok_or(ConfigError::MissingRequiredField {
            field: ENV_BASE_URL,
        })?;

        let mut builder = Self::builder().base_url(BaseUrl::new(base_url)?);

        if let Some(raw) = lookup(ENV_MAX_RETRIES) {
            let value = raw
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::InvalidEnvValue {
                    key: ENV_MAX_RETRIES,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            builder = builder.max_retries(value);
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidEnvValue {
                    key: ENV_REQUEST_TIMEOUT_MS,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
            if millis > 0 {
                builder = builder.default_timeout(Duration::from_millis(millis));
            }
        }

        builder.build()
    }

    /// Returns the backend base URL.
    #[must_use]
    pub const fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Returns the default number of retries after the first attempt.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the backoff policy used between retries.
    #[must_use]
    pub const fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Returns the default per-attempt timeout, if configured.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }
}

// Verify ClientConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ClientConfig>();
};

/// Builder for constructing [`ClientConfig`] instances.
///
/// `base_url` is required. All other fields have defaults.
///
/// # Defaults
///
/// - `max_retries`: 2 (three attempts in total)
/// - `backoff`: [`BackoffPolicy::default`] (1s base, 8s cap)
/// - `default_timeout`: `None`
/// - `user_agent_prefix`: `None`
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<BaseUrl>,
    max_retries: Option<u32>,
    backoff: Option<BackoffPolicy>,
    default_timeout: Option<Duration>,
    user_agent_prefix: Option<String>,
}

impl ClientConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backend base URL (required).
    #[must_use]
    pub fn base_url(mut self, base_url: BaseUrl) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Sets the default number of retries after the first attempt.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the backoff policy.
    #[must_use]
    pub const fn backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Sets the default per-attempt timeout.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Builds the [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if `base_url` is not set,
    /// or [`ConfigError::MaxRetriesTooHigh`] if the retry count is above
    /// [`MAX_RETRIES_LIMIT`].
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = self
            .base_url
            .ok_or(ConfigError::MissingRequiredField { field: "base_url" })?;

        let max_retries = self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::MaxRetriesTooHigh {
                value: max_retries,
                limit: MAX_RETRIES_LIMIT,
            });
        }

        Ok(ClientConfig {
            base_url,
            max_retries,
            backoff: self.backoff.unwrap_or_default(),
            default_timeout: self.default_timeout,
            user_agent_prefix: self.user_agent_prefix,
        })
    }
}
