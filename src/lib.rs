//! # Meteo Client
//!
//! A resilient request layer for a weather dashboard backend.
//!
//! ## Overview
//!
//! This crate provides:
//! - Type-safe configuration via [`ClientConfig`] and [`ClientConfigBuilder`]
//! - Validated newtypes for the base URL and session token
//! - A shared [`SessionStore`] read on every request
//! - [`RequestGateway`]: deduplication of concurrent identical reads,
//!   bounded retries with exponential backoff and jitter, per-attempt
//!   timeouts, and caller cancellation
//! - A single error shape, [`ClassifiedError`], for every failure
//! - [`weather::WeatherApi`], typed dashboard endpoints on top of the gateway
//!
//! ## Quick Start
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
//! assert_eq!(config.base_url().as_ref(), "https://api.example.com/api");
//! ```
//!
//! ## Making Requests
//!
//! ```rust,ignore
//! use meteo_client::{
//!     AccessToken, ClientConfig, RequestGateway, Session, SessionStore,
//! };
//! use meteo_client::weather::WeatherApi;
//!
//! let sessions = SessionStore::new();
//! sessions.set(Session::new(AccessToken::new("token")?, None));
//!
//! let gateway = RequestGateway::new(ClientConfig::from_env()?, sessions)?;
//! let api = WeatherApi::new(gateway);
//!
//! // Two widgets asking at once cause one network exchange.
//! let (a, b) = tokio::join!(
//!     api.current_weather("Seattle"),
//!     api.current_weather("Seattle"),
//! );
//! ```
//!
//! ## Handling Errors
//!
//! ```rust,ignore
//! use meteo_client::clients::ErrorKind;
//!
//! match api.forecast("Atlantis", 7).await {
//!     Ok(forecast) => render(forecast),
//!     Err(e) if e.kind() == ErrorKind::Cancelled => {}
//!     Err(e) if e.status() == 0 => banner(e.message()),
//!     Err(e) => toast(format!("{} ({})", e.message(), e.status())),
//! }
//! ```
//!
//! ## Design Principles
//!
//! - **No global state**: The deduplication registry is owned by the gateway
//!   and can be shared or replaced explicitly
//! - **Fail-fast validation**: All newtypes validate on construction
//! - **Thread-safe**: All public types are `Send + Sync`
//! - **Async-first**: Designed for use with the Tokio async runtime
//! - **Reads retry, writes don't**: Mutating methods are sent exactly once

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod weather;

// Re-export public types at crate root for convenience
pub use auth::{Session, SessionStore};
pub use config::{AccessToken, BaseUrl, ClientConfig, ClientConfigBuilder};
pub use error::ConfigError;

// Re-export request layer types
pub use clients::{
    BackoffPolicy, ClassifiedError, DeduplicationRegistry, ErrorKind, HttpMethod,
    InvalidRequestError, RequestGateway, RequestOptions, RequestOptionsBuilder, ResponseBody,
};
