//! Resilient request layer.
//!
//! This module sits between the application and its HTTP backend. It
//! normalizes every failure into a [`ClassifiedError`], retries transient
//! failures of read-only calls with exponential backoff, and lets concurrent
//! identical calls share a single network exchange.
//!
//! # Overview
//!
//! - [`RequestGateway`]: The public entry point
//! - [`RequestOptions`]: Per-call options (method, body, retry, dedup, ...)
//! - [`ClassifiedError`] / [`ErrorKind`]: The error taxonomy
//! - [`BackoffPolicy`]: Exponential backoff with jitter
//! - [`RetryOrchestrator`]: The bounded retry loop
//! - [`DeduplicationRegistry`]: Sharing of in-flight identical calls
//! - [`Executor`] / [`HttpExecutor`]: One network exchange
//!
//! # Example
//!
//! ```rust,ignore
//! use meteo_client::clients::{HttpMethod, RequestOptions};
//! use serde_json::json;
//!
//! let options = RequestOptions::builder()
//!     .method(HttpMethod::Post)
//!     .body(json!({"name": "Paris"}))
//!     .build()?;
//!
//! let created = gateway.request("/favorites", options).await?;
//! ```
//!
//! # Retry Behavior
//!
//! Only GET and HEAD are retried, and only for:
//!
//! - **408, 429, 500, 502, 503, 504**: the server asked to try again
//! - **Transport failures**: status 0, the server could not be reached
//! - **Timeouts**: a per-attempt timeout elapsed
//!
//! Delays grow as `base * 2^n` up to a cap, with ±25% jitter. Cancellation
//! is never retried and also interrupts the wait between attempts.

mod backoff;
mod dedup;
mod errors;
mod executor;
mod gateway;
mod http_request;
mod http_response;
mod retry;

pub use backoff::{
    BackoffPolicy, CACHE_LAYER_MAX_DELAY, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, JITTER_RATIO,
};
pub use dedup::{DeduplicationRegistry, SharedOutcome, SharedResult};
pub use errors::{
    ClassifiedError, ErrorKind, InvalidRequestError, CANCELLED_MESSAGE, FALLBACK_MESSAGE,
    NETWORK_MESSAGE, TIMED_OUT_MESSAGE,
};
pub use executor::{exchange, Executor, HttpExecutor};
pub use gateway::{RequestGateway, SDK_VERSION};
pub use http_request::{
    HttpMethod, RequestDescriptor, RequestKey, RequestOptions, RequestOptionsBuilder,
    MAX_RETRIES_LIMIT,
};
pub use http_response::ResponseBody;
pub use retry::{is_retryable, RetryOrchestrator, DEFAULT_MAX_ATTEMPTS, RETRYABLE_STATUSES};
