//! Error types for the request layer.
//!
//! Every failure that leaves the request layer is a [`ClassifiedError`]: a
//! stable `{message, status, data}` shape plus an [`ErrorKind`] used by the
//! retry policy. Raw transport errors never escape the executor.
//!
//! # Example
//!
//! ```rust,ignore
//! use meteo_client::clients::{ClassifiedError, ErrorKind};
//!
//! match gateway.get("/weather/current/Seattle").await {
//!     Ok(body) => println!("{:?}", body.as_json()),
//!     Err(e) if e.kind() == ErrorKind::RateLimited => println!("slow down"),
//!     Err(e) if e.status() == 0 => println!("offline: {}", e.message()),
//!     Err(e) => println!("HTTP {}: {}", e.status(), e.message()),
//! }
//! ```

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Message used when a cancellation token fires.
pub const CANCELLED_MESSAGE: &str = "Request cancelled";
/// Message used when the server could not be reached.
pub const NETWORK_MESSAGE: &str = "Network error - check your connection";
/// Message used when neither the body nor the status carries a reason.
pub const FALLBACK_MESSAGE: &str = "Request failed";
/// Message used when a per-attempt timeout elapses.
pub const TIMED_OUT_MESSAGE: &str = "Request timed out";

/// Classification of a [`ClassifiedError`].
///
/// `Transport`, `Cancelled`, `TimedOut`, `Malformed` and `Unexpected` carry
/// status 0. The others are derived from the HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The server could not be reached (DNS, refused, reset).
    Transport,
    /// The caller fired the cancellation token.
    Cancelled,
    /// A per-attempt timeout elapsed.
    TimedOut,
    /// The response could not be decoded.
    Malformed,
    /// Any other non-HTTP failure.
    Unexpected,
    /// 4xx other than 429.
    Client,
    /// 429 Too Many Requests.
    RateLimited,
    /// 5xx.
    Server,
}

impl ErrorKind {
    /// Derives the kind for a non-success HTTP status.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Client,
        }
    }

    /// Returns `true` for kinds that come from an HTTP response.
    #[must_use]
    pub const fn is_http(self) -> bool {
        matches!(self, Self::Client | Self::RateLimited | Self::Server)
    }
}

/// The single error type surfaced by the request layer.
///
/// Built once at the point of failure and returned unchanged after retries
/// are exhausted. `status` is the HTTP status, or 0 for non-HTTP failures.
/// `data` is the decoded error body when the server sent one.
///
/// Serializes as `{"message", "status", "data", "kind"}`.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
#[error("{message}")]
pub struct ClassifiedError {
    message: String,
    status: u16,
    data: Option<serde_json::Value>,
    kind: ErrorKind,
}

impl ClassifiedError {
    /// Builds an error for a non-success HTTP response.
    ///
    /// The message is taken from the body's `error` or `message` string field,
    /// then the status reason phrase, then [`FALLBACK_MESSAGE`].
    #[must_use]
    pub fn from_response(
        status: u16,
        status_text: Option<&str>,
        data: Option<serde_json::Value>,
    ) -> Self {
        let from_body = data.as_ref().and_then(|body| {
            ["error", "message"]
                .iter()
                .find_map(|field| body.get(field).and_then(serde_json::Value::as_str))
                .filter(|s| !s.is_empty())
                .map(String::from)
        });

        let message = from_body
            .or_else(|| {
                status_text
                    .filter(|s| !s.is_empty())
                    .map(String::from)
            })
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        Self {
            message,
            status,
            data,
            kind: ErrorKind::from_status(status),
        }
    }

    /// The server could not be reached.
    #[must_use]
    pub fn network() -> Self {
        Self::non_http(NETWORK_MESSAGE, ErrorKind::Transport)
    }

    /// The caller cancelled the request.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::non_http(CANCELLED_MESSAGE, ErrorKind::Cancelled)
    }

    /// A per-attempt timeout elapsed.
    #[must_use]
    pub fn timed_out(limit: Duration) -> Self {
        Self {
            data: Some(serde_json::json!({ "timeoutMs": u64::try_from(limit.as_millis()).unwrap_or(u64::MAX) })),
            ..Self::non_http(TIMED_OUT_MESSAGE, ErrorKind::TimedOut)
        }
    }

    /// The response body could not be decoded.
    #[must_use]
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::non_http(
            format!("Malformed response: {reason}"),
            ErrorKind::Malformed,
        )
    }

    /// Any other failure, keeping its original message.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::non_http(message, ErrorKind::Unexpected)
    }

    fn non_http(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            status: 0,
            data: None,
            kind,
        }
    }

    /// Human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, or 0 for non-HTTP failures.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Decoded error payload, if the server sent one.
    #[must_use]
    pub const fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// The error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if the caller cancelled the request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl From<reqwest::Error> for ClassifiedError {
    fn from(error: reqwest::Error) -> Self {
        // A client-level timeout whose limit is not known here.
        if error.is_timeout() {
            return Self {
                data: Some(serde_json::json!({ "timeoutMs": null })),
                ..Self::non_http(TIMED_OUT_MESSAGE, ErrorKind::TimedOut)
            };
        }
        if error.is_connect() || error.is_request() {
            tracing::debug!("Transport failure: {}", error);
            return Self::network();
        }
        Self::unexpected(error.to_string())
    }
}

/// Error returned when request options fail validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidRequestError {
    /// More retries were requested than the layer allows.
    #[error("maxRetries {requested} exceeds the limit of {limit}.")]
    TooManyRetries {
        /// The requested retry count.
        requested: u32,
        /// The ceiling.
        limit: u32,
    },

    /// A header name or value is not valid on the wire.
    #[error("Invalid header '{name}'.")]
    InvalidHeader {
        /// The offending header name.
        name: String,
    },
}

impl From<InvalidRequestError> for ClassifiedError {
    fn from(error: InvalidRequestError) -> Self {
        Self::unexpected(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_prefers_error_field() {
        let error = ClassifiedError::from_response(
            404,
            Some("Not Found"),
            Some(json!({"error": "City not found", "message": "ignored"})),
        );
        assert_eq!(error.message(), "City not found");
        assert_eq!(error.status(), 404);
        assert_eq!(error.kind(), ErrorKind::Client);
        assert_eq!(error.data(), Some(&json!({"error": "City not found", "message": "ignored"})));
    }

    #[test]
    fn test_message_falls_back_to_message_field() {
        let error = ClassifiedError::from_response(
            400,
            Some("Bad Request"),
            Some(json!({"message": "days must be between 1 and 16"})),
        );
        assert_eq!(error.message(), "days must be between 1 and 16");
    }

    #[test]
    fn test_message_falls_back_to_status_text_then_generic() {
        let error = ClassifiedError::from_response(502, Some("Bad Gateway"), Some(json!({})));
        assert_eq!(error.message(), "Bad Gateway");

        let error = ClassifiedError::from_response(599, None, None);
        assert_eq!(error.message(), FALLBACK_MESSAGE);
        assert!(error.data().is_none());
    }

    #[test]
    fn test_non_string_error_field_is_ignored() {
        let error = ClassifiedError::from_response(
            422,
            Some("Unprocessable Entity"),
            Some(json!({"error": {"field": "name"}})),
        );
        assert_eq!(error.message(), "Unprocessable Entity");
    }

    #[test]
    fn test_kind_from_status() {
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(408), ErrorKind::Client);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert!(ErrorKind::Server.is_http());
        assert!(!ErrorKind::Transport.is_http());
    }

    #[test]
    fn test_non_http_errors_have_status_zero() {
        for error in [
            ClassifiedError::network(),
            ClassifiedError::cancelled(),
            ClassifiedError::timed_out(Duration::from_secs(5)),
            ClassifiedError::malformed("expected value at line 1 column 1"),
            ClassifiedError::unexpected("boom"),
        ] {
            assert_eq!(error.status(), 0, "{error:?}");
        }
        assert_eq!(ClassifiedError::cancelled().message(), "Request cancelled");
        assert_eq!(
            ClassifiedError::network().message(),
            "Network error - check your connection"
        );
        assert!(ClassifiedError::cancelled().is_cancelled());
    }

    #[test]
    fn test_serializes_stable_shape() {
        let error = ClassifiedError::from_response(429, Some("Too Many Requests"), None);
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(
            value,
            json!({
                "message": "Too Many Requests",
                "status": 429,
                "data": null,
                "kind": "rateLimited"
            })
        );
    }

    #[test]
    fn test_display_is_message() {
        let error = ClassifiedError::unexpected("socket closed");
        assert_eq!(error.to_string(), "socket closed");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn test_invalid_request_messages() {
        let error = InvalidRequestError::TooManyRetries {
            requested: 50,
            limit: 10,
        };
        assert_eq!(error.to_string(), "maxRetries 50 exceeds the limit of 10.");

        let classified = ClassifiedError::from(error);
        assert_eq!(classified.kind(), ErrorKind::Unexpected);
        assert_eq!(classified.status(), 0);
        assert_eq!(classified.message(), "maxRetries 50 exceeds the limit of 10.");
    }
}
