//! Request types for the request layer.
//!
//! [`RequestOptions`] is what callers hand to the gateway. The gateway turns
//! it into an immutable [`RequestDescriptor`], which is what the executor
//! sends. [`RequestKey`] identifies a descriptor for deduplication.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::clients::errors::InvalidRequestError;

/// Highest `max_retries` a single call may request.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// HTTP methods used by the dashboard API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method for retrieving resources.
    #[default]
    Get,
    /// HTTP HEAD method for probing resources.
    Head,
    /// HTTP POST method for creating resources.
    Post,
    /// HTTP PUT method for replacing resources.
    Put,
    /// HTTP PATCH method for partial updates.
    Patch,
    /// HTTP DELETE method for removing resources.
    Delete,
}

impl HttpMethod {
    /// Returns the wire token (e.g. `"GET"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Returns `true` for GET and HEAD, the only methods this layer retries
    /// or deduplicates by default.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::Get | Self::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identity of a logical request: `METHOD:url:body`.
///
/// # Example
///
/// ```rust
/// use meteo_client::clients::{HttpMethod, RequestKey};
///
/// let key = RequestKey::new(HttpMethod::Get, "https://api.example.com/weather", None);
/// assert_eq!(key.as_str(), "GET:https://api.example.com/weather:");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Builds a key from its parts. A missing body contributes an empty string.
    #[must_use]
    pub fn new(method: HttpMethod, url: &str, body: Option<&str>) -> Self {
        Self(format!("{method}:{url}:{}", body.unwrap_or_default()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call options accepted by the gateway.
///
/// Use [`RequestOptions::builder`] for anything other than a plain GET.
///
/// # Example
///
/// ```rust
/// use meteo_client::clients::{HttpMethod, RequestOptions};
/// use serde_json::json;
///
/// let options = RequestOptions::builder()
///     .method(HttpMethod::Post)
///     .body(json!({"name": "Paris"}))
///     .build()
///     .unwrap();
///
/// assert_eq!(options.method, HttpMethod::Post);
/// assert!(!options.skip_auth);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// HTTP method (default GET).
    pub method: HttpMethod,
    /// JSON body. Ignored for GET and HEAD.
    pub body: Option<serde_json::Value>,
    /// Headers added on top of the defaults.
    pub headers: HashMap<String, String>,
    /// Query parameters, appended in insertion order.
    pub query: Vec<(String, String)>,
    /// Do not attach the session token.
    pub skip_auth: bool,
    /// Do not share this call with concurrent identical reads.
    pub skip_dedup: bool,
    /// Share this call even though the method mutates.
    pub dedup: bool,
    /// Make exactly one attempt.
    pub skip_retry: bool,
    /// Retries after the first attempt. `None` uses the configured default.
    pub max_retries: Option<u32>,
    /// Per-attempt timeout. `None` uses the configured default.
    pub timeout: Option<Duration>,
    /// Caller cancellation.
    pub cancellation: Option<CancellationToken>,
}

impl RequestOptions {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> RequestOptionsBuilder {
        RequestOptionsBuilder::default()
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if `max_retries` exceeds
    /// [`MAX_RETRIES_LIMIT`] or a header is not valid on the wire.
    pub fn verify(&self) -> Result<(), InvalidRequestError> {
        if let Some(requested) = self.max_retries {
            if requested > MAX_RETRIES_LIMIT {
                return Err(InvalidRequestError::TooManyRetries {
                    requested,
                    limit: MAX_RETRIES_LIMIT,
                });
            }
        }

        for (name, value) in &self.headers {
            let name_ok = !name.is_empty()
                && name
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
            let value_ok = value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b));
            if !name_ok || !value_ok {
                return Err(InvalidRequestError::InvalidHeader { name: name.clone() });
            }
        }

        Ok(())
    }

    /// Returns whether the gateway should route this call through the
    /// deduplication registry.
    #[must_use]
    pub const fn is_dedup_eligible(&self) -> bool {
        (self.method.is_read_only() && !self.skip_dedup) || self.dedup
    }

    /// Returns the total number of attempts for this call.
    #[must_use]
    pub fn attempts(&self, default_retries: u32) -> u32 {
        if self.skip_retry {
            1
        } else {
            self.max_retries.unwrap_or(default_retries).saturating_add(1)
        }
    }
}

/// Builder for [`RequestOptions`].
#[derive(Debug, Default)]
pub struct RequestOptionsBuilder {
    options: RequestOptions,
}

impl RequestOptionsBuilder {
    /// Sets the HTTP method.
    #[must_use]
    pub const fn method(mut self, method: HttpMethod) -> Self {
        self.options.method = method;
        self
    }

    /// Sets the JSON body.
    #[must_use]
    pub fn body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.options.body = Some(body.into());
        self
    }

    /// Adds a single header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.headers.insert(name.into(), value.into());
        self
    }

    /// Adds a single query parameter.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.query.push((key.into(), value.into()));
        self
    }

    /// Skips attaching the session token.
    #[must_use]
    pub const fn skip_auth(mut self, skip: bool) -> Self {
        self.options.skip_auth = skip;
        self
    }

    /// Opts a read out of deduplication.
    #[must_use]
    pub const fn skip_dedup(mut self, skip: bool) -> Self {
        self.options.skip_dedup = skip;
        self
    }

    /// Opts a mutating call into deduplication.
    #[must_use]
    pub const fn dedup(mut self, dedup: bool) -> Self {
        self.options.dedup = dedup;
        self
    }

    /// Disables retries for this call.
    #[must_use]
    pub const fn skip_retry(mut self, skip: bool) -> Self {
        self.options.skip_retry = skip;
        self
    }

    /// Sets the number of retries after the first attempt.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.options.max_retries = Some(retries);
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.options.cancellation = Some(token);
        self
    }

    /// Builds the options, validating them in the process.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestError`] if the options fail validation.
    pub fn build(self) -> Result<RequestOptions, InvalidRequestError> {
        self.options.verify()?;
        Ok(self.options)
    }
}

/// A fully resolved request, ready to send.
///
/// Immutable once built. Built by the gateway, consumed by the executor.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    method: HttpMethod,
    url: String,
    headers: HashMap<String, String>,
    body: Option<String>,
    cancellation: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl RequestDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(
        method: HttpMethod,
        url: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) -> Self {
        Self {
            method,
            url: url.into(),
            headers,
            body,
            cancellation: None,
            timeout: None,
        }
    }

    /// Returns a copy carrying `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns a copy with a per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Returns the absolute URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the header set.
    #[must_use]
    pub const fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Returns the serialized body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Returns the cancellation token, if any.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Returns the per-attempt timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns the deduplication key.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, &self.url, self.body.as_deref())
    }
}
