//! Public entry point of the request layer.
//!
//! [`RequestGateway`] resolves the URL, attaches default and auth headers,
//! serializes the body, and then either joins an identical in-flight call
//! through the [`DeduplicationRegistry`] or runs the [`RetryOrchestrator`]
//! directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use meteo_client::{BaseUrl, ClientConfig, RequestGateway, SessionStore};
//!
//! let config = ClientConfig::builder()
//!     .base_url(BaseUrl::new("https://api.example.com/api")?)
//!     .build()?;
//! let gateway = RequestGateway::new(config, SessionStore::new())?;
//!
//! let body = gateway.get("/weather/current/Seattle").await?;
//! println!("{:?}", body.as_json());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::auth::SessionStore;
use crate::clients::dedup::DeduplicationRegistry;
use crate::clients::errors::ClassifiedError;
use crate::clients::executor::{Executor, HttpExecutor};
use crate::clients::http_request::{HttpMethod, RequestDescriptor, RequestOptions};
use crate::clients::http_response::ResponseBody;
use crate::clients::retry::RetryOrchestrator;
use crate::config::ClientConfig;
use crate::error::ConfigError;

/// Library version, sent in the `User-Agent` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resilient request gateway.
///
/// Concurrent identical read-only calls share a single network exchange and
/// all observe the same outcome. Transient failures of read-only calls are
/// retried with exponential backoff.
///
/// # Thread Safety
///
/// `RequestGateway` is `Send + Sync` and cheap to clone; clones share the
/// registry, the session store and the HTTP connection pool.
#[derive(Clone, Debug)]
pub struct RequestGateway {
    config: Arc<ClientConfig>,
    session: SessionStore,
    registry: DeduplicationRegistry,
    orchestrator: RetryOrchestrator,
    default_headers: Arc<HashMap<String, String>>,
}

// Verify RequestGateway is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RequestGateway>();
};

impl RequestGateway {
    /// Creates a gateway backed by reqwest with a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, ConfigError> {
        let executor = Arc::new(HttpExecutor::new()?);
        Ok(Self::with_executor(
            config,
            session,
            executor,
            DeduplicationRegistry::new(),
        ))
    }

    /// Creates a gateway over an arbitrary executor and registry.
    #[must_use]
    pub fn with_executor(
        config: ClientConfig,
        session: SessionStore,
        executor: Arc<dyn Executor>,
        registry: DeduplicationRegistry,
    ) -> Self {
        let user_agent_prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let rust_version = env!("CARGO_PKG_RUST_VERSION");
        let user_agent =
            format!("{user_agent_prefix}Meteo Client v{SDK_VERSION} | Rust {rust_version}");

        let mut default_headers = HashMap::new();
        default_headers.insert("User-Agent".to_string(), user_agent);
        default_headers.insert("Accept".to_string(), "application/json".to_string());

        let orchestrator = RetryOrchestrator::new(executor, *config.backoff());

        Self {
            config: Arc::new(config),
            session,
            registry,
            orchestrator,
            default_headers: Arc::new(default_headers),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the session store.
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Returns the deduplication registry.
    #[must_use]
    pub const fn registry(&self) -> &DeduplicationRegistry {
        &self.registry
    }

    /// Returns the headers sent with every request.
    #[must_use]
    pub fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    /// Sends a request.
    ///
    /// # Errors
    ///
    /// Returns the [`ClassifiedError`] of the last attempt, a `Cancelled`
    /// error if the caller's token fired, or an `Unexpected` error if the
    /// options fail validation.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, ClassifiedError> {
        options.verify()?;

        if options
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(ClassifiedError::cancelled());
        }

        let descriptor = self.build_descriptor(endpoint, &options)?;
        let attempts = options.attempts(self.config.max_retries());

        if !options.is_dedup_eligible() {
            return self.orchestrator.execute(&descriptor, attempts).await;
        }

        // The shared exchange belongs to no single caller, so it runs without
        // a token. Each caller races its own token against the shared handle.
        let key = descriptor.key();
        let shared = descriptor.with_cancellation(None);
        let orchestrator = self.orchestrator.clone();
        let handle = self.registry.get_or_create(&key, move || async move {
            orchestrator.execute(&shared, attempts).await
        });

        match options.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(ClassifiedError::cancelled()),
                    result = handle => result,
                }
            }
            None => handle.await,
        }
    }

    /// Sends a request and deserializes the JSON response into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`request`](Self::request), plus a `Malformed` error if the
    /// body does not match `T`.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T, ClassifiedError> {
        self.request(endpoint, options).await?.deserialize()
    }

    /// Sends a GET request with default options.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn get(&self, endpoint: &str) -> Result<ResponseBody, ClassifiedError> {
        self.request(endpoint, RequestOptions::default()).await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn post(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<ResponseBody, ClassifiedError> {
        self.request(endpoint, Self::with_body(HttpMethod::Post, body))
            .await
    }

    /// Sends a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn put(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<ResponseBody, ClassifiedError> {
        self.request(endpoint, Self::with_body(HttpMethod::Put, body))
            .await
    }

    /// Sends a PATCH request with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn patch(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<ResponseBody, ClassifiedError> {
        self.request(endpoint, Self::with_body(HttpMethod::Patch, body))
            .await
    }

    /// Sends a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn delete(&self, endpoint: &str) -> Result<ResponseBody, ClassifiedError> {
        let options = RequestOptions {
            method: HttpMethod::Delete,
            ..RequestOptions::default()
        };
        self.request(endpoint, options).await
    }

    fn with_body(method: HttpMethod, body: serde_json::Value) -> RequestOptions {
        RequestOptions {
            method,
            body: Some(body),
            ..RequestOptions::default()
        }
    }

    /// Resolves `endpoint` and `options` into an immutable descriptor.
    fn build_descriptor(
        &self,
        endpoint: &str,
        options: &RequestOptions,
    ) -> Result<RequestDescriptor, ClassifiedError> {
        let mut url = self.config.base_url().join(endpoint);
        if !options.query.is_empty() {
            let mut parsed = reqwest::Url::parse(&url).map_err(|e| {
                ClassifiedError::unexpected(format!("Invalid request URL '{url}': {e}"))
            })?;
            parsed.query_pairs_mut().extend_pairs(&options.query);
            url = parsed.into();
        }

        let mut headers = (*self.default_headers).clone();

        if !options.skip_auth {
            if let Some(bearer) = self.session.bearer_token() {
                set_header(&mut headers, "Authorization", bearer);
            }
        }

        let body = match &options.body {
            Some(_) if options.method.is_read_only() => {
                tracing::debug!(
                    method = %options.method,
                    url = %url,
                    "Dropping request body on a read-only method"
                );
                None
            }
            Some(value) => Some(
                serde_json::to_string(value)
                    .map_err(|e| ClassifiedError::unexpected(e.to_string()))?,
            ),
            None => None,
        };
        if body.is_some() {
            set_header(&mut headers, "Content-Type", "application/json".to_string());
        }

        for (name, value) in &options.headers {
            set_header(&mut headers, name, value.clone());
        }

        Ok(
            RequestDescriptor::new(options.method, url, headers, body)
                .with_timeout(options.timeout.or_else(|| self.config.default_timeout()))
                .with_cancellation(options.cancellation.clone()),
        )
    }
}

/// Inserts a header, replacing any existing one whose name differs only in
/// case. HTTP header names are case-insensitive.
fn set_header(headers: &mut HashMap<String, String>, name: &str, value: String) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}
