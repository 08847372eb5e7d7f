//! Single network exchange.
//!
//! [`Executor`] is the seam between the request layer and HTTP: one call,
//! one exchange, no retries and no shared state. [`HttpExecutor`] is the
//! reqwest-backed implementation. [`exchange`] wraps any executor with the
//! per-attempt timeout and caller cancellation carried by the descriptor.

use async_trait::async_trait;

use crate::clients::errors::ClassifiedError;
use crate::clients::http_request::{HttpMethod, RequestDescriptor};
use crate::clients::http_response::ResponseBody;
use crate::error::ConfigError;

/// Performs exactly one network exchange.
///
/// Implementations must map every failure to a [`ClassifiedError`]; raw
/// transport errors must not escape.
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Sends `descriptor` and decodes the response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassifiedError`] for non-2xx responses, transport
    /// failures and undecodable bodies.
    async fn execute(&self, descriptor: &RequestDescriptor)
        -> Result<ResponseBody, ClassifiedError>;
}

/// Runs one attempt of `descriptor` on `executor`.
///
/// A fired cancellation token wins over everything else, including a token
/// that was already cancelled before the call. The per-attempt timeout, when
/// set, yields a `TimedOut` error.
///
/// # Errors
///
/// Returns the executor's error, or a `Cancelled` / `TimedOut` error.
pub async fn exchange(
    executor: &dyn Executor,
    descriptor: &RequestDescriptor,
) -> Result<ResponseBody, ClassifiedError> {
    let attempt = async {
        match descriptor.timeout() {
            Some(limit) => tokio::time::timeout(limit, executor.execute(descriptor))
                .await
                .unwrap_or_else(|_| Err(ClassifiedError::timed_out(limit))),
            None => executor.execute(descriptor).await,
        }
    };

    match descriptor.cancellation() {
        Some(token) => {
            tokio::select! {
                biased;
                () = token.cancelled() => Err(ClassifiedError::cancelled()),
                result = attempt => result,
            }
        }
        None => attempt.await,
    }
}

/// reqwest-backed [`Executor`].
///
/// # Thread Safety
///
/// `HttpExecutor` is `Send + Sync`; the inner reqwest client pools
/// connections and is shared by every clone.
#[derive(Clone, Debug)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

// Verify HttpExecutor is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpExecutor>();
};

impl HttpExecutor {
    /// Creates an executor with a fresh reqwest client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| ConfigError::HttpClient {
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Wraps an existing reqwest client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResponseBody, ClassifiedError> {
        let mut req_builder = self
            .client
            .request(Self::method(descriptor.method()), descriptor.url());

        for (key, value) in descriptor.headers() {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = descriptor.body() {
            req_builder = req_builder.body(body.to_string());
        }

        if let Some(limit) = descriptor.timeout() {
            req_builder = req_builder.timeout(limit);
        }

        let transport = |error: reqwest::Error| match descriptor.timeout() {
            Some(limit) if error.is_timeout() => ClassifiedError::timed_out(limit),
            _ => ClassifiedError::from(error),
        };

        let res = req_builder.send().await.map_err(transport)?;

        let status = res.status();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let body_text = res.text().await.map_err(transport)?;

        if status.is_success() {
            return ResponseBody::decode(content_type.as_deref(), body_text).map_err(|e| {
                tracing::warn!(
                    "Undecodable {} response from {}: {}",
                    status.as_u16(),
                    descriptor.url(),
                    e
                );
                ClassifiedError::malformed(e)
            });
        }

        let data = ResponseBody::decode_error_data(content_type.as_deref(), body_text);
        Err(ClassifiedError::from_response(
            status.as_u16(),
            status.canonical_reason(),
            data,
        ))
    }
}
