//! Retry policy for transient failures.
//!
//! Retries only happen for read-only methods and only for failures that are
//! likely to go away on their own:
//! - 408, 429, 500, 502, 503, 504
//! - transport failures and per-attempt timeouts
//!
//! It does NOT retry:
//! - POST, PUT, PATCH, DELETE (they may have side effects)
//! - other 4xx/5xx, malformed bodies
//! - caller cancellation

use std::sync::Arc;

use crate::clients::backoff::BackoffPolicy;
use crate::clients::errors::{ClassifiedError, ErrorKind};
use crate::clients::executor::{exchange, Executor};
use crate::clients::http_request::{HttpMethod, RequestDescriptor};
use crate::clients::http_response::ResponseBody;

/// Default total attempts (one initial attempt plus two retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// HTTP statuses a server uses to ask for a retry.
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Returns whether `error` may be retried for a request sent with `method`.
#[must_use]
pub fn is_retryable(error: &ClassifiedError, method: HttpMethod) -> bool {
    if !method.is_read_only() {
        return false;
    }

    match error.kind() {
        ErrorKind::Client | ErrorKind::RateLimited | ErrorKind::Server => {
            RETRYABLE_STATUSES.contains(&error.status())
        }
        ErrorKind::Transport | ErrorKind::TimedOut => true,
        ErrorKind::Cancelled | ErrorKind::Malformed | ErrorKind::Unexpected => false,
    }
}

/// Transient bookkeeping for one orchestrated call.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    last_error: Option<ClassifiedError>,
}

/// Runs an [`Executor`] in a bounded, strictly sequential retry loop.
///
/// Cloning is cheap; clones share the executor.
#[derive(Clone, Debug)]
pub struct RetryOrchestrator {
    executor: Arc<dyn Executor>,
    backoff: BackoffPolicy,
}

impl RetryOrchestrator {
    /// Creates an orchestrator over `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, backoff: BackoffPolicy) -> Self {
        Self { executor, backoff }
    }

    /// Returns the backoff policy.
    #[must_use]
    pub const fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Executes `descriptor`, making at most `max_attempts` exchanges.
    ///
    /// `max_attempts` of 0 is treated as 1. Attempt `n + 1` starts only after
    /// attempt `n` failed with a retryable error and its backoff delay has
    /// elapsed. Firing the descriptor's cancellation token, during an attempt
    /// or during the wait, ends the call with a `Cancelled` error.
    ///
    /// # Errors
    ///
    /// Returns the last observed [`ClassifiedError`], unchanged.
    pub async fn execute(
        &self,
        descriptor: &RequestDescriptor,
        max_attempts: u32,
    ) -> Result<ResponseBody, ClassifiedError> {
        let max_attempts = max_attempts.max(1);
        let mut state = RetryState::default();

        loop {
            let error = match exchange(self.executor.as_ref(), descriptor).await {
                Ok(body) => {
                    if let Some(previous) = &state.last_error {
                        tracing::info!(
                            method = %descriptor.method(),
                            url = descriptor.url(),
                            last_status = previous.status(),
                            "Request succeeded after {} retries",
                            state.attempt
                        );
                    }
                    return Ok(body);
                }
                Err(error) => error,
            };

            let is_last = state.attempt + 1 >= max_attempts;
            if !is_retryable(&error, descriptor.method()) {
                tracing::debug!(
                    method = %descriptor.method(),
                    url = descriptor.url(),
                    status = error.status(),
                    "Non-retryable error: {}",
                    error
                );
                return Err(error);
            }
            if is_last {
                if max_attempts > 1 {
                    tracing::error!(
                        method = %descriptor.method(),
                        url = descriptor.url(),
                        status = error.status(),
                        "All {} attempts exhausted: {}",
                        max_attempts,
                        error
                    );
                }
                return Err(error);
            }

            let delay = self.backoff.delay(state.attempt);
            tracing::warn!(
                method = %descriptor.method(),
                url = descriptor.url(),
                status = error.status(),
                "Retryable error on attempt {} of {}, retrying in {:?}: {}",
                state.attempt + 1,
                max_attempts,
                delay,
                error
            );
            state.last_error = Some(error);

            if let Some(token) = descriptor.cancellation() {
                tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(ClassifiedError::cancelled()),
                    () = tokio::time::sleep(delay) => {}
                }
            } else {
                tokio::time::sleep(delay).await;
            }

            state.attempt += 1;
        }
    }
}
