//! Session state for authenticated dashboard requests.
//!
//! This module provides the [`Session`] type holding the bearer token issued
//! by the backend, and the [`SessionStore`] handle the request layer reads on
//! every call.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::config::AccessToken;

/// An authenticated user session.
///
/// The token is opaque to this crate. Issuance and verification happen on the
/// backend; the client only attaches it.
///
/// # Example
///
/// ```rust
/// use meteo_client::{AccessToken, Session};
///
/// let session = Session::new(AccessToken::new("token").unwrap(), None);
/// assert!(session.is_active());
/// assert!(!session.expired());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// The bearer token for API authentication.
    pub access_token: AccessToken,

    /// The backend user id, if known.
    pub user_id: Option<String>,

    /// When this session expires, if applicable.
    pub expires: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a new session.
    #[must_use]
    pub const fn new(access_token: AccessToken, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token,
            user_id: None,
            expires,
        }
    }

    /// Sets the backend user id.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns `true` if this session has expired.
    ///
    /// Sessions without an expiration time are considered never expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|expires| Utc::now() > expires)
    }

    /// Returns `true` if this session has not expired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.expired()
    }
}

/// Shared handle to the current session.
///
/// Cloning the store is cheap; all clones observe the same session. The
/// request gateway reads it once per call, so signing in or out takes effect
/// for the next request.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    /// Creates an empty store (signed out).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `session`.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(session))),
        }
    }

    /// Replaces the current session.
    pub fn set(&self, session: Session) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Clears the current session (sign out).
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns a copy of the current session, if any.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the `Authorization` header value for the current session.
    ///
    /// Expired sessions still yield a value; the backend is the authority on
    /// token validity.
    #[must_use]
    pub fn bearer_token(&self) -> Option<String> {
        let session = self.current()?;
        if session.expired() {
            tracing::debug!(
                user_id = session.user_id.as_deref().unwrap_or("-"),
                "Attaching an expired session token"
            );
        }
        Some(session.access_token.bearer())
    }
}

// Verify Session and SessionStore are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
    assert_send_sync::<SessionStore>();
};
