//! Authentication state consumed by the request layer.
//!
//! Token issuance and verification live on the backend. This module only
//! holds the current session so the gateway can attach
//! `Authorization: Bearer <token>` to outgoing requests.
//!
//! - [`Session`]: the bearer token plus optional user id and expiry
//! - [`SessionStore`]: a shared, swappable handle to the current session

pub mod session;

pub use session::{Session, SessionStore};
