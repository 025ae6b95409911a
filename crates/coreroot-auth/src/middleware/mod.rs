//! HTTP middleware for authentication.
//!
//! - Bearer token extraction and validation ([`BearerAuth`], [`OptionalBearerAuth`])
//! - JSON error responses for [`AuthError`](crate::AuthError)

pub mod auth;
pub mod error;

pub use auth::{AuthState, BearerAuth, OptionalBearerAuth};
pub use error::{error_body, status_for};
