//! # coreroot-auth
//!
//! Authentication and authorization for CoreRoot.
//!
//! This crate provides:
//! - Signed access/refresh tokens with single-use refresh rotation
//! - A revocation store for logged-out and rotated refresh tokens
//! - Ownership-based permission evaluation
//! - Argon2id password hashing, registration and login
//! - Axum extractors and handlers for the auth endpoints
//!
//! ## Modules
//!
//! - [`config`] - Signing, token lifetime and password configuration
//! - [`token`] - Token encoding, validation, and rotation
//! - [`storage`] - Revoked token storage
//! - [`policy`] - Permission evaluation
//! - [`account`] - Registration and login
//! - [`password`] - Password hashing
//! - [`middleware`] - Bearer extractors and error responses
//! - [`http`] - Axum handlers for the auth endpoints

pub mod account;
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod password;
pub mod policy;
pub mod storage;
pub mod token;
pub mod types;

pub use account::AccountService;
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use middleware::{AuthState, BearerAuth, OptionalBearerAuth};
pub use policy::{AccessDecision, Action, DenyReason, PermissionEvaluator};
pub use storage::{InMemoryRevokedTokenStorage, RevokedTokenStorage};
pub use token::{JwtCodec, KeyRing, TokenService};
pub use types::{Identity, Principal, TokenPair};

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use coreroot_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::account::AccountService;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::middleware::{AuthState, BearerAuth, OptionalBearerAuth};
    pub use crate::policy::{AccessDecision, Action, DenyReason, PermissionEvaluator};
    pub use crate::storage::{InMemoryRevokedTokenStorage, RevokedTokenStorage};
    pub use crate::token::{JwtCodec, KeyRing, TokenConfig, TokenService, TokenType};
    pub use crate::types::{Identity, Principal, Session, TokenPair, UserView};
}
