//! Bearer token authentication extractors.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use coreroot_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn protected_handler(BearerAuth(identity): BearerAuth) -> String {
//!     format!("Hello, {}!", identity.external_id)
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use coreroot_core::SharedClock;
use coreroot_storage::DynUserStore;

use crate::AuthResult;
use crate::account::AccountService;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::storage::InMemoryRevokedTokenStorage;
use crate::token::{JwtCodec, KeyRing, TokenConfig, TokenService};
use crate::types::Identity;

// =============================================================================
// Auth State
// =============================================================================

/// State required for bearer token authentication and the auth endpoints.
///
/// Include it in the application state and expose it via `FromRef`:
///
/// ```ignore
/// impl FromRef<AppState> for AuthState {
///     fn from_ref(state: &AppState) -> Self {
///         state.auth.clone()
///     }
/// }
/// ```
#[derive(Clone)]
pub struct AuthState {
    /// Token issuance, rotation and validation.
    pub tokens: Arc<TokenService>,

    /// Registration and login.
    pub accounts: Arc<AccountService>,
}

impl AuthState {
    pub fn new(tokens: Arc<TokenService>, accounts: Arc<AccountService>) -> Self {
        Self { tokens, accounts }
    }

    /// Builds the whole auth stack from configuration.
    ///
    /// Revocation records are kept in memory for the codec leeway past expiry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration is invalid or a
    /// signing key cannot be built.
    pub fn from_config(
        config: &AuthConfig,
        users: DynUserStore,
        clock: SharedClock,
    ) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;

        let keys = KeyRing::from_config(&config.signing)
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let codec = JwtCodec::new(keys, config.issuer.clone(), clock.clone())
            .with_leeway(config.tokens.leeway);
        let revoked =
            InMemoryRevokedTokenStorage::new(clock).with_grace(config.tokens.leeway);

        let tokens = Arc::new(TokenService::new(
            Arc::new(codec),
            Arc::new(revoked),
            TokenConfig::from(&config.tokens),
        ));
        let accounts = Arc::new(AccountService::new(users, tokens.clone(), &config.passwords));

        tracing::info!(
            issuer = %config.issuer,
            algorithm = %config.signing.algorithm,
            "Auth stack initialized"
        );
        Ok(Self::new(tokens, accounts))
    }
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// Axum extractor that validates a Bearer access token.
///
/// Validation is signature, issuer, type and expiry only. The revocation
/// store is not consulted for access tokens.
///
/// # Errors
///
/// Rejects with `AuthError` (which implements `IntoResponse`) if the header is
/// missing or malformed, or the token is invalid or expired.
pub struct BearerAuth(pub Identity);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);

        let token = bearer_token(parts)?
            .ok_or_else(|| AuthError::unauthenticated("Authentication credentials were not provided"))?;

        let identity = auth_state.tokens.authenticate(token).map_err(|e| {
            tracing::debug!(error = %e, "Bearer token rejected");
            e
        })?;

        tracing::debug!(user = %identity.key, "Token validated successfully");
        Ok(BearerAuth(identity))
    }
}

// =============================================================================
// Optional Bearer Auth Extractor
// =============================================================================

/// Axum extractor that validates a Bearer token when one is present.
///
/// A request without an `Authorization` header yields `None`. A header that
/// is present but invalid is still rejected, so a client with a stale token
/// learns it has to refresh instead of silently being treated as anonymous.
pub struct OptionalBearerAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalBearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(OptionalBearerAuth(None));
        }

        let BearerAuth(identity) = BearerAuth::from_request_parts(parts, state).await?;
        Ok(OptionalBearerAuth(Some(identity)))
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
///
/// `Ok(None)` when there is no header; an error when the header is not a
/// non-empty Bearer credential.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = header
        .to_str()
        .map_err(|_| AuthError::unauthenticated("Invalid Authorization header"))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::unauthenticated("Authorization header must be 'Bearer <token>'"))?;

    Ok(Some(token))
}

// =============================================================================
// Tests
// =============================================================================
