//! Axum handlers for the account and token endpoints.
//!
//! | Route                 | Handler              |
//! |-----------------------|----------------------|
//! | `POST /register/`     | [`register_handler`] |
//! | `POST /login/`        | [`login_handler`]    |
//! | `POST /refresh/`      | [`refresh_handler`]  |
//! | `POST /logout/`       | [`logout_handler`]   |
//!
//! [`router`] mounts all four; the server nests it under `/api/auth`.

use axum::{
    Json, Router,
    extract::{FromRef, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::middleware::AuthState;
use crate::types::{LoginRequest, RefreshRequest, RegisterRequest, Session, TokenPair, UserView};

/// Response body for register and login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

/// Token pair as sent to clients.
#[derive(Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub refresh: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires: OffsetDateTime,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_expires", &self.access_expires)
            .field("refresh_expires", &self.refresh_expires)
            .finish_non_exhaustive()
    }
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access: pair.access,
            refresh: pair.refresh,
            access_expires: pair.access_expires_at,
            refresh_expires: pair.refresh_expires_at,
        }
    }
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            user: UserView::from(&session.user),
            tokens: session.tokens.into(),
        }
    }
}

/// Routes for the auth endpoints, usable with any state that provides
/// [`AuthState`].
pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    AuthState: FromRef<S>,
{
    Router::new()
        .route("/register/", post(register_handler))
        .route("/login/", post(login_handler))
        .route("/refresh/", post(refresh_handler))
        .route("/logout/", post(logout_handler))
}

/// Handler for POST /register/.
pub async fn register_handler(
    State(state): State<AuthState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<Response> {
    let Json(request) = body.map_err(rejected)?;
    let session = state.accounts.register(request).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))).into_response())
}

/// Handler for POST /login/.
pub async fn login_handler(
    State(state): State<AuthState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<SessionResponse>> {
    let Json(request) = body.map_err(rejected)?;
    let session = state.accounts.login(request).await?;
    Ok(Json(session.into()))
}

/// Handler for POST /refresh/.
///
/// Rotates: the presented refresh token is revoked and a new pair returned.
pub async fn refresh_handler(
    State(state): State<AuthState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AuthResult<Json<TokenResponse>> {
    let Json(request) = body.map_err(rejected)?;
    let pair = state.tokens.refresh(&request.refresh).await?;
    Ok(Json(pair.into()))
}

/// Handler for POST /logout/.
///
/// Revokes the refresh token in the body. Succeeds with 204 on repeat calls.
pub async fn logout_handler(
    State(state): State<AuthState>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> AuthResult<StatusCode> {
    let Json(request) = body.map_err(rejected)?;
    state.tokens.logout(&request.refresh).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn rejected(rejection: JsonRejection) -> AuthError {
    AuthError::invalid_request(rejection.body_text())
}
