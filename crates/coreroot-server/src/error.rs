//! API and startup errors.
//!
//! Every error body has the shape `{"detail": ..., "code": ...}`. Auth errors
//! keep their own response mapping, including `WWW-Authenticate` on 401.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use coreroot_auth::AuthError;
use coreroot_auth::middleware::error_body;
use coreroot_cache::CacheError;
use coreroot_storage::StorageError;

use crate::config::ConfigError;

/// Errors returned by content handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Auth(err) => coreroot_auth::middleware::status_for(err),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { .. } => Self::not_found(err.to_string()),
            StorageError::AlreadyExists { .. } => Self::conflict(err.to_string()),
            StorageError::InvalidResource { message } => Self::bad_request(message),
            other => Self::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Auth(err) => return err.into_response(),
            // Lookups never say which part of a path was missing.
            ApiError::NotFound(_) => error_body("Not found.", "not_found"),
            ApiError::BadRequest(msg) => error_body(&msg, "invalid"),
            ApiError::Conflict(msg) => error_body(&msg, "conflict"),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                error_body("Internal server error", "error")
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("auth initialization failed: {0}")]
    Auth(#[from] AuthError),
    #[error("cache initialization failed: {0}")]
    Cache(#[from] CacheError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_hides_detail() {
        let resp = ApiError::from(StorageError::not_found("post", "42")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["detail"], "Not found.");
        assert_eq!(body["code"], "not_found");
    }

    #[tokio::test]
    async fn test_internal_hides_message() {
        let resp = ApiError::internal("connection refused to 10.0.0.1").into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["detail"], "Internal server error");
    }

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::from(AuthError::forbidden("x")),
                StatusCode::FORBIDDEN,
            ),
            (ApiError::from(AuthError::TokenExpired), StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn test_storage_conversion() {
        assert!(matches!(
            ApiError::from(StorageError::already_exists("user", "bob")),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(StorageError::invalid_resource("body must be an object")),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(StorageError::internal("down")),
            ApiError::Internal(_)
        ));
    }
}
