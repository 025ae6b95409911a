//! Error response handling for authentication middleware.
//!
//! Errors are rendered as `{"detail": ..., "code": ...}`. 401 responses carry
//! a `WWW-Authenticate: Bearer` challenge.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, detail) = error_details(&self);

        if status.is_server_error() {
            tracing::error!(error = %self, category = %self.category(), "Auth request failed");
        }

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let challenge = build_www_authenticate_header(self.error_code(), &detail);
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(error_body(&detail, self.error_code()))).into_response()
    }
}

/// HTTP status for an auth error.
#[must_use]
pub fn status_for(error: &AuthError) -> StatusCode {
    error_details(error).0
}

/// Extracts (HTTP status, client-facing detail) from an AuthError.
///
/// Server-side failures never leak their message.
fn error_details(error: &AuthError) -> (StatusCode, String) {
    match error {
        AuthError::InvalidToken { .. } => (
            StatusCode::UNAUTHORIZED,
            "Given token not valid for any token type".to_string(),
        ),
        AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token is expired".to_string()),
        AuthError::TokenRevoked => (StatusCode::UNAUTHORIZED, "Token is blacklisted".to_string()),
        AuthError::Unauthenticated { message } => (StatusCode::UNAUTHORIZED, message.clone()),
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "No active account found with the given credentials".to_string(),
        ),
        AuthError::Forbidden { message } => (StatusCode::FORBIDDEN, message.clone()),
        AuthError::InvalidRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AuthError::Conflict { message } => (StatusCode::CONFLICT, message.clone()),
        AuthError::Storage { .. } | AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// Format: `Bearer realm="api", error="token_not_valid", error_description="..."`
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('"', "\\\"");
    format!("Bearer realm=\"api\", error=\"{error}\", error_description=\"{escaped_desc}\"")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// The JSON error body shared by every API error response.
#[must_use]
pub fn error_body(detail: &str, code: &str) -> serde_json::Value {
    json!({
        "detail": detail,
        "code": code,
    })
}
