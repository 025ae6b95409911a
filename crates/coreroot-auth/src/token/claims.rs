use std::fmt;

use coreroot_core::{ExternalId, SurrogateKey};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::token::jwt::JwtError;
use crate::types::Principal;

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims carried by both token types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject: the account's surrogate key, as a decimal string.
    pub sub: String,

    /// The account's public identifier.
    pub uid: ExternalId,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Unique token identifier, used for revocation.
    pub jti: String,

    pub token_type: TokenType,
}

impl TokenClaims {
    /// Builds claims for a fresh token with a new random `jti`.
    pub fn new(
        issuer: impl Into<String>,
        principal: &Principal,
        token_type: TokenType,
        issued_at: OffsetDateTime,
        lifetime: Duration,
    ) -> Self {
        Self {
            iss: issuer.into(),
            sub: principal.key.to_string(),
            uid: principal.external_id,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + lifetime).unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type,
        }
    }

    /// Parses the subject back into a surrogate key.
    pub fn subject_key(&self) -> Result<SurrogateKey, JwtError> {
        self.sub
            .parse()
            .map_err(|_| JwtError::invalid_claims("sub is not a valid subject"))
    }

    pub fn principal(&self) -> Result<Principal, JwtError> {
        Ok(Principal::new(self.subject_key()?, self.uid))
    }

    pub fn issued_at(&self) -> Result<OffsetDateTime, JwtError> {
        OffsetDateTime::from_unix_timestamp(self.iat)
            .map_err(|_| JwtError::invalid_claims("iat out of range"))
    }

    pub fn expires_at(&self) -> Result<OffsetDateTime, JwtError> {
        OffsetDateTime::from_unix_timestamp(self.exp)
            .map_err(|_| JwtError::invalid_claims("exp out of range"))
    }

    /// A token is expired from the instant `exp` is reached, extended by `leeway`.
    pub fn is_expired_at(&self, now: OffsetDateTime, leeway: Duration) -> bool {
        now.unix_timestamp() >= self.exp.saturating_add(leeway.whole_seconds())
    }
}
