use coreroot_core::{ExternalId, SurrogateKey};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The account a token is issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub key: SurrogateKey,
    pub external_id: ExternalId,
}

impl Principal {
    pub fn new(key: SurrogateKey, external_id: ExternalId) -> Self {
        Self { key, external_id }
    }
}

/// An authenticated principal together with the access token that proved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Internal surrogate key; never leaves the process.
    pub key: SurrogateKey,
    /// Public identifier of the account.
    pub external_id: ExternalId,
    /// `jti` of the access token.
    pub token_id: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Identity {
    pub fn principal(&self) -> Principal {
        Principal::new(self.key, self.external_id)
    }

    /// Whether this identity owns something owned by `owner`.
    pub fn owns(&self, owner: SurrogateKey) -> bool {
        self.key == owner
    }
}

/// An access/refresh token pair as returned by login and refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("access_expires_at", &self.access_expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}
