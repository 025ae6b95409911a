//! Token service: issuing, rotating, revoking and checking tokens.
//!
//! - Login issues an access/refresh pair
//! - Refresh rotates: the presented refresh token is revoked before the new
//!   pair is issued, so each refresh token is usable at most once
//! - Logout revokes a refresh token
//! - Authentication checks an access token by signature and expiry only
//!
//! # Usage
//!
//! ```ignore
//! use coreroot_auth::token::{TokenConfig, TokenService};
//!
//! let service = TokenService::new(codec, revoked_storage, TokenConfig::default());
//! let pair = service.issue_token_pair(&principal)?;
//! let identity = service.authenticate(&pair.access)?;
//! let rotated = service.refresh(&pair.refresh).await?;
//! ```

use std::sync::Arc;

use time::Duration;

use coreroot_core::Clock;

use crate::AuthResult;
use crate::config::TokenLifetimeConfig;
use crate::error::AuthError;
use crate::storage::RevokedTokenStorage;
use crate::token::claims::{TokenClaims, TokenType};
use crate::token::jwt::{JwtCodec, JwtError};
use crate::types::{Identity, Principal, TokenPair};

/// Token service for issuing and validating tokens.
pub struct TokenService {
    /// Codec for encoding/decoding tokens.
    codec: Arc<JwtCodec>,

    /// Revoked refresh token storage.
    revoked: Arc<dyn RevokedTokenStorage>,

    /// Service configuration.
    config: TokenConfig,
}

/// Configuration for the token service.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Access token lifetime.
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    pub refresh_token_lifetime: Duration,
}

impl TokenConfig {
    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::minutes(5),
            refresh_token_lifetime: Duration::days(1),
        }
    }
}

impl From<&TokenLifetimeConfig> for TokenConfig {
    fn from(config: &TokenLifetimeConfig) -> Self {
        let defaults = Self::default();
        Self {
            access_token_lifetime: Duration::try_from(config.access_token_lifetime)
                .unwrap_or(defaults.access_token_lifetime),
            refresh_token_lifetime: Duration::try_from(config.refresh_token_lifetime)
                .unwrap_or(defaults.refresh_token_lifetime),
        }
    }
}

impl TokenService {
    /// Creates a new token service.
    ///
    /// # Arguments
    ///
    /// * `codec` - Codec for token encoding/decoding
    /// * `revoked` - Storage for revoked refresh token JTIs
    /// * `config` - Service configuration
    #[must_use]
    pub fn new(
        codec: Arc<JwtCodec>,
        revoked: Arc<dyn RevokedTokenStorage>,
        config: TokenConfig,
    ) -> Self {
        Self {
            codec,
            revoked,
            config,
        }
    }

    /// Issues a fresh access/refresh pair for a principal.
    ///
    /// Requires no prior state; the refresh token carries a new JTI.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn issue_token_pair(&self, principal: &Principal) -> AuthResult<TokenPair> {
        let now = self.codec.clock().now();
        let issuer = self.codec.issuer();

        let access_claims = TokenClaims::new(
            issuer,
            principal,
            TokenType::Access,
            now,
            self.config.access_token_lifetime,
        );
        let refresh_claims = TokenClaims::new(
            issuer,
            principal,
            TokenType::Refresh,
            now,
            self.config.refresh_token_lifetime,
        );

        let access = self
            .codec
            .encode(&access_claims)
            .map_err(|e| AuthError::internal(format!("Failed to encode access token: {e}")))?;
        let refresh = self
            .codec
            .encode(&refresh_claims)
            .map_err(|e| AuthError::internal(format!("Failed to encode refresh token: {e}")))?;

        Ok(TokenPair {
            access,
            refresh,
            access_expires_at: now + self.config.access_token_lifetime,
            refresh_expires_at: now + self.config.refresh_token_lifetime,
        })
    }

    /// Exchanges a refresh token for a new pair, revoking the old one.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenExpired` if the refresh token has expired
    /// - `AuthError::TokenRevoked` if it was logged out or already used
    /// - `AuthError::InvalidToken` for anything else wrong with it
    ///
    /// # Security
    ///
    /// The old JTI is revoked before the new pair is issued, and revocation
    /// reports whether this caller was the first. Two concurrent refreshes of
    /// the same token therefore yield exactly one success.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self
            .codec
            .decode(refresh_token, TokenType::Refresh)
            .map_err(token_failure)?;

        if self.revoked.is_revoked(&claims.jti).await? {
            tracing::warn!(jti = %claims.jti, sub = %claims.sub, "Revoked refresh token presented");
            return Err(AuthError::TokenRevoked);
        }

        let principal = claims.principal().map_err(token_failure)?;
        let expires_at = claims.expires_at().map_err(token_failure)?;

        if !self.revoked.revoke(&claims.jti, expires_at).await? {
            tracing::warn!(
                jti = %claims.jti,
                sub = %claims.sub,
                "Refresh token reused concurrently"
            );
            return Err(AuthError::TokenRevoked);
        }

        let pair = self.issue_token_pair(&principal)?;
        tracing::debug!(user = %principal.key, "Refresh token rotated");
        Ok(pair)
    }

    /// Revokes a refresh token. Idempotent.
    ///
    /// An expired but authentic token needs no revocation and succeeds as a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is not an authentic
    /// refresh token.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let claims = self
            .codec
            .decode_allow_expired(refresh_token, TokenType::Refresh)
            .map_err(token_failure)?;

        let now = self.codec.clock().now();
        if claims.is_expired_at(now, Duration::ZERO) {
            tracing::debug!(jti = %claims.jti, "Logout with expired refresh token");
            return Ok(());
        }

        let expires_at = claims.expires_at().map_err(token_failure)?;
        let newly_revoked = self.revoked.revoke(&claims.jti, expires_at).await?;
        tracing::info!(sub = %claims.sub, newly_revoked, "Refresh token revoked");
        Ok(())
    }

    /// Authenticates an access token.
    ///
    /// Checks signature, issuer, type and expiry only; the revocation store is
    /// never consulted, so an access token stays valid until it expires even
    /// after logout.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenExpired` if the token has expired
    /// - `AuthError::Unauthenticated` for any other failure
    pub fn authenticate(&self, access_token: &str) -> AuthResult<Identity> {
        let claims = self
            .codec
            .decode(access_token, TokenType::Access)
            .map_err(|e| match e {
                JwtError::Expired => AuthError::TokenExpired,
                other => AuthError::unauthenticated(other.to_string()),
            })?;

        let principal = claims
            .principal()
            .map_err(|e| AuthError::unauthenticated(e.to_string()))?;
        let issued_at = claims
            .issued_at()
            .map_err(|e| AuthError::unauthenticated(e.to_string()))?;
        let expires_at = claims
            .expires_at()
            .map_err(|e| AuthError::unauthenticated(e.to_string()))?;

        Ok(Identity {
            key: principal.key,
            external_id: principal.external_id,
            token_id: claims.jti,
            issued_at,
            expires_at,
        })
    }

    /// Returns the codec.
    #[must_use]
    pub fn codec(&self) -> &Arc<JwtCodec> {
        &self.codec
    }

    /// Returns the service configuration.
    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

/// Maps refresh/logout decode failures: expiry stays distinct, everything
/// else is an invalid token.
fn token_failure(err: JwtError) -> AuthError {
    match err {
        JwtError::Expired => AuthError::TokenExpired,
        other => AuthError::invalid_token(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRevokedTokenStorage;
    use crate::token::keys::{KeyRing, SigningAlgorithm, SigningKey};
    use async_trait::async_trait;
    use coreroot_core::{ExternalId, ManualClock, SurrogateKey};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    const SECRET: &[u8] = b"token-service-test-secret-32byte";

    struct Fixture {
        clock: Arc<ManualClock>,
        revoked: Arc<InMemoryRevokedTokenStorage>,
        service: TokenService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::starting_now());
        let key = SigningKey::from_secret("k1", SigningAlgorithm::HS256, SECRET).unwrap();
        let codec = Arc::new(JwtCodec::new(KeyRing::new(key), "coreroot", clock.clone()));
        let revoked = Arc::new(InMemoryRevokedTokenStorage::new(clock.clone()));
        let service = TokenService::new(codec, revoked.clone(), TokenConfig::default());
        Fixture {
            clock,
            revoked,
            service,
        }
    }

    fn principal() -> Principal {
        Principal::new(SurrogateKey(7), ExternalId::generate())
    }

    #[test]
    fn test_issue_pair_has_distinct_expiries() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();
        assert_ne!(pair.access, pair.refresh);
        assert!(pair.access_expires_at < pair.refresh_expires_at);
        assert_eq!(
            pair.refresh_expires_at - pair.access_expires_at,
            Duration::days(1) - Duration::minutes(5)
        );
    }

    #[test]
    fn test_authenticate_access_token() {
        let f = fixture();
        let p = principal();
        let pair = f.service.issue_token_pair(&p).unwrap();

        let identity = f.service.authenticate(&pair.access).unwrap();
        assert_eq!(identity.key, p.key);
        assert_eq!(identity.external_id, p.external_id);
        assert_eq!(identity.principal(), p);
    }

    #[test]
    fn test_authenticate_rejects_refresh_token() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();
        let err = f.service.authenticate(&pair.refresh).unwrap_err();
        assert!(matches!(err, AuthError::Unauthenticated { .. }));
    }

    #[test]
    fn test_authenticate_expired_and_garbage() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();

        f.clock.advance(Duration::minutes(5));
        assert!(matches!(
            f.service.authenticate(&pair.access),
            Err(AuthError::TokenExpired)
        ));
        assert!(matches!(
            f.service.authenticate("not-a-token"),
            Err(AuthError::Unauthenticated { .. })
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let f = fixture();
        let p = principal();
        let pair = f.service.issue_token_pair(&p).unwrap();

        let rotated = f.service.refresh(&pair.refresh).await.unwrap();
        assert_ne!(rotated.refresh, pair.refresh);
        assert_eq!(f.service.authenticate(&rotated.access).unwrap().key, p.key);

        let err = f.service.refresh(&pair.refresh).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));

        // The rotated token is still good.
        assert!(f.service.refresh(&rotated.refresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_expired() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();
        f.clock.advance(Duration::days(1));
        assert!(matches!(
            f.service.refresh(&pair.refresh).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();
        assert!(matches!(
            f.service.refresh(&pair.access).await,
            Err(AuthError::InvalidToken { .. })
        ));
        assert!(f.revoked.is_empty());
    }

    #[tokio::test]
    async fn test_logout_twice_succeeds() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();

        f.service.logout(&pair.refresh).await.unwrap();
        f.service.logout(&pair.refresh).await.unwrap();
        assert_eq!(f.revoked.len(), 1);

        assert!(matches!(
            f.service.refresh(&pair.refresh).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_logout_does_not_affect_access_token() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();
        f.service.logout(&pair.refresh).await.unwrap();
        assert!(f.service.authenticate(&pair.access).is_ok());
    }

    #[tokio::test]
    async fn test_logout_expired_is_noop_and_invalid_fails() {
        let f = fixture();
        let pair = f.service.issue_token_pair(&principal()).unwrap();
        f.clock.advance(Duration::days(2));

        f.service.logout(&pair.refresh).await.unwrap();
        assert!(f.revoked.is_empty());

        assert!(matches!(
            f.service.logout("garbage").await,
            Err(AuthError::InvalidToken { .. })
        ));
    }

    /// Revocation storage that always says "not revoked" on lookup, so only
    /// the atomic `revoke` stands between two concurrent refreshes.
    #[derive(Default)]
    struct RacyRevokedStorage {
        first: std::sync::Mutex<Option<String>>,
        revoke_calls: AtomicUsize,
    }

    #[async_trait]
    impl RevokedTokenStorage for RacyRevokedStorage {
        async fn revoke(&self, jti: &str, _expires_at: OffsetDateTime) -> AuthResult<bool> {
            self.revoke_calls.fetch_add(1, Ordering::SeqCst);
            let mut first = self.first.lock().unwrap();
            if first.as_deref() == Some(jti) {
                return Ok(false);
            }
            *first = Some(jti.to_string());
            Ok(true)
        }

        async fn is_revoked(&self, _jti: &str) -> AuthResult<bool> {
            Ok(false)
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_refresh_relies_on_atomic_revoke() {
        let clock = Arc::new(ManualClock::starting_now());
        let key = SigningKey::from_secret("k1", SigningAlgorithm::HS256, SECRET).unwrap();
        let codec = Arc::new(JwtCodec::new(KeyRing::new(key), "coreroot", clock));
        let storage = Arc::new(RacyRevokedStorage::default());
        let service = TokenService::new(codec, storage.clone(), TokenConfig::default());

        let pair = service.issue_token_pair(&principal()).unwrap();
        assert!(service.refresh(&pair.refresh).await.is_ok());
        assert!(matches!(
            service.refresh(&pair.refresh).await,
            Err(AuthError::TokenRevoked)
        ));
        assert_eq!(storage.revoke_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_config_from_lifetimes() {
        let lifetimes = TokenLifetimeConfig {
            access_token_lifetime: std::time::Duration::from_secs(60),
            refresh_token_lifetime: std::time::Duration::from_secs(3600),
            leeway: std::time::Duration::ZERO,
        };
        let config = TokenConfig::from(&lifetimes);
        assert_eq!(config.access_token_lifetime, Duration::minutes(1));
        assert_eq!(config.refresh_token_lifetime, Duration::hours(1));
    }
}
