//! JWT token encoding and verification.
//!
//! Tokens are compact HMAC-signed JWTs. Signature, issuer and token type are
//! verified by [`JwtCodec::decode`]; expiry is checked afterwards against the
//! injected clock, so a forged token is always reported as invalid rather
//! than expired.
//!
//! ## Example
//!
//! ```ignore
//! use coreroot_auth::token::{JwtCodec, KeyRing, SigningKey, SigningAlgorithm, TokenType};
//!
//! let keys = KeyRing::new(SigningKey::generate(SigningAlgorithm::HS256)?);
//! let codec = JwtCodec::new(keys, "coreroot", clock);
//!
//! let token = codec.encode(&claims)?;
//! let claims = codec.decode(&token, TokenType::Access)?;
//! ```

use coreroot_core::{Clock, SharedClock};
use jsonwebtoken::{Header, Validation, decode, decode_header, encode};
use time::Duration;

use crate::token::claims::{TokenClaims, TokenType};
use crate::token::keys::{KeyRing, SigningKey};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// The specified key was not found.
    #[error("Key not found: {kid}")]
    KeyNotFound {
        /// The key ID that was not found.
        kid: String,
    },

    /// Failed to generate a cryptographic key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::decoding_error(err.to_string()),
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// JWT Codec
// ============================================================================

/// Encodes and verifies tokens.
///
/// This codec is thread-safe (`Send + Sync`) and can be shared across
/// async tasks.
#[derive(Debug)]
pub struct JwtCodec {
    keys: KeyRing,
    issuer: String,
    clock: SharedClock,
    leeway: Duration,
}

impl JwtCodec {
    /// Creates a new codec.
    ///
    /// # Arguments
    /// * `keys` - Signing key plus retired verification keys
    /// * `issuer` - The issuer claim value
    /// * `clock` - Time source for expiry checks
    #[must_use]
    pub fn new(keys: KeyRing, issuer: impl Into<String>, clock: SharedClock) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            clock,
            leeway: Duration::ZERO,
        }
    }

    /// Sets the clock skew tolerated when checking expiry.
    #[must_use]
    pub fn with_leeway(mut self, leeway: std::time::Duration) -> Self {
        self.leeway = Duration::try_from(leeway).unwrap_or(Duration::ZERO);
        self
    }

    /// Encodes claims into a JWT string signed with the current key.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String, JwtError> {
        let key = self.keys.current();
        let mut header = Header::new(key.algorithm.to_jwt_algorithm());
        header.kid = Some(key.kid.clone());

        encode(&header, claims, key.encoding_key())
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and fully validates a token of the expected type.
    ///
    /// # Errors
    /// Returns `JwtError::Expired` only for otherwise valid tokens whose
    /// expiry has passed. Every other failure means the token is not authentic
    /// or not usable for this purpose.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<TokenClaims, JwtError> {
        let claims = self.verify(token, expected)?;
        if claims.is_expired_at(self.clock.now(), self.leeway) {
            return Err(JwtError::Expired);
        }
        Ok(claims)
    }

    /// Decodes a token without checking expiry (signature is still validated).
    ///
    /// # Errors
    /// Returns an error if the token is not authentic or of the wrong type.
    pub fn decode_allow_expired(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, JwtError> {
        self.verify(token, expected)
    }

    /// Returns the current signing key ID.
    #[must_use]
    pub fn current_kid(&self) -> &str {
        &self.keys.current().kid
    }

    /// Returns the issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the clock used for expiry checks.
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    fn verification_key(&self, token: &str) -> Result<&SigningKey, JwtError> {
        let header = decode_header(token)?;
        match header.kid.as_deref() {
            Some(kid) => self
                .keys
                .find(kid)
                .ok_or_else(|| JwtError::key_not_found(kid)),
            None => Ok(self.keys.current()),
        }
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, JwtError> {
        let key = self.verification_key(token)?;

        let mut validation = Validation::new(key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_exp = false; // Checked against our own clock
        validation.validate_aud = false;

        let data = decode::<TokenClaims>(token, key.decoding_key(), &validation)?;
        if data.claims.token_type != expected {
            return Err(JwtError::invalid_claims(format!(
                "expected {expected} token, got {}",
                data.claims.token_type
            )));
        }
        Ok(data.claims)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::token::keys::SigningAlgorithm;
    use crate::types::Principal;
    use coreroot_core::{Clock, ExternalId, ManualClock, SurrogateKey};

    const SECRET: &[u8] = b"an-hmac-secret-that-is-32-bytes!";

    fn codec_with(secret: &[u8], kid: &str, clock: Arc<ManualClock>) -> JwtCodec {
        let key = SigningKey::from_secret(kid, SigningAlgorithm::HS256, secret).unwrap();
        JwtCodec::new(KeyRing::new(key), "coreroot", clock)
    }

    fn claims(clock: &ManualClock, token_type: TokenType, minutes: i64) -> TokenClaims {
        let principal = Principal::new(SurrogateKey(1), ExternalId::generate());
        TokenClaims::new(
            "coreroot",
            &principal,
            token_type,
            clock.now(),
            Duration::minutes(minutes),
        )
    }

    #[test]
    fn test_encode_decode() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(SECRET, "k1", clock.clone());

        let original = claims(&clock, TokenType::Access, 5);
        let token = codec.encode(&original).unwrap();
        let decoded = codec.decode(&token, TokenType::Access).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_expired_at_and_after_exp() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(SECRET, "k1", clock.clone());
        let token = codec.encode(&claims(&clock, TokenType::Access, 5)).unwrap();

        clock.advance(Duration::minutes(5) - Duration::seconds(1));
        assert!(codec.decode(&token, TokenType::Access).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            codec.decode(&token, TokenType::Access),
            Err(JwtError::Expired)
        ));

        // Still authentic when expiry is ignored.
        assert!(codec.decode_allow_expired(&token, TokenType::Access).is_ok());
    }

    #[test]
    fn test_leeway_extends_validity() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(SECRET, "k1", clock.clone())
            .with_leeway(std::time::Duration::from_secs(30));
        let token = codec.encode(&claims(&clock, TokenType::Access, 1)).unwrap();

        clock.advance(Duration::seconds(80));
        assert!(codec.decode(&token, TokenType::Access).is_ok());
        clock.advance(Duration::seconds(10));
        assert!(codec.decode(&token, TokenType::Access).is_err());
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let signer = codec_with(SECRET, "k1", clock.clone());
        let verifier = codec_with(b"a-completely-different-32b-secret", "k1", clock.clone());

        let token = signer.encode(&claims(&clock, TokenType::Access, 5)).unwrap();
        assert!(matches!(
            verifier.decode(&token, TokenType::Access),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_forged_expired_token_is_invalid_not_expired() {
        let clock = Arc::new(ManualClock::starting_now());
        let signer = codec_with(b"a-completely-different-32b-secret", "k1", clock.clone());
        let verifier = codec_with(SECRET, "k1", clock.clone());

        let token = signer.encode(&claims(&clock, TokenType::Access, 1)).unwrap();
        clock.advance(Duration::hours(1));
        let err = verifier.decode(&token, TokenType::Access).unwrap_err();
        assert!(!matches!(err, JwtError::Expired));
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(SECRET, "k1", clock.clone());
        let refresh = codec.encode(&claims(&clock, TokenType::Refresh, 60)).unwrap();

        let err = codec.decode(&refresh, TokenType::Access).unwrap_err();
        assert!(matches!(err, JwtError::InvalidClaims { .. }));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(SECRET, "k1", clock);
        for garbage in ["", "abc", "a.b.c", "eyJhbGciOiJIUzI1NiJ9..sig"] {
            let err = codec.decode(garbage, TokenType::Access).unwrap_err();
            assert!(!matches!(err, JwtError::Expired), "{garbage:?}");
        }
    }

    #[test]
    fn test_unknown_kid_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let signer = codec_with(SECRET, "rotated-away", clock.clone());
        let verifier = codec_with(SECRET, "k1", clock.clone());

        let token = signer.encode(&claims(&clock, TokenType::Access, 5)).unwrap();
        assert!(matches!(
            verifier.decode(&token, TokenType::Access),
            Err(JwtError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_retired_key_still_verifies() {
        let clock = Arc::new(ManualClock::starting_now());
        let old = codec_with(SECRET, "v1", clock.clone());
        let token = old.encode(&claims(&clock, TokenType::Access, 5)).unwrap();

        let ring = KeyRing::new(
            SigningKey::from_secret("v2", SigningAlgorithm::HS256, b"the-next-secret-also-32-bytes-ok").unwrap(),
        )
        .with_retired(SigningKey::from_secret("v1", SigningAlgorithm::HS256, SECRET).unwrap());
        let rotated = JwtCodec::new(ring, "coreroot", clock);

        assert!(rotated.decode(&token, TokenType::Access).is_ok());
        assert_eq!(rotated.current_kid(), "v2");
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let clock = Arc::new(ManualClock::starting_now());
        let codec = codec_with(SECRET, "k1", clock.clone());
        let mut foreign = claims(&clock, TokenType::Access, 5);
        foreign.iss = "someone-else".to_string();

        let token = codec.encode(&foreign).unwrap();
        assert!(matches!(
            codec.decode(&token, TokenType::Access),
            Err(JwtError::InvalidClaims { .. })
        ));
    }
}
