//! Signing key material.
//!
//! Tokens are signed with HMAC secrets. The [`KeyRing`] holds the current
//! signing key plus retired keys that are still accepted for verification,
//! so secrets can be rotated without invalidating outstanding tokens.

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::config::{MIN_SECRET_LEN, SigningConfig};
use crate::token::jwt::JwtError;

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            other => Err(JwtError::invalid_key(format!(
                "unsupported signing algorithm '{other}'"
            ))),
        }
    }
}

/// One HMAC key, identified by its `kid`.
#[derive(Clone)]
pub struct SigningKey {
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Builds a key from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn from_secret(
        kid: impl Into<String>,
        algorithm: SigningAlgorithm,
        secret: &[u8],
    ) -> Result<Self, JwtError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::invalid_key(format!(
                "secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Generates a random 512-bit secret with a random `kid`.
    pub fn generate(algorithm: SigningAlgorithm) -> Result<Self, JwtError> {
        let mut secret = [0u8; 64];
        OsRng
            .try_fill_bytes(&mut secret)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        let mut kid = [0u8; 8];
        OsRng
            .try_fill_bytes(&mut kid)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Self::from_secret(hex::encode(kid), algorithm, &secret)
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Current signing key plus retired verification keys.
#[derive(Debug, Clone)]
pub struct KeyRing {
    current: SigningKey,
    retired: Vec<SigningKey>,
}

impl KeyRing {
    #[must_use]
    pub fn new(current: SigningKey) -> Self {
        Self {
            current,
            retired: Vec::new(),
        }
    }

    /// Adds a key that verifies but no longer signs.
    #[must_use]
    pub fn with_retired(mut self, key: SigningKey) -> Self {
        self.retired.push(key);
        self
    }

    /// Builds the ring from configuration.
    ///
    /// Without a configured secret an ephemeral key is generated; tokens it
    /// signs become unverifiable after a restart.
    pub fn from_config(config: &SigningConfig) -> Result<Self, JwtError> {
        let algorithm: SigningAlgorithm = config.algorithm.parse()?;

        let current = match &config.secret {
            Some(secret) => SigningKey::from_secret(&config.key_id, algorithm, secret.as_bytes())?,
            None => {
                let key = SigningKey::generate(algorithm)?;
                tracing::warn!(
                    kid = %key.kid,
                    "No signing secret configured, using an ephemeral key"
                );
                key
            }
        };

        let mut ring = Self::new(current);
        for previous in &config.previous_secrets {
            ring = ring.with_retired(SigningKey::from_secret(
                &previous.key_id,
                algorithm,
                previous.secret.as_bytes(),
            )?);
        }
        Ok(ring)
    }

    /// The key new tokens are signed with.
    #[must_use]
    pub fn current(&self) -> &SigningKey {
        &self.current
    }

    /// Finds a key by `kid`, current first.
    #[must_use]
    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        std::iter::once(&self.current)
            .chain(self.retired.iter())
            .find(|key| key.kid == kid)
    }

    pub fn len(&self) -> usize {
        1 + self.retired.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviousSecret;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("HS512".parse::<SigningAlgorithm>().unwrap(), SigningAlgorithm::HS512);
        assert!("RS256".parse::<SigningAlgorithm>().is_err());
        assert_eq!(SigningAlgorithm::HS384.to_string(), "HS384");
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = SigningKey::from_secret("k", SigningAlgorithm::HS256, b"short").unwrap_err();
        assert!(matches!(err, JwtError::InvalidKey { .. }));
    }

    #[test]
    fn test_generated_keys_differ() {
        let a = SigningKey::generate(SigningAlgorithm::HS256).unwrap();
        let b = SigningKey::generate(SigningAlgorithm::HS256).unwrap();
        assert_ne!(a.kid, b.kid);
        assert_eq!(a.kid.len(), 16);
    }

    #[test]
    fn test_find_searches_retired_keys() {
        let ring = KeyRing::new(SigningKey::from_secret("new", SigningAlgorithm::HS256, SECRET).unwrap())
            .with_retired(SigningKey::from_secret("old", SigningAlgorithm::HS256, SECRET).unwrap());

        assert_eq!(ring.current().kid, "new");
        assert!(ring.find("old").is_some());
        assert!(ring.find("missing").is_none());
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn test_from_config() {
        let config = SigningConfig {
            algorithm: "HS384".to_string(),
            key_id: "v2".to_string(),
            secret: Some(String::from_utf8(SECRET.to_vec()).unwrap()),
            previous_secrets: vec![PreviousSecret {
                key_id: "v1".to_string(),
                secret: "an-older-secret-that-is-long-enough!!".to_string(),
            }],
        };
        let ring = KeyRing::from_config(&config).unwrap();
        assert_eq!(ring.current().kid, "v2");
        assert_eq!(ring.current().algorithm, SigningAlgorithm::HS384);
        assert!(ring.find("v1").is_some());
    }

    #[test]
    fn test_from_config_without_secret_generates_key() {
        let ring = KeyRing::from_config(&SigningConfig::default()).unwrap();
        assert_eq!(ring.current().algorithm, SigningAlgorithm::HS256);
        assert_ne!(ring.current().kid, "primary");
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = SigningKey::from_secret("k1", SigningAlgorithm::HS256, SECRET).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("k1"));
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
