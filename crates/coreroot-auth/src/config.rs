//! Authentication configuration.
//!
//! Token lifetimes follow the usual short-access / long-refresh split:
//! access tokens live for minutes, refresh tokens for a day.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum length of an HMAC signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Root authentication configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "coreroot"
///
/// [auth.signing]
/// algorithm = "HS256"
/// secret = "change-me-to-at-least-thirty-two-bytes"
///
/// [auth.tokens]
/// access_token_lifetime = "5m"
/// refresh_token_lifetime = "1d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value of the `iss` claim; tokens with another issuer are rejected.
    pub issuer: String,

    /// Token signing configuration.
    pub signing: SigningConfig,

    /// Token lifetime configuration.
    pub tokens: TokenLifetimeConfig,

    /// Password policy for registration.
    pub passwords: PasswordConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "coreroot".to_string(),
            signing: SigningConfig::default(),
            tokens: TokenLifetimeConfig::default(),
            passwords: PasswordConfig::default(),
        }
    }
}

/// Token signing configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Signing algorithm.
    /// Supported: "HS256", "HS384", "HS512"
    pub algorithm: String,

    /// Key id placed in the token header.
    pub key_id: String,

    /// Current signing secret. When absent an ephemeral secret is generated
    /// at startup and tokens do not survive a restart.
    pub secret: Option<String>,

    /// Retired secrets still accepted for verification, as `kid` -> secret.
    pub previous_secrets: Vec<PreviousSecret>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            key_id: "primary".to_string(),
            secret: None,
            previous_secrets: Vec::new(),
        }
    }
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningConfig")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("previous_secrets", &self.previous_secrets.len())
            .finish()
    }
}

/// A retired signing secret kept for verification only.
#[derive(Clone, Deserialize, Serialize)]
pub struct PreviousSecret {
    pub key_id: String,
    pub secret: String,
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimeConfig {
    /// Access token lifetime.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,

    /// Clock skew tolerated when checking expiry.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for TokenLifetimeConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(5 * 60), // 5 minutes
            refresh_token_lifetime: Duration::from_secs(24 * 3600), // 1 day
            leeway: Duration::ZERO,
        }
    }
}

/// Password policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Minimum password length in characters.
    pub min_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self { min_length: 8 }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty
    /// - The signing algorithm is not supported
    /// - A configured secret is shorter than [`MIN_SECRET_LEN`] bytes
    /// - The access token does not expire strictly before the refresh token
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        match self.signing.algorithm.as_str() {
            "HS256" | "HS384" | "HS512" => {}
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid signing algorithm: '{}'. Must be HS256, HS384, or HS512",
                    other
                )));
            }
        }

        if self.signing.key_id.is_empty() {
            return Err(ConfigError::Missing("signing.key_id".to_string()));
        }

        let secrets = self
            .signing
            .secret
            .iter()
            .chain(self.signing.previous_secrets.iter().map(|p| &p.secret));
        for secret in secrets {
            if secret.len() < MIN_SECRET_LEN {
                return Err(ConfigError::InvalidValue(format!(
                    "signing secrets must be at least {MIN_SECRET_LEN} bytes"
                )));
            }
        }

        if self.tokens.access_token_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be > 0".to_string(),
            ));
        }

        if self.tokens.access_token_lifetime >= self.tokens.refresh_token_lifetime {
            return Err(ConfigError::InvalidValue(
                "access_token_lifetime must be shorter than refresh_token_lifetime".to_string(),
            ));
        }

        if self.passwords.min_length == 0 {
            return Err(ConfigError::InvalidValue(
                "passwords.min_length must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.issuer, "coreroot");
        assert_eq!(config.signing.algorithm, "HS256");
        assert!(config.signing.secret.is_none());
        assert_eq!(
            config.tokens.access_token_lifetime,
            Duration::from_secs(300)
        );
        assert_eq!(
            config.tokens.refresh_token_lifetime,
            Duration::from_secs(86400)
        );
    }

    #[test]
    fn test_default_config_validates() {
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_issuer_fails_validation() {
        let mut config = AuthConfig::default();
        config.issuer = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("issuer"));
    }

    #[test]
    fn test_invalid_algorithm_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.algorithm = "RS256".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing algorithm"));
    }

    #[test]
    fn test_short_secret_fails_validation() {
        let mut config = AuthConfig::default();
        config.signing.secret = Some("short".to_string());
        assert!(config.validate().is_err());

        config.signing.secret = Some("x".repeat(MIN_SECRET_LEN));
        assert!(config.validate().is_ok());

        config.signing.previous_secrets.push(PreviousSecret {
            key_id: "old".to_string(),
            secret: "tiny".to_string(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lifetime_ordering_enforced() {
        let mut config = AuthConfig::default();
        config.tokens.access_token_lifetime = Duration::from_secs(86400);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shorter"));
    }

    #[test]
    fn test_humantime_deserialization() {
        let json = r#"{
            "issuer": "test",
            "tokens": { "access_token_lifetime": "2m", "refresh_token_lifetime": "7d" }
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tokens.access_token_lifetime, Duration::from_secs(120));
        assert_eq!(
            config.tokens.refresh_token_lifetime,
            Duration::from_secs(7 * 86400)
        );
        assert_eq!(config.tokens.leeway, Duration::ZERO);
        assert_eq!(config.signing.algorithm, "HS256");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = AuthConfig::default();
        config.signing.secret = Some("super-secret-value-that-is-long-enough".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue("test error".to_string());
        assert_eq!(err.to_string(), "Invalid configuration value: test error");

        let err = ConfigError::Missing("signing.key_id".to_string());
        assert_eq!(
            err.to_string(),
            "Missing required configuration: signing.key_id"
        );
    }
}
