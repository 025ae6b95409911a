use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use coreroot_auth::AuthConfig;
use coreroot_cache::{CacheConfig, CacheError};
use coreroot_storage::Page;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("auth config error: {0}")]
    Auth(#[from] coreroot_auth::ConfigError),

    #[error("cache config error: {0}")]
    Cache(#[from] CacheError),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token signing, lifetimes and password policy
    #[serde(default)]
    pub auth: AuthConfig,
    /// Cache backend and entry lifetime
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;
        self.pagination.validate()?;
        self.auth.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::invalid("server.port must be > 0"));
        }
        if self.body_limit_bytes == 0 {
            return Err(ConfigError::invalid("server.body_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let lvl = self.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::invalid(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        Ok(())
    }
}

/// Limit/offset pagination bounds for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_limit() -> usize {
    coreroot_storage::DEFAULT_PAGE_SIZE
}

fn default_max_limit() -> usize {
    coreroot_storage::MAX_PAGE_SIZE
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::invalid("pagination.default_limit must be > 0"));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::invalid(
                "pagination.default_limit must be <= pagination.max_limit",
            ));
        }
        Ok(())
    }

    /// Builds a page from query parameters within these bounds.
    pub fn page(&self, limit: Option<usize>, offset: Option<usize>) -> Page {
        Page::bounded(limit, offset, self.default_limit, self.max_limit)
    }
}

pub mod loader {
    use std::path::PathBuf;

    use ::config::{Config, Environment, File};

    use super::{AppConfig, ConfigError};

    /// Default configuration file, read from the working directory if present.
    pub const DEFAULT_CONFIG_FILE: &str = "coreroot.toml";

    /// Environment variable prefix; `COREROOT__SERVER__PORT=9090` overrides
    /// `server.port`.
    pub const ENV_PREFIX: &str = "COREROOT";

    /// Fallback signing secret variable, read when `auth.signing.secret` is
    /// not configured.
    pub const SECRET_KEY_VAR: &str = "SECRET_KEY";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );

        let mut merged: AppConfig = builder.build()?.try_deserialize()?;

        if merged.auth.signing.secret.is_none() {
            if let Ok(secret) = std::env::var(SECRET_KEY_VAR) {
                if !secret.is_empty() {
                    merged.auth.signing.secret = Some(secret);
                }
            }
        }

        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.pagination.default_limit, 10);
        assert_eq!(cfg.pagination.max_limit, 100);
    }

    #[test]
    fn test_addr_falls_back_to_unspecified() {
        let mut cfg = AppConfig::default();
        cfg.server.host = "not-an-ip".to_string();
        cfg.server.port = 9000;
        assert_eq!(cfg.addr().to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_log_level() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn test_pagination_bounds() {
        let pagination = PaginationConfig {
            default_limit: 20,
            max_limit: 50,
        };
        assert_eq!(pagination.page(None, None).limit, 20);
        assert_eq!(pagination.page(Some(500), Some(3)).limit, 50);
        assert_eq!(pagination.page(Some(500), Some(3)).offset, 3);

        let invalid = PaginationConfig {
            default_limit: 60,
            max_limit: 50,
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_section_errors_are_wrapped() {
        let mut cfg = AppConfig::default();
        cfg.auth.issuer = String::new();
        assert!(matches!(cfg.validate(), Err(ConfigError::Auth(_))));

        let mut cfg = AppConfig::default();
        cfg.cache.max_entries = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Cache(_))));
    }
}
