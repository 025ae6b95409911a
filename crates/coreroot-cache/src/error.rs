//! Cache error types.
//!
//! Cache errors never reach API clients: [`CacheAside`](crate::CacheAside)
//! logs them and falls back to computing the value directly.

/// Errors raised by cache backends and envelope encoding.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend could not be reached.
    #[error("Cache backend unavailable: {message}")]
    Unavailable { message: String },

    /// The backend answered with an error.
    #[error("Cache backend error: {message}")]
    Backend { message: String },

    /// A value could not be encoded for storage.
    #[error("Failed to encode cache entry: {message}")]
    Encode { message: String },

    /// A stored entry could not be decoded.
    #[error("Corrupt cache entry '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Invalid cache configuration.
    #[error("Cache configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the failure came from the backend rather than the data.
    #[must_use]
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Backend { .. })
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
            Self::unavailable(err.to_string())
        } else {
            Self::backend(err.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for CacheError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        Self::unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_failure_classification() {
        assert!(CacheError::unavailable("down").is_backend_failure());
        assert!(CacheError::backend("WRONGTYPE").is_backend_failure());
        assert!(!CacheError::corrupt("k", "bad").is_backend_failure());
        assert!(!CacheError::encode("bad").is_backend_failure());
    }

    #[test]
    fn test_display() {
        let err = CacheError::corrupt("coreroot:post:1", "truncated");
        assert_eq!(
            err.to_string(),
            "Corrupt cache entry 'coreroot:post:1': truncated"
        );
    }
}
