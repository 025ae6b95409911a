//! Cache configuration and backend construction.

use std::sync::Arc;
use std::time::Duration;

use coreroot_core::SharedClock;
use serde::{Deserialize, Serialize};

use crate::CacheResult;
use crate::error::CacheError;
use crate::store::{CacheStore, LocalCacheStore, RedisCacheStore, RedisPoolConfig};

/// Which backend holds cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// In-process map, one per instance.
    #[default]
    Local,
    /// A single Redis instance shared by every process.
    Redis,
}

/// Cache configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [cache]
/// backend = "redis"
/// ttl = "5m"
/// redis_url = "redis://localhost:6379"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,

    /// Lifetime of a cache entry.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Capacity of the local backend.
    pub max_entries: usize,

    pub redis_url: String,

    /// Redis connection pool size.
    pub pool_size: usize,

    /// Redis connect, wait and recycle timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Local,
            ttl: Duration::from_secs(5 * 60),
            max_entries: 10_000,
            redis_url: "redis://localhost:6379".to_string(),
            pool_size: 10,
            timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` for a zero TTL, zero capacity, an
    /// empty pool, or a Redis backend without a URL.
    pub fn validate(&self) -> CacheResult<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::configuration("cache.ttl must be > 0"));
        }
        if self.max_entries == 0 {
            return Err(CacheError::configuration("cache.max_entries must be > 0"));
        }
        if self.backend == CacheBackendKind::Redis {
            if self.redis_url.trim().is_empty() {
                return Err(CacheError::configuration(
                    "cache.redis_url is required for the redis backend",
                ));
            }
            if self.pool_size == 0 {
                return Err(CacheError::configuration("cache.pool_size must be > 0"));
            }
        }
        Ok(())
    }

    /// Builds the configured backend.
    ///
    /// If Redis is configured but cannot be reached the local backend is used
    /// instead, so the server starts without it.
    pub async fn build(&self, clock: SharedClock) -> Arc<dyn CacheStore> {
        if self.backend == CacheBackendKind::Local {
            tracing::info!(max_entries = self.max_entries, "Using local cache");
            return Arc::new(LocalCacheStore::new(self.max_entries, clock));
        }

        tracing::info!(url = %self.redis_url, "Connecting to Redis");
        let pool_config = RedisPoolConfig {
            url: self.redis_url.clone(),
            pool_size: self.pool_size,
            timeout: self.timeout,
        };

        match RedisCacheStore::connect(&pool_config).await {
            Ok(store) => {
                tracing::info!("Connected to Redis");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Failed to connect to Redis. Falling back to local cache."
                );
                Arc::new(LocalCacheStore::new(self.max_entries, clock))
            }
        }
    }
}
