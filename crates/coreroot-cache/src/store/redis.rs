use std::time::Duration;

use ::redis::AsyncCommands;
use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};

use super::CacheStore;
use crate::CacheResult;
use crate::error::CacheError;
use crate::key::{CacheKey, Tag};

const TAG_PREFIX: &str = "coreroot:tag:";

/// Connection pool settings for [`RedisCacheStore`].
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    pub url: String,
    pub pool_size: usize,
    pub timeout: Duration,
}

/// Cache shared across instances, backed by Redis.
///
/// Entries are written with `SET .. EX`; each tag is a Redis set of the keys
/// carrying it (`SADD`), read back with `SMEMBERS` and removed with `DEL` on
/// invalidation. A tag set's expiry is reset on every write to it.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates a pool and checks that a connection can be made.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` for a bad URL and
    /// `CacheError::Unavailable` if Redis cannot be reached.
    pub async fn connect(config: &RedisPoolConfig) -> CacheResult<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let mut pool_config = PoolConfig::new(config.pool_size.max(1));
        pool_config.timeouts.wait = Some(config.timeout);
        pool_config.timeouts.create = Some(config.timeout);
        pool_config.timeouts.recycle = Some(config.timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::configuration(e.to_string()))?;

        // Test connection
        pool.get().await?;
        Ok(Self::new(pool))
    }

    fn tag_key(tag: &Tag) -> String {
        format!("{TAG_PREFIX}{tag}")
    }
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisCacheStore")
            .field("pool_size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.pool.get().await?;
        let data: Option<Vec<u8>> = conn.get(key.as_str()).await?;
        Ok(data)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        tags: &[Tag],
        ttl: Duration,
    ) -> CacheResult<()> {
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.pool.get().await?;

        let mut pipe = ::redis::pipe();
        pipe.atomic();
        for tag in tags {
            let tag_key = Self::tag_key(tag);
            pipe.sadd(&tag_key, key.as_str()).ignore();
            pipe.expire(&tag_key, ttl_secs as i64).ignore();
        }
        pipe.set_ex(key.as_str(), value, ttl_secs).ignore();

        let () = pipe.query_async(&mut conn).await?;
        tracing::debug!(key = %key, ttl_secs, "cache set (redis)");
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key.as_str()).await?;
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[Tag]) -> CacheResult<usize> {
        let mut conn = self.pool.get().await?;
        let mut removed = 0;

        for tag in tags {
            let tag_key = Self::tag_key(tag);
            let keys: Vec<String> = conn.smembers(&tag_key).await?;

            let mut doomed = keys;
            doomed.push(tag_key);
            let deleted: usize = conn.del(&doomed).await?;
            // The tag set itself was one of the deleted keys.
            removed += deleted.saturating_sub(1);
        }

        tracing::debug!(removed, "cache invalidated (redis)");
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
