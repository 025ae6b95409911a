//! Cache backends.
//!
//! ## Backends
//!
//! - **Local**: single-instance, sharded in-memory map with a tag index
//! - **Redis**: shared across instances, native TTL, tags kept as Redis sets
//!
//! Backends store opaque bytes. Expiry, tags and deletion are their concern;
//! coherence checks live in [`CacheAside`](crate::CacheAside).

use std::time::Duration;

use async_trait::async_trait;

use crate::CacheResult;
use crate::key::{CacheKey, Tag};

mod local;
mod redis;

pub use self::local::LocalCacheStore;
pub use self::redis::{RedisCacheStore, RedisPoolConfig};

/// A byte-oriented cache backend with tag-based invalidation.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored bytes, or `None` if absent or expired.
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>>;

    /// Stores `value` under `key` for `ttl`, registering it under each tag.
    async fn set(&self, key: &CacheKey, value: Vec<u8>, tags: &[Tag], ttl: Duration)
    -> CacheResult<()>;

    /// Removes a single key.
    async fn delete(&self, key: &CacheKey) -> CacheResult<()>;

    /// Removes every key registered under any of `tags`.
    ///
    /// Idempotent: invalidating an unknown or already-invalidated tag is a
    /// no-op. Returns the number of keys removed.
    async fn invalidate_tags(&self, tags: &[Tag]) -> CacheResult<usize>;

    /// Short backend name for logs and stats.
    fn backend_name(&self) -> &'static str;
}
