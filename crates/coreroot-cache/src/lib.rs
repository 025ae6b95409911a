//! # coreroot-cache
//!
//! Cache-aside reads for posts and comments with synchronous, tag-based
//! invalidation on every write.
//!
//! ## Usage
//!
//! ```ignore
//! let backend = config.build(clock).await;
//! let cache = Arc::new(CacheAside::new(backend, config.ttl));
//! let content = CoherentStore::new(store, cache, translator);
//!
//! let post = content.get(&reference, key).await?;   // cached
//! content.update(ResourceKind::Post, key, update).await?; // invalidates before returning
//! ```
//!
//! Reads after a write returns never observe the pre-write value, whichever
//! backend is configured.

mod aside;
mod coherent;
mod config;
mod error;
mod key;
mod store;

pub use aside::{CacheAside, CacheStats};
pub use coherent::CoherentStore;
pub use config::{CacheBackendKind, CacheConfig};
pub use error::CacheError;
pub use key::{CacheKey, Tag};
pub use store::{CacheStore, LocalCacheStore, RedisCacheStore, RedisPoolConfig};

/// Type alias for cache backend results.
pub type CacheResult<T> = Result<T, CacheError>;
