//! Cache-aside reads with coherent, synchronous invalidation.
//!
//! ## Read path
//!
//! ```text
//! stamps = generations(tags)          // observed before anything else
//! entry  = store.get(key)
//! hit    → entry.epoch == epoch && entry.stamps == stamps → return value
//! else   → value = compute(); store.set(key, {epoch, stamps, value}); return value
//! ```
//!
//! ## Write path
//!
//! `invalidate` bumps the generation of every affected tag, then deletes the
//! tagged keys from the backend. A read that computed a pre-mutation value
//! and stores it after the invalidation stored it with the old stamps, so the
//! next read treats it as a miss. The same check keeps reads coherent when a
//! backend delete fails.
//!
//! Generations are drawn from one monotonic counter, and a tag's new
//! generation is always above its current one. The per-tag map is bounded:
//! once it outgrows its limit every tag is folded into a shared floor, which
//! is at least every removed generation. Tags without an entry read as the
//! floor, so no stamp taken before an invalidation can match again. Folding
//! only costs a round of misses.
//!
//! ## Graceful Degradation
//!
//! Backend errors never fail a request: reads fall back to `compute`, writes
//! and deletes are logged and skipped. Undecodable entries are discarded.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use coreroot_core::ResourceRef;
use dashmap::DashMap;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::CacheResult;
use crate::error::CacheError;
use crate::key::{CacheKey, Tag};
use crate::store::CacheStore;

/// Stored form of a cached value.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    epoch: u64,
    stamps: Vec<(String, u64)>,
    value: T,
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
    /// Reads that found an entry older than the latest invalidation.
    pub stale: u64,
    /// Reads and writes that skipped the cache because the backend failed.
    pub bypassed: u64,
    /// Entries dropped because they could not be decoded.
    pub corrupt: u64,
    /// Invalidation calls.
    pub invalidations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.stale;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    bypassed: AtomicU64,
    corrupt: AtomicU64,
    invalidations: AtomicU64,
}

/// Default number of tracked tag generations before they are folded.
const DEFAULT_GENERATION_LIMIT: usize = 100_000;

/// Get-or-compute cache in front of the resource store.
pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    generations: DashMap<Tag, u64>,
    next_generation: AtomicU64,
    floor: AtomicU64,
    generation_limit: usize,
    epoch: u64,
    counters: Counters,
}

impl CacheAside {
    /// Create a cache with the given backend and entry TTL.
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            generations: DashMap::new(),
            next_generation: AtomicU64::new(0),
            floor: AtomicU64::new(0),
            generation_limit: DEFAULT_GENERATION_LIMIT,
            epoch: rand::thread_rng().r#gen(),
            counters: Counters::default(),
        }
    }

    /// Caps how many per-tag generations are tracked before folding.
    #[must_use]
    pub fn with_generation_limit(mut self, limit: usize) -> Self {
        self.generation_limit = limit.max(1);
        self
    }

    /// Number of tags with a tracked generation.
    pub fn tracked_generations(&self) -> usize {
        self.generations.len()
    }

    /// Returns the cached value for `key`, or computes, caches and returns it.
    ///
    /// `tags` must name everything the value embeds; see [`Tag`].
    ///
    /// # Errors
    ///
    /// Only errors from `compute` are returned.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        tags: &[Tag],
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let stamps = self.stamps(tags);
        let mut backend_ok = true;

        match self.store.get(key).await {
            Ok(Some(bytes)) => match rmp_serde::from_slice::<Envelope<T>>(&bytes) {
                Ok(envelope) if envelope.epoch == self.epoch && envelope.stamps == stamps => {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "cache hit");
                    return Ok(envelope.value);
                }
                Ok(_) => {
                    self.counters.stale.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(key = %key, "cache entry stale");
                }
                Err(e) => {
                    self.counters.corrupt.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    if let Err(e) = self.store.delete(key).await {
                        tracing::warn!(key = %key, error = %e, "Failed to delete corrupt cache entry");
                    }
                }
            },
            Ok(None) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "cache miss");
            }
            Err(e) => {
                backend_ok = false;
                self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %e, "Cache unavailable, computing directly");
            }
        }

        let value = compute().await?;

        if backend_ok {
            if let Err(e) = self.put(key, tags, stamps, &value).await {
                self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(key = %key, error = %e, "Failed to store cache entry");
            }
        }

        Ok(value)
    }

    /// Invalidates everything that embeds `resource`, including the list
    /// pages of its collection. Must complete before a mutation returns.
    pub async fn invalidate(&self, resource: &ResourceRef) -> usize {
        self.invalidate_tags(&Tag::for_mutation(resource)).await
    }

    /// Invalidates every entry carrying any of `tags`. Idempotent.
    ///
    /// Returns the number of entries the backend removed. A backend failure
    /// is logged and reported as zero; bumped generations still keep
    /// subsequent reads coherent.
    pub async fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        for tag in tags {
            self.bump(tag);
        }
        if self.generations.len() > self.generation_limit {
            self.fold_generations();
        }
        self.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        match self.store.invalidate_tags(tags).await {
            Ok(removed) => {
                tracing::debug!(removed, tags = tags.len(), "cache invalidated");
                removed
            }
            Err(e) => {
                self.counters.bypassed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "Cache invalidation failed, relying on generation check");
                0
            }
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
            bypassed: self.counters.bypassed.load(Ordering::Relaxed),
            corrupt: self.counters.corrupt.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn generation(&self, tag: &Tag) -> u64 {
        match self.generations.get(tag) {
            Some(generation) => *generation,
            None => self.floor.load(Ordering::SeqCst),
        }
    }

    /// Moves `tag` to a generation above both its current one and every
    /// generation handed out so far.
    fn bump(&self, tag: &Tag) {
        let drawn = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.generations
            .entry(tag.clone())
            .and_modify(|current| *current = drawn.max(*current + 1))
            .or_insert_with(|| drawn.max(self.floor.load(Ordering::SeqCst) + 1));
    }

    /// Drops every tracked generation, raising the floor past each one
    /// before it is removed.
    fn fold_generations(&self) {
        let before = self.generations.len();
        self.generations.retain(|_, generation| {
            self.floor.fetch_max(*generation, Ordering::SeqCst);
            false
        });
        tracing::debug!(
            folded = before,
            floor = self.floor.load(Ordering::SeqCst),
            "Folded cache generations"
        );
    }

    fn stamps(&self, tags: &[Tag]) -> Vec<(String, u64)> {
        tags.iter()
            .map(|tag| (tag.as_str().to_string(), self.generation(tag)))
            .collect()
    }

    async fn put<T: Serialize>(
        &self,
        key: &CacheKey,
        tags: &[Tag],
        stamps: Vec<(String, u64)>,
        value: &T,
    ) -> CacheResult<()> {
        let envelope = Envelope {
            epoch: self.epoch,
            stamps,
            value,
        };
        let bytes =
            rmp_serde::to_vec_named(&envelope).map_err(|e| CacheError::encode(e.to_string()))?;
        self.store.set(key, bytes, tags, self.ttl).await
    }
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside")
            .field("backend", &self.store.backend_name())
            .field("ttl", &self.ttl)
            .field("generations", &self.generations.len())
            .finish()
    }
}
