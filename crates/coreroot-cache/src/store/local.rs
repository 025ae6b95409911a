use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coreroot_core::{Clock, SharedClock};
use dashmap::DashMap;
use time::OffsetDateTime;

use super::CacheStore;
use crate::CacheResult;
use crate::key::{CacheKey, Tag};

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
struct LocalEntry {
    data: Arc<Vec<u8>>,
    expires_at: OffsetDateTime,
}

impl LocalEntry {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Single-instance cache backed by `DashMap`.
///
/// Expiry is passive: an expired entry is dropped when it is read, or when an
/// insert finds the cache full and sweeps. When a sweep does not free a slot
/// the entry closest to expiry is evicted.
pub struct LocalCacheStore {
    entries: DashMap<String, LocalEntry>,
    tags: DashMap<String, HashSet<String>>,
    max_entries: usize,
    clock: SharedClock,
}

impl LocalCacheStore {
    pub fn new(max_entries: usize, clock: SharedClock) -> Self {
        Self {
            entries: DashMap::new(),
            tags: DashMap::new(),
            max_entries: max_entries.max(1),
            clock,
        }
    }

    /// Number of entries held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key.as_str())
    }

    /// Removes expired entries and prunes tag index members that no longer
    /// point at anything. Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.tags.retain(|_, keys| {
            keys.retain(|key| self.entries.contains_key(key));
            !keys.is_empty()
        });
        before.saturating_sub(self.entries.len())
    }

    fn make_room(&self, key: &str) {
        if self.entries.len() < self.max_entries || self.entries.contains_key(key) {
            return;
        }

        let removed = self.sweep_expired();
        if removed > 0 {
            tracing::debug!(removed, "cache sweep freed entries");
            return;
        }

        let victim = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            self.entries.remove(&victim);
            tracing::debug!(key = %victim, "cache full, evicted entry");
        }
    }
}

impl std::fmt::Debug for LocalCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCacheStore")
            .field("entries", &self.entries.len())
            .field("tags", &self.tags.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let now = self.clock.now();
        let found = self
            .entries
            .get(key.as_str())
            .map(|entry| (entry.is_expired(now), Arc::clone(&entry.data)));

        match found {
            Some((false, data)) => Ok(Some(data.as_ref().clone())),
            Some((true, _)) => {
                self.entries
                    .remove_if(key.as_str(), |_, entry| entry.is_expired(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: Vec<u8>,
        tags: &[Tag],
        ttl: Duration,
    ) -> CacheResult<()> {
        self.make_room(key.as_str());

        // Register tags before the entry exists so a concurrent invalidation
        // that sees the entry also sees its tags.
        for tag in tags {
            self.tags
                .entry(tag.as_str().to_string())
                .or_default()
                .insert(key.as_str().to_string());
        }

        let entry = LocalEntry {
            data: Arc::new(value),
            expires_at: self.clock.now() + ttl,
        };
        self.entries.insert(key.as_str().to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<()> {
        self.entries.remove(key.as_str());
        Ok(())
    }

    async fn invalidate_tags(&self, tags: &[Tag]) -> CacheResult<usize> {
        let mut removed = 0;
        for tag in tags {
            let Some((_, keys)) = self.tags.remove(tag.as_str()) else {
                continue;
            };
            for key in keys {
                if self.entries.remove(&key).is_some() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
