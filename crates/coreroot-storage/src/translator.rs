//! Translation between public opaque identifiers and internal surrogate keys.
//!
//! Mappings never change for the lifetime of a resource, so resolved pairs are
//! memoized in both directions. Deleting a resource must call
//! [`IdentifierTranslator::forget`] so later lookups fall through to the
//! directory and report `NotFound`.
//!
//! A lookup that overlaps a delete may memoize the mapping after `forget`
//! ran. Every `forget` bumps a counter first; a lookup that sees the counter
//! move while it was resolving re-checks the directory and drops its own
//! entry if the resource is gone.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use coreroot_core::{ExternalId, ResourceKind, SurrogateKey};
use dashmap::DashMap;

use crate::StorageResult;
use crate::error::StorageError;
use crate::traits::IdentifierDirectory;

pub struct IdentifierTranslator {
    directory: Arc<dyn IdentifierDirectory>,
    forward: DashMap<(ResourceKind, ExternalId), SurrogateKey>,
    backward: DashMap<(ResourceKind, SurrogateKey), ExternalId>,
    forgotten: AtomicU64,
}

impl IdentifierTranslator {
    pub fn new(directory: Arc<dyn IdentifierDirectory>) -> Self {
        Self {
            directory,
            forward: DashMap::new(),
            backward: DashMap::new(),
            forgotten: AtomicU64::new(0),
        }
    }

    /// Resolves a public identifier to its surrogate key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no resource of `kind` has this id.
    pub async fn external_to_internal(
        &self,
        kind: ResourceKind,
        id: &ExternalId,
    ) -> StorageResult<SurrogateKey> {
        if let Some(key) = self.forward.get(&(kind, *id)) {
            return Ok(*key);
        }

        let forgotten = self.forgotten.load(Ordering::SeqCst);
        match self.directory.key_for(kind, id).await? {
            Some(key) => {
                self.memoize(kind, key, *id, forgotten).await?;
                Ok(key)
            }
            None => Err(StorageError::not_found(kind.as_str(), id.to_string())),
        }
    }

    /// Resolves a raw identifier taken from a request.
    ///
    /// Malformed input is reported as `NotFound`, indistinguishable from a
    /// well-formed id that matches nothing.
    pub async fn resolve(&self, kind: ResourceKind, raw: &str) -> StorageResult<SurrogateKey> {
        let id: ExternalId = raw
            .parse()
            .map_err(|_| StorageError::not_found(kind.as_str(), raw))?;
        self.external_to_internal(kind, &id).await
    }

    /// Maps a surrogate key back to its public identifier.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown keys.
    pub async fn internal_to_external(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
    ) -> StorageResult<ExternalId> {
        if let Some(id) = self.backward.get(&(kind, key)) {
            return Ok(*id);
        }

        let forgotten = self.forgotten.load(Ordering::SeqCst);
        match self.directory.external_for(kind, key).await? {
            Some(id) => {
                self.memoize(kind, key, id, forgotten).await?;
                Ok(id)
            }
            None => Err(StorageError::not_found(kind.as_str(), key.to_string())),
        }
    }

    /// Records a known mapping, typically right after a create.
    pub fn remember(&self, kind: ResourceKind, key: SurrogateKey, id: ExternalId) {
        self.forward.insert((kind, id), key);
        self.backward.insert((kind, key), id);
    }

    /// Drops a mapping after the resource is deleted.
    pub fn forget(&self, kind: ResourceKind, key: SurrogateKey, id: ExternalId) {
        self.forgotten.fetch_add(1, Ordering::SeqCst);
        self.forward.remove(&(kind, id));
        self.backward.remove(&(kind, key));
    }

    /// Remembers a pair resolved from the directory. `forgotten` is the
    /// counter value read before the directory lookup started.
    async fn memoize(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        id: ExternalId,
        forgotten: u64,
    ) -> StorageResult<()> {
        self.remember(kind, key, id);
        if self.forgotten.load(Ordering::SeqCst) != forgotten
            && self.directory.key_for(kind, &id).await?.is_none()
        {
            tracing::debug!(resource = %kind, key = %key, "Dropped mapping of a deleted resource");
            self.forget(kind, key, id);
        }
        Ok(())
    }

    /// Number of memoized mappings.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

impl std::fmt::Debug for IdentifierTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierTranslator")
            .field("memoized", &self.forward.len())
            .finish()
    }
}
