//! The only write path for posts and comments.
//!
//! Every mutation goes to the resource store first, then awaits cache
//! invalidation for the affected resource, then returns. Reads go through
//! [`CacheAside`]. Nothing else may write to the store behind this type's
//! back, or cached reads lose their coherence guarantee.

use std::sync::Arc;

use coreroot_core::{ExternalId, Resource, ResourceKind, ResourceRef, SurrogateKey};
use coreroot_storage::{
    Deleted, DynResourceStore, IdentifierTranslator, NewResource, Page, Paginated, ResourceUpdate,
    StorageResult,
};

use crate::aside::CacheAside;
use crate::key::{CacheKey, Tag};

/// Resource store wrapper with read-through caching and mandatory
/// post-write invalidation.
pub struct CoherentStore {
    store: DynResourceStore,
    cache: Arc<CacheAside>,
    translator: Arc<IdentifierTranslator>,
}

impl CoherentStore {
    pub fn new(
        store: DynResourceStore,
        cache: Arc<CacheAside>,
        translator: Arc<IdentifierTranslator>,
    ) -> Self {
        Self {
            store,
            cache,
            translator,
        }
    }

    // ==================== Reads ====================

    /// Reads one resource through the cache.
    ///
    /// `reference` is the public address the caller resolved `key` from; its
    /// parent determines the entry's tags.
    pub async fn get(&self, reference: &ResourceRef, key: SurrogateKey) -> StorageResult<Resource> {
        let kind = reference.kind;
        self.cache
            .get_or_compute(
                &CacheKey::resource(reference),
                &Tag::for_resource(reference),
                || self.store.get(kind, key),
            )
            .await
    }

    /// Reads one page of a collection through the cache.
    ///
    /// `parent` is the parent's public id and surrogate key for nested kinds.
    pub async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<(ExternalId, SurrogateKey)>,
        page: Page,
    ) -> StorageResult<Paginated<Resource>> {
        let parent_id = parent.map(|(id, _)| id);
        let parent_key = parent.map(|(_, key)| key);
        self.cache
            .get_or_compute(
                &CacheKey::list(kind, parent_id.as_ref(), page),
                &Tag::for_list(kind, parent_id.as_ref()),
                || self.store.list(kind, parent_key, page),
            )
            .await
    }

    // ==================== Writes ====================

    pub async fn create(&self, new: NewResource) -> StorageResult<Resource> {
        let created = self.store.create(new).await?;
        self.translator
            .remember(created.kind, created.key, created.id);

        let reference = self.reference_of(&created).await;
        self.cache.invalidate(&reference).await;
        tracing::debug!(resource = %reference, "Resource created");
        Ok(created)
    }

    pub async fn update(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        update: ResourceUpdate,
    ) -> StorageResult<Resource> {
        let updated = self.store.update(kind, key, update).await?;

        let reference = self.reference_of(&updated).await;
        self.cache.invalidate(&reference).await;
        tracing::debug!(resource = %reference, "Resource updated");
        Ok(updated)
    }

    /// Deletes a resource and everything cascaded with it, invalidating and
    /// forgetting the identifiers of each.
    pub async fn delete(&self, kind: ResourceKind, key: SurrogateKey) -> StorageResult<Deleted> {
        let deleted = self.store.delete(kind, key).await?;

        // The parent goes last so child lookups still resolve it.
        for resource in deleted.cascaded.iter().chain(std::iter::once(&deleted.resource)) {
            let reference = self.reference_of(resource).await;
            self.cache.invalidate(&reference).await;
            self.translator
                .forget(resource.kind, resource.key, resource.id);
        }

        tracing::debug!(
            kind = %kind,
            key = %key,
            cascaded = deleted.cascaded.len(),
            "Resource deleted"
        );
        Ok(deleted)
    }

    /// Sets or clears `user`'s like. Idempotent in both directions.
    pub async fn set_like(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        user: SurrogateKey,
        liked: bool,
    ) -> StorageResult<Resource> {
        let resource = self.store.set_like(kind, key, user, liked).await?;

        let reference = self.reference_of(&resource).await;
        self.cache.invalidate(&reference).await;
        tracing::debug!(resource = %reference, liked, "Like updated");
        Ok(resource)
    }

    pub fn cache(&self) -> &Arc<CacheAside> {
        &self.cache
    }

    pub fn translator(&self) -> &Arc<IdentifierTranslator> {
        &self.translator
    }

    /// Public address of a stored resource, parent included.
    ///
    /// If the parent cannot be translated the address is returned without it;
    /// the resource's own tag is still correct, only its collection tag falls
    /// back to the top level.
    async fn reference_of(&self, resource: &Resource) -> ResourceRef {
        let reference = ResourceRef::new(resource.kind, resource.id);
        let (Some(parent_kind), Some(parent_key)) = (resource.kind.parent_kind(), resource.parent)
        else {
            return reference;
        };

        match self
            .translator
            .internal_to_external(parent_kind, parent_key)
            .await
        {
            Ok(parent_id) => reference.with_parent(parent_id),
            Err(e) => {
                tracing::warn!(
                    resource = %reference,
                    error = %e,
                    "Could not resolve parent for invalidation"
                );
                reference
            }
        }
    }
}

impl std::fmt::Debug for CoherentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoherentStore")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
