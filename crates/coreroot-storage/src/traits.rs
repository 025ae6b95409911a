//! Storage traits implemented by resource store backends.

use async_trait::async_trait;
use coreroot_core::{ExternalId, Resource, ResourceKind, SurrogateKey};

use crate::StorageResult;
use crate::types::{NewResource, NewUser, Page, Paginated, ResourceUpdate, UserPatch, UserRecord};

/// Result of deleting a resource, including anything removed with it.
#[derive(Debug, Clone)]
pub struct Deleted {
    pub resource: Resource,
    /// Nested resources removed by the cascade (comments of a deleted post).
    pub cascaded: Vec<Resource>,
}

/// Persistence for posts and comments.
///
/// Implementations must be thread-safe (`Send + Sync`). Every method addresses
/// resources by surrogate key; translation from public identifiers happens
/// before the store is reached.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    // ==================== CRUD Operations ====================

    /// Reads a resource.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no resource of `kind` has `key`.
    async fn get(&self, kind: ResourceKind, key: SurrogateKey) -> StorageResult<Resource>;

    /// Lists resources of `kind`, newest first, optionally restricted to a parent.
    async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<SurrogateKey>,
        page: Page,
    ) -> StorageResult<Paginated<Resource>>;

    /// Creates a resource and assigns its surrogate key and external id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the declared parent does not exist.
    /// Returns `StorageError::InvalidResource` if the parent shape is wrong for the kind.
    async fn create(&self, new: NewResource) -> StorageResult<Resource>;

    /// Applies an update to the body and marks the resource as edited.
    async fn update(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        update: ResourceUpdate,
    ) -> StorageResult<Resource>;

    /// Deletes a resource. Deleting a post also deletes its comments.
    async fn delete(&self, kind: ResourceKind, key: SurrogateKey) -> StorageResult<Deleted>;

    // ==================== Likes ====================

    /// Sets whether `user` likes the resource. Idempotent in both directions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidResource` for kinds that do not support likes.
    async fn set_like(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        user: SurrogateKey,
        liked: bool,
    ) -> StorageResult<Resource>;
}

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the email or username is taken.
    async fn create_user(&self, new: NewUser) -> StorageResult<UserRecord>;

    /// Looks up a user by email (case-insensitive). `None` if absent.
    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>>;

    /// Reads a user by surrogate key.
    async fn get_user(&self, key: SurrogateKey) -> StorageResult<UserRecord>;

    /// Updates profile fields.
    async fn update_user(&self, key: SurrogateKey, patch: UserPatch) -> StorageResult<UserRecord>;
}

/// Source of truth for the external id <-> surrogate key mapping.
#[async_trait]
pub trait IdentifierDirectory: Send + Sync {
    /// Surrogate key behind a public identifier, `None` if unknown.
    async fn key_for(
        &self,
        kind: ResourceKind,
        id: &ExternalId,
    ) -> StorageResult<Option<SurrogateKey>>;

    /// Public identifier for a surrogate key, `None` if unknown.
    async fn external_for(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
    ) -> StorageResult<Option<ExternalId>>;
}
