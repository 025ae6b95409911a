//! In-memory storage backend.
//!
//! Backed by sharded concurrent maps. Used by the server binary when no
//! external database is configured and by tests.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use coreroot_core::{
    Clock, ExternalId, Resource, ResourceKind, SharedClock, SurrogateKey, SystemClock,
};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::StorageResult;
use crate::error::StorageError;
use crate::traits::{Deleted, IdentifierDirectory, ResourceStore, UserStore};
use crate::types::{NewResource, NewUser, Page, Paginated, ResourceUpdate, UserPatch, UserRecord};

type ResourceSlot = (ResourceKind, SurrogateKey);

/// In-memory resource and user store.
pub struct InMemoryStore {
    resources: DashMap<ResourceSlot, Resource>,
    resource_ids: DashMap<(ResourceKind, ExternalId), SurrogateKey>,
    users: DashMap<SurrogateKey, UserRecord>,
    user_ids: DashMap<ExternalId, SurrogateKey>,
    emails: DashMap<String, SurrogateKey>,
    usernames: DashMap<String, SurrogateKey>,
    next_resource_key: AtomicU64,
    next_user_key: AtomicU64,
    clock: SharedClock,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            resources: DashMap::new(),
            resource_ids: DashMap::new(),
            users: DashMap::new(),
            user_ids: DashMap::new(),
            emails: DashMap::new(),
            usernames: DashMap::new(),
            next_resource_key: AtomicU64::new(1),
            next_user_key: AtomicU64::new(1),
            clock,
        }
    }

    fn next_resource_key(&self) -> SurrogateKey {
        SurrogateKey(self.next_resource_key.fetch_add(1, Ordering::SeqCst))
    }

    fn next_user_key(&self) -> SurrogateKey {
        SurrogateKey(self.next_user_key.fetch_add(1, Ordering::SeqCst))
    }

    fn not_found(kind: ResourceKind, key: SurrogateKey) -> StorageError {
        StorageError::not_found(kind.as_str(), key.to_string())
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Number of stored posts and comments.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("resources", &self.resources.len())
            .field("users", &self.users.len())
            .finish()
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, kind: ResourceKind, key: SurrogateKey) -> StorageResult<Resource> {
        self.resources
            .get(&(kind, key))
            .map(|r| r.clone())
            .ok_or_else(|| Self::not_found(kind, key))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        parent: Option<SurrogateKey>,
        page: Page,
    ) -> StorageResult<Paginated<Resource>> {
        let mut matching: Vec<Resource> = self
            .resources
            .iter()
            .filter(|entry| entry.kind == kind && (parent.is_none() || entry.parent == parent))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|r| Reverse((r.created_at, r.key)));

        let count = matching.len();
        let results = matching
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();

        Ok(Paginated {
            count,
            page,
            results,
        })
    }

    async fn create(&self, new: NewResource) -> StorageResult<Resource> {
        if !new.body.is_object() {
            return Err(StorageError::invalid_resource("body must be a JSON object"));
        }

        match (new.kind.parent_kind(), new.parent) {
            (Some(parent_kind), Some(parent)) => {
                if !self.resources.contains_key(&(parent_kind, parent)) {
                    return Err(Self::not_found(parent_kind, parent));
                }
            }
            (Some(parent_kind), None) => {
                return Err(StorageError::invalid_resource(format!(
                    "{} requires a parent {}",
                    new.kind, parent_kind
                )));
            }
            (None, Some(_)) => {
                return Err(StorageError::invalid_resource(format!(
                    "{} cannot have a parent",
                    new.kind
                )));
            }
            (None, None) => {}
        }

        let now = self.clock.now();
        let resource = Resource {
            key: self.next_resource_key(),
            id: ExternalId::generate(),
            kind: new.kind,
            owner: new.owner,
            parent: new.parent,
            body: new.body,
            liked_by: BTreeSet::new(),
            edited: false,
            created_at: now,
            updated_at: now,
        };

        self.resource_ids
            .insert((resource.kind, resource.id), resource.key);
        self.resources
            .insert((resource.kind, resource.key), resource.clone());

        tracing::debug!(kind = %resource.kind, key = %resource.key, "Resource created");
        Ok(resource)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        update: ResourceUpdate,
    ) -> StorageResult<Resource> {
        let mut entry = self
            .resources
            .get_mut(&(kind, key))
            .ok_or_else(|| Self::not_found(kind, key))?;

        let body = update.apply(&entry.body);
        if !body.is_object() {
            return Err(StorageError::invalid_resource("body must be a JSON object"));
        }

        entry.body = body;
        entry.edited = true;
        entry.updated_at = self.clock.now();
        Ok(entry.clone())
    }

    async fn delete(&self, kind: ResourceKind, key: SurrogateKey) -> StorageResult<Deleted> {
        let (_, resource) = self
            .resources
            .remove(&(kind, key))
            .ok_or_else(|| Self::not_found(kind, key))?;
        self.resource_ids.remove(&(resource.kind, resource.id));

        // Collect first: removing while iterating the same map would deadlock.
        let children: Vec<ResourceSlot> = self
            .resources
            .iter()
            .filter(|entry| {
                entry.kind.parent_kind() == Some(kind) && entry.parent == Some(key)
            })
            .map(|entry| *entry.key())
            .collect();

        let mut cascaded = Vec::with_capacity(children.len());
        for slot in children {
            if let Some((_, child)) = self.resources.remove(&slot) {
                self.resource_ids.remove(&(child.kind, child.id));
                cascaded.push(child);
            }
        }

        tracing::debug!(
            kind = %kind,
            key = %key,
            cascaded = cascaded.len(),
            "Resource deleted"
        );
        Ok(Deleted { resource, cascaded })
    }

    async fn set_like(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
        user: SurrogateKey,
        liked: bool,
    ) -> StorageResult<Resource> {
        if !kind.supports_likes() {
            return Err(StorageError::invalid_resource(format!(
                "{kind} does not support likes"
            )));
        }

        let mut entry = self
            .resources
            .get_mut(&(kind, key))
            .ok_or_else(|| Self::not_found(kind, key))?;
        if liked {
            entry.liked_by.insert(user);
        } else {
            entry.liked_by.remove(&user);
        }
        Ok(entry.clone())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, new: NewUser) -> StorageResult<UserRecord> {
        let email = Self::normalize_email(&new.email);
        let username = new.username.trim().to_string();

        // Lock order is always emails then usernames.
        let email_slot = match self.emails.entry(email.clone()) {
            Entry::Occupied(_) => return Err(StorageError::already_exists("user", email)),
            Entry::Vacant(slot) => slot,
        };
        let username_slot = match self.usernames.entry(username.clone()) {
            Entry::Occupied(_) => return Err(StorageError::already_exists("user", username)),
            Entry::Vacant(slot) => slot,
        };

        let now = self.clock.now();
        let user = UserRecord {
            key: self.next_user_key(),
            id: ExternalId::generate(),
            username,
            email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            bio: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        email_slot.insert(user.key);
        username_slot.insert(user.key);
        self.user_ids.insert(user.id, user.key);
        self.users.insert(user.key, user.clone());

        tracing::debug!(user = %user.key, "User created");
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let email = Self::normalize_email(email);
        let Some(key) = self.emails.get(&email).map(|k| *k) else {
            return Ok(None);
        };
        Ok(self.users.get(&key).map(|u| u.clone()))
    }

    async fn get_user(&self, key: SurrogateKey) -> StorageResult<UserRecord> {
        self.users
            .get(&key)
            .map(|u| u.clone())
            .ok_or_else(|| StorageError::not_found("user", key.to_string()))
    }

    async fn update_user(&self, key: SurrogateKey, patch: UserPatch) -> StorageResult<UserRecord> {
        let current_username = self
            .users
            .get(&key)
            .map(|u| u.username.clone())
            .ok_or_else(|| StorageError::not_found("user", key.to_string()))?;

        if let Some(username) = patch.username.as_deref().map(str::trim) {
            if username.is_empty() {
                return Err(StorageError::invalid_resource("username must not be empty"));
            }
            if username != current_username {
                match self.usernames.entry(username.to_string()) {
                    Entry::Occupied(_) => {
                        return Err(StorageError::already_exists("user", username));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(key);
                    }
                }
                self.usernames.remove(&current_username);
            }
        }

        let mut user = self
            .users
            .get_mut(&key)
            .ok_or_else(|| StorageError::not_found("user", key.to_string()))?;
        if let Some(username) = patch.username {
            user.username = username.trim().to_string();
        }
        if let Some(first_name) = patch.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = patch.last_name {
            user.last_name = last_name;
        }
        if let Some(bio) = patch.bio {
            user.bio = bio;
        }
        user.updated_at = self.clock.now();
        Ok(user.clone())
    }
}

#[async_trait]
impl IdentifierDirectory for InMemoryStore {
    async fn key_for(
        &self,
        kind: ResourceKind,
        id: &ExternalId,
    ) -> StorageResult<Option<SurrogateKey>> {
        Ok(match kind {
            ResourceKind::User => self.user_ids.get(id).map(|k| *k),
            _ => self.resource_ids.get(&(kind, *id)).map(|k| *k),
        })
    }

    async fn external_for(
        &self,
        kind: ResourceKind,
        key: SurrogateKey,
    ) -> StorageResult<Option<ExternalId>> {
        Ok(match kind {
            ResourceKind::User => self.users.get(&key).map(|u| u.id),
            _ => self.resources.get(&(kind, key)).map(|r| r.id),
        })
    }
}
