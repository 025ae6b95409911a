//! Request pipeline for posts, comments and users.
//!
//! Every operation receives the [`Action`] its request was derived to (see
//! [`Action::from_method`]) and runs the same steps:
//!
//! 1. reject actions the caller can never perform, before any lookup
//! 2. translate public ids to surrogate keys (unknown or malformed ids are 404)
//! 3. load the target through the cache and check ownership
//! 4. read through the cache, or write through [`CoherentStore`], which
//!    invalidates before returning

use std::sync::Arc;

use coreroot_auth::types::UserView;
use coreroot_auth::{Action, AuthError, DenyReason, Identity, PermissionEvaluator};
use coreroot_cache::CoherentStore;
use coreroot_core::{
    ExternalId, Resource, ResourceKind, ResourceOwnership, ResourceRef, SurrogateKey,
};
use coreroot_storage::{
    DynUserStore, IdentifierTranslator, NewResource, Page, Paginated, ResourceUpdate, UserPatch,
};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::views::ResourceView;

/// Public address of a single post or comment, as received in a request path.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub kind: ResourceKind,
    pub parent: Option<&'a str>,
    pub id: &'a str,
}

impl<'a> Target<'a> {
    pub fn post(id: &'a str) -> Self {
        Self {
            kind: ResourceKind::Post,
            parent: None,
            id,
        }
    }

    pub fn comment(post: &'a str, id: &'a str) -> Self {
        Self {
            kind: ResourceKind::Comment,
            parent: Some(post),
            id,
        }
    }
}

/// A resolved target: its public address, key and current state.
struct Located {
    reference: ResourceRef,
    key: SurrogateKey,
    resource: Resource,
}

pub struct ContentService {
    store: CoherentStore,
    users: DynUserStore,
    evaluator: PermissionEvaluator,
}

impl ContentService {
    pub fn new(store: CoherentStore, users: DynUserStore, evaluator: PermissionEvaluator) -> Self {
        Self {
            store,
            users,
            evaluator,
        }
    }

    pub fn store(&self) -> &CoherentStore {
        &self.store
    }

    fn translator(&self) -> &Arc<IdentifierTranslator> {
        self.store.translator()
    }

    // ==================== Posts and comments ====================

    pub async fn list(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        kind: ResourceKind,
        parent: Option<&str>,
        page: Page,
    ) -> ApiResult<Paginated<ResourceView>> {
        self.precheck(viewer, action, kind)?;
        let parent = self.resolve_parent(kind, parent).await?;

        let items = self.store.list(kind, parent, page).await?;
        let mut results = Vec::with_capacity(items.results.len());
        for resource in &items.results {
            results.push(self.view(resource, viewer).await?);
        }
        Ok(Paginated {
            count: items.count,
            page: items.page,
            results,
        })
    }

    pub async fn create(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        kind: ResourceKind,
        parent: Option<&str>,
        body: Value,
    ) -> ApiResult<ResourceView> {
        self.precheck(viewer, action, kind)?;
        let identity = require_identity(viewer)?;
        let parent = self.resolve_parent(kind, parent).await?;

        let created = self
            .store
            .create(NewResource {
                kind,
                owner: identity.key,
                parent: parent.map(|(_, key)| key),
                body,
            })
            .await?;

        tracing::info!(
            user = %identity.key,
            resource = %kind,
            id = %created.id,
            "Resource created"
        );
        self.view(&created, viewer).await
    }

    pub async fn read(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        target: Target<'_>,
    ) -> ApiResult<ResourceView> {
        let located = self.authorized(viewer, action, target).await?;
        self.view(&located.resource, viewer).await
    }

    pub async fn update(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        target: Target<'_>,
        update: ResourceUpdate,
    ) -> ApiResult<ResourceView> {
        let located = self.authorized(viewer, action, target).await?;
        let updated = self.store.update(target.kind, located.key, update).await?;
        self.view(&updated, viewer).await
    }

    pub async fn delete(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        target: Target<'_>,
    ) -> ApiResult<()> {
        let located = self.authorized(viewer, action, target).await?;
        let deleted = self.store.delete(target.kind, located.key).await?;
        tracing::info!(
            resource = %located.reference,
            cascaded = deleted.cascaded.len(),
            "Resource deleted"
        );
        Ok(())
    }

    /// Likes ([`Action::Like`]) or unlikes ([`Action::Unlike`]) a resource.
    /// Any authenticated user may like anyone's resource, their own included.
    pub async fn set_like(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        target: Target<'_>,
    ) -> ApiResult<ResourceView> {
        let liked = match action {
            Action::Like => true,
            Action::Unlike => false,
            other => return Err(ApiError::bad_request(format!("{other} is not a like action"))),
        };
        let located = self.authorized(viewer, action, target).await?;
        let identity = require_identity(viewer)?;

        let resource = self
            .store
            .set_like(target.kind, located.key, identity.key, liked)
            .await?;
        self.view(&resource, viewer).await
    }

    // ==================== Users ====================

    pub async fn get_user(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        id: &str,
    ) -> ApiResult<UserView> {
        self.precheck(viewer, action, ResourceKind::User)?;
        let (_, key) = self.locate(ResourceKind::User, id).await?;
        let user = self.users.get_user(key).await?;
        Ok(UserView::from(&user))
    }

    /// Updates a profile. A user owns their own account and nothing else.
    pub async fn update_user(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        id: &str,
        patch: UserPatch,
    ) -> ApiResult<UserView> {
        self.precheck(viewer, action, ResourceKind::User)?;
        let (_, key) = self.locate(ResourceKind::User, id).await?;

        let ownership = ResourceOwnership {
            kind: ResourceKind::User,
            owner: key,
        };
        self.decide(viewer, action, ResourceKind::User, Some(&ownership))?;

        let user = self.users.update_user(key, patch).await?;
        tracing::info!(user = %key, "Profile updated");
        Ok(UserView::from(&user))
    }

    // ==================== Pipeline steps ====================

    /// Denies what no lookup could change: anonymous writes, unsupported
    /// actions. Ownership is checked later against the loaded target.
    fn precheck(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        kind: ResourceKind,
    ) -> ApiResult<()> {
        let decision = self.evaluator.authorize(viewer, action, kind, None);
        if decision.deny_reason() == Some(DenyReason::NotOwner) {
            return Ok(());
        }
        if decision.is_denied() {
            tracing::debug!(action = %action, resource = %kind, ?decision, "Request denied");
        }
        decision.into_result().map_err(ApiError::from)
    }

    fn decide(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        kind: ResourceKind,
        target: Option<&ResourceOwnership>,
    ) -> ApiResult<()> {
        let decision = self.evaluator.authorize(viewer, action, kind, target);
        tracing::debug!(action = %action, resource = %kind, ?decision, "Access decision");
        decision.into_result().map_err(ApiError::from)
    }

    async fn authorized(
        &self,
        viewer: Option<&Identity>,
        action: Action,
        target: Target<'_>,
    ) -> ApiResult<Located> {
        self.precheck(viewer, action, target.kind)?;
        let located = self.load(target).await?;
        self.decide(viewer, action, target.kind, Some(&located.resource.ownership()))?;
        Ok(located)
    }

    async fn load(&self, target: Target<'_>) -> ApiResult<Located> {
        let parent = self.resolve_parent(target.kind, target.parent).await?;
        let (id, key) = self.locate(target.kind, target.id).await?;

        let mut reference = ResourceRef::new(target.kind, id);
        if let Some((parent_id, _)) = parent {
            reference = reference.with_parent(parent_id);
        }

        let resource = self.store.get(&reference, key).await?;

        // A comment is only reachable under its own post.
        if resource.parent != parent.map(|(_, parent_key)| parent_key) {
            return Err(ApiError::not_found(reference.to_string()));
        }

        Ok(Located {
            reference,
            key,
            resource,
        })
    }

    async fn locate(
        &self,
        kind: ResourceKind,
        raw: &str,
    ) -> ApiResult<(ExternalId, SurrogateKey)> {
        let id: ExternalId = raw
            .parse()
            .map_err(|_| ApiError::not_found(format!("{kind}/{raw}")))?;
        let key = self.translator().external_to_internal(kind, &id).await?;
        Ok((id, key))
    }

    /// Resolves the parent of a nested kind. Top-level kinds take none.
    async fn resolve_parent(
        &self,
        kind: ResourceKind,
        parent: Option<&str>,
    ) -> ApiResult<Option<(ExternalId, SurrogateKey)>> {
        match (kind.parent_kind(), parent) {
            (Some(parent_kind), Some(raw)) => Ok(Some(self.locate(parent_kind, raw).await?)),
            (Some(parent_kind), None) => Err(ApiError::bad_request(format!(
                "{kind} requires a parent {parent_kind}"
            ))),
            (None, Some(_)) => Err(ApiError::bad_request(format!("{kind} has no parent"))),
            (None, None) => Ok(None),
        }
    }

    async fn view(
        &self,
        resource: &Resource,
        viewer: Option<&Identity>,
    ) -> ApiResult<ResourceView> {
        let translator = self.translator();
        let author = translator
            .internal_to_external(ResourceKind::User, resource.owner)
            .await?;
        let post = match (resource.kind.parent_kind(), resource.parent) {
            (Some(parent_kind), Some(parent)) => {
                Some(translator.internal_to_external(parent_kind, parent).await?)
            }
            _ => None,
        };

        let likes = resource.kind.supports_likes();
        Ok(ResourceView {
            id: resource.id,
            author,
            post,
            body: resource.body.clone(),
            likes_count: likes.then(|| resource.likes_count()),
            liked: viewer
                .filter(|_| likes)
                .map(|identity| resource.is_liked_by(identity.key)),
            edited: resource.edited,
            created: resource.created_at,
            updated: resource.updated_at,
        })
    }
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("store", &self.store)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

fn require_identity(viewer: Option<&Identity>) -> Result<&Identity, AuthError> {
    viewer.ok_or_else(|| {
        AuthError::unauthenticated(DenyReason::Unauthenticated.message())
    })
}
