//! Permission evaluation for content resources.
//!
//! # Rules
//!
//! | Caller        | Read           | Create | Update / Delete | Like / Unlike |
//! |---------------|----------------|--------|-----------------|---------------|
//! | anonymous     | public kinds   | deny   | deny            | deny          |
//! | authenticated | allow          | allow  | owner only      | allow         |
//!
//! Liking is deliberately not ownership-gated: any authenticated identity may
//! like or unlike someone else's post.
//!
//! # Example
//!
//! ```ignore
//! use coreroot_auth::policy::{Action, PermissionEvaluator};
//!
//! let evaluator = PermissionEvaluator::default();
//! evaluator
//!     .authorize(Some(&identity), Action::Delete, ResourceKind::Post, Some(&post.ownership()))
//!     .into_result()?;
//! ```

use std::fmt;

use axum::http::Method;
use coreroot_core::{ResourceKind, ResourceOwnership};

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::Identity;

// =============================================================================
// Action
// =============================================================================

/// What a request wants to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Like,
    Unlike,
}

impl Action {
    /// Derives the action from the HTTP method and an optional named action
    /// (the trailing `like` / `remove_like` route segment).
    ///
    /// Returns `None` for methods or named actions that map to nothing.
    #[must_use]
    pub fn from_method(method: &Method, named: Option<&str>) -> Option<Self> {
        match named {
            Some("like") if method == Method::POST => Some(Self::Like),
            Some("remove_like") if method == Method::POST => Some(Self::Unlike),
            Some(_) => None,
            None => match *method {
                Method::GET | Method::HEAD | Method::OPTIONS => Some(Self::Read),
                Method::POST => Some(Self::Create),
                Method::PUT | Method::PATCH => Some(Self::Update),
                Method::DELETE => Some(Self::Delete),
                _ => None,
            },
        }
    }

    /// Safe actions never modify state.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Read)
    }

    /// Whether only the resource's owner may perform this action.
    #[must_use]
    pub fn requires_ownership(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Like => "like",
            Self::Unlike => "unlike",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Access Decision
// =============================================================================

/// Result of a permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<DenyReason> {
        match self {
            Self::Deny(reason) => Some(*reason),
            Self::Allow => None,
        }
    }

    /// Converts a denial into the matching `AuthError`.
    ///
    /// `Unauthenticated` becomes a 401-class error, everything else 403.
    pub fn into_result(self) -> AuthResult<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(DenyReason::Unauthenticated) => Err(AuthError::unauthenticated(
                "Authentication credentials were not provided",
            )),
            Self::Deny(reason) => Err(AuthError::forbidden(reason.message())),
        }
    }
}

/// Reason for access denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    /// No identity, and the action is not a public read.
    Unauthenticated,
    /// The action is owner-only and the caller is not the owner.
    NotOwner,
    /// The action makes no sense for this kind (liking a comment, creating a user).
    Unsupported,
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "not-authenticated",
            Self::NotOwner => "not-owner",
            Self::Unsupported => "unsupported-action",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Authentication credentials were not provided",
            Self::NotOwner => "You do not have permission to perform this action",
            Self::Unsupported => "This action is not supported for this resource",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Decides whether an identity may perform an action on a resource.
#[derive(Debug, Clone, Copy)]
pub struct PermissionEvaluator {
    anonymous_reads: bool,
}

impl Default for PermissionEvaluator {
    fn default() -> Self {
        Self {
            anonymous_reads: true,
        }
    }
}

impl PermissionEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables anonymous reads of publicly readable kinds.
    #[must_use]
    pub fn with_anonymous_reads(mut self, enabled: bool) -> Self {
        self.anonymous_reads = enabled;
        self
    }

    /// Evaluates a single request.
    ///
    /// `target` is the ownership of the resource acted upon; it is `None` for
    /// collection-level actions such as create. Owner-only actions without a
    /// target are denied.
    #[must_use]
    pub fn authorize(
        &self,
        identity: Option<&Identity>,
        action: Action,
        kind: ResourceKind,
        target: Option<&ResourceOwnership>,
    ) -> AccessDecision {
        if !is_supported(action, kind) {
            return AccessDecision::Deny(DenyReason::Unsupported);
        }

        let Some(identity) = identity else {
            if action.is_safe() && self.anonymous_reads && kind.is_publicly_readable() {
                return AccessDecision::Allow;
            }
            return AccessDecision::Deny(DenyReason::Unauthenticated);
        };

        if !action.requires_ownership() {
            // Read, Create, Like and Unlike only need an identity.
            return AccessDecision::Allow;
        }

        match target {
            Some(ownership) if identity.owns(ownership.owner) => AccessDecision::Allow,
            _ => AccessDecision::Deny(DenyReason::NotOwner),
        }
    }
}

fn is_supported(action: Action, kind: ResourceKind) -> bool {
    match action {
        Action::Like | Action::Unlike => kind.supports_likes(),
        // Accounts come from registration and are never deleted through the API.
        Action::Create | Action::Delete => kind != ResourceKind::User,
        Action::Read | Action::Update => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreroot_core::{ExternalId, SurrogateKey};
    use time::OffsetDateTime;

    fn identity(key: u64) -> Identity {
        let now = OffsetDateTime::now_utc();
        Identity {
            key: SurrogateKey(key),
            external_id: ExternalId::generate(),
            token_id: "jti".to_string(),
            issued_at: now,
            expires_at: now + time::Duration::minutes(5),
        }
    }

    fn owned_by(kind: ResourceKind, key: u64) -> ResourceOwnership {
        ResourceOwnership {
            kind,
            owner: SurrogateKey(key),
        }
    }

    #[test]
    fn test_action_from_method() {
        assert_eq!(Action::from_method(&Method::GET, None), Some(Action::Read));
        assert_eq!(Action::from_method(&Method::HEAD, None), Some(Action::Read));
        assert_eq!(Action::from_method(&Method::POST, None), Some(Action::Create));
        assert_eq!(Action::from_method(&Method::PUT, None), Some(Action::Update));
        assert_eq!(Action::from_method(&Method::PATCH, None), Some(Action::Update));
        assert_eq!(Action::from_method(&Method::DELETE, None), Some(Action::Delete));
        assert_eq!(Action::from_method(&Method::POST, Some("like")), Some(Action::Like));
        assert_eq!(
            Action::from_method(&Method::POST, Some("remove_like")),
            Some(Action::Unlike)
        );
        assert_eq!(Action::from_method(&Method::GET, Some("like")), None);
        assert_eq!(Action::from_method(&Method::POST, Some("share")), None);
        assert_eq!(Action::from_method(&Method::TRACE, None), None);
    }

    #[test]
    fn test_owner_can_update_and_delete() {
        let evaluator = PermissionEvaluator::default();
        let owner = identity(1);
        let post = owned_by(ResourceKind::Post, 1);

        for action in [Action::Update, Action::Delete] {
            let decision = evaluator.authorize(Some(&owner), action, ResourceKind::Post, Some(&post));
            assert!(decision.is_allowed(), "{action} should be allowed");
        }
    }

    #[test]
    fn test_other_identity_cannot_update_or_delete() {
        let evaluator = PermissionEvaluator::default();
        let other = identity(2);
        let post = owned_by(ResourceKind::Post, 1);

        for action in [Action::Update, Action::Delete] {
            let decision = evaluator.authorize(Some(&other), action, ResourceKind::Post, Some(&post));
            assert_eq!(decision, AccessDecision::Deny(DenyReason::NotOwner));
        }
    }

    #[test]
    fn test_like_is_not_ownership_gated() {
        let evaluator = PermissionEvaluator::default();
        let other = identity(2);
        let post = owned_by(ResourceKind::Post, 1);

        for action in [Action::Like, Action::Unlike] {
            let decision = evaluator.authorize(Some(&other), action, ResourceKind::Post, Some(&post));
            assert!(decision.is_allowed());
        }
    }

    #[test]
    fn test_like_requires_identity_and_likeable_kind() {
        let evaluator = PermissionEvaluator::default();
        let post = owned_by(ResourceKind::Post, 1);
        let comment = owned_by(ResourceKind::Comment, 1);

        assert_eq!(
            evaluator.authorize(None, Action::Like, ResourceKind::Post, Some(&post)),
            AccessDecision::Deny(DenyReason::Unauthenticated)
        );
        assert_eq!(
            evaluator.authorize(Some(&identity(1)), Action::Like, ResourceKind::Comment, Some(&comment)),
            AccessDecision::Deny(DenyReason::Unsupported)
        );
    }

    #[test]
    fn test_anonymous_reads() {
        let evaluator = PermissionEvaluator::default();
        assert!(evaluator.authorize(None, Action::Read, ResourceKind::Post, None).is_allowed());
        assert!(evaluator.authorize(None, Action::Read, ResourceKind::Comment, None).is_allowed());
        assert_eq!(
            evaluator.authorize(None, Action::Read, ResourceKind::User, None),
            AccessDecision::Deny(DenyReason::Unauthenticated)
        );
        assert!(evaluator.authorize(None, Action::Create, ResourceKind::Post, None).is_denied());

        let locked = PermissionEvaluator::new().with_anonymous_reads(false);
        assert!(locked.authorize(None, Action::Read, ResourceKind::Post, None).is_denied());
    }

    #[test]
    fn test_authenticated_reads_and_creates() {
        let evaluator = PermissionEvaluator::default();
        let caller = identity(3);
        let someone_else = owned_by(ResourceKind::User, 9);

        assert!(
            evaluator
                .authorize(Some(&caller), Action::Read, ResourceKind::User, Some(&someone_else))
                .is_allowed()
        );
        assert!(
            evaluator
                .authorize(Some(&caller), Action::Create, ResourceKind::Comment, None)
                .is_allowed()
        );
    }

    #[test]
    fn test_owner_only_action_without_target() {
        let evaluator = PermissionEvaluator::default();
        let decision = evaluator.authorize(Some(&identity(1)), Action::Update, ResourceKind::Post, None);
        assert_eq!(decision.deny_reason(), Some(DenyReason::NotOwner));
    }

    #[test]
    fn test_user_accounts() {
        let evaluator = PermissionEvaluator::default();
        let me = identity(5);
        let myself = owned_by(ResourceKind::User, 5);
        let other = owned_by(ResourceKind::User, 6);

        assert!(
            evaluator
                .authorize(Some(&me), Action::Update, ResourceKind::User, Some(&myself))
                .is_allowed()
        );
        assert!(
            evaluator
                .authorize(Some(&me), Action::Update, ResourceKind::User, Some(&other))
                .is_denied()
        );
        assert_eq!(
            evaluator.authorize(Some(&me), Action::Delete, ResourceKind::User, Some(&myself)),
            AccessDecision::Deny(DenyReason::Unsupported)
        );
    }

    #[test]
    fn test_into_result_maps_reasons() {
        assert!(AccessDecision::Allow.into_result().is_ok());
        assert!(matches!(
            AccessDecision::Deny(DenyReason::Unauthenticated).into_result(),
            Err(AuthError::Unauthenticated { .. })
        ));
        assert!(matches!(
            AccessDecision::Deny(DenyReason::NotOwner).into_result(),
            Err(AuthError::Forbidden { .. })
        ));
    }
}
