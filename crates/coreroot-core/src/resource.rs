use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::{CoreError, Result};
use crate::id::{ExternalId, SurrogateKey};

/// Kinds of resources exposed through the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    User,
    Post,
    Comment,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    /// Kind of the resource this kind is nested under, if any.
    pub fn parent_kind(&self) -> Option<ResourceKind> {
        match self {
            Self::Comment => Some(Self::Post),
            Self::User | Self::Post => None,
        }
    }

    /// Only posts carry a like set.
    pub fn supports_likes(&self) -> bool {
        matches!(self, Self::Post)
    }

    /// Anonymous callers may read posts and comments, never user profiles.
    pub fn is_publicly_readable(&self) -> bool {
        matches!(self, Self::Post | Self::Comment)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Self::User),
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            other => Err(CoreError::invalid_resource_kind(other)),
        }
    }
}

/// Public address of a resource: what a request names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: ExternalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ExternalId>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: ExternalId) -> Self {
        Self {
            kind,
            id,
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: ExternalId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// The parent resource's address, when this kind is nested.
    pub fn parent_ref(&self) -> Option<ResourceRef> {
        match (self.kind.parent_kind(), self.parent) {
            (Some(kind), Some(id)) => Some(ResourceRef::new(kind, id)),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Ownership metadata the permission evaluator needs about a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceOwnership {
    pub kind: ResourceKind,
    pub owner: SurrogateKey,
}

/// A stored post or comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub key: SurrogateKey,
    pub id: ExternalId,
    pub kind: ResourceKind,
    pub owner: SurrogateKey,
    #[serde(default)]
    pub parent: Option<SurrogateKey>,
    pub body: Value,
    #[serde(default)]
    pub liked_by: BTreeSet<SurrogateKey>,
    #[serde(default)]
    pub edited: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Resource {
    pub fn ownership(&self) -> ResourceOwnership {
        ResourceOwnership {
            kind: self.kind,
            owner: self.owner,
        }
    }

    pub fn likes_count(&self) -> usize {
        self.liked_by.len()
    }

    pub fn is_liked_by(&self, user: SurrogateKey) -> bool {
        self.liked_by.contains(&user)
    }
}
