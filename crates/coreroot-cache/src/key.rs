//! Cache keys and invalidation tags.
//!
//! ## Key Format
//!
//! - single resource: `coreroot:{kind}:{id}`
//! - list page: `coreroot:{kind}:list:{parent|root}:{limit}:{offset}`
//!
//! ## Tags
//!
//! Every key carries the tags of what it embeds. Invalidating a tag removes
//! every key carrying it.
//!
//! | Key                          | Tags                                  |
//! |------------------------------|---------------------------------------|
//! | post P                       | `post:P`                              |
//! | comment C under post P       | `comment:C`, `post:P`                 |
//! | post list page               | `post:list:root`                      |
//! | comment list page under P    | `comment:list:P`, `post:P`            |

use std::fmt;

use coreroot_core::{ExternalId, ResourceKind, ResourceRef};
use coreroot_storage::Page;

const KEY_PREFIX: &str = "coreroot";
const ROOT: &str = "root";

/// A fully-qualified cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of a single resource.
    pub fn resource(resource: &ResourceRef) -> Self {
        Self(format!("{KEY_PREFIX}:{}:{}", resource.kind, resource.id))
    }

    /// Key of one page of a (possibly nested) collection.
    pub fn list(kind: ResourceKind, parent: Option<&ExternalId>, page: Page) -> Self {
        Self(format!(
            "{KEY_PREFIX}:{kind}:list:{}:{}:{}",
            scope(parent),
            page.limit,
            page.offset
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A name for something cached entries depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// Tag of a single resource.
    pub fn resource(kind: ResourceKind, id: &ExternalId) -> Self {
        Self(format!("{kind}:{id}"))
    }

    /// Tag of a collection of `kind` under `parent` (or top-level).
    pub fn collection(kind: ResourceKind, parent: Option<&ExternalId>) -> Self {
        Self(format!("{kind}:list:{}", scope(parent)))
    }

    /// Tags carried by the cache entry of a single resource.
    pub fn for_resource(resource: &ResourceRef) -> Vec<Tag> {
        let mut tags = vec![Self::resource(resource.kind, &resource.id)];
        if let Some(parent) = resource.parent_ref() {
            tags.push(Self::resource(parent.kind, &parent.id));
        }
        tags
    }

    /// Tags carried by a list page.
    pub fn for_list(kind: ResourceKind, parent: Option<&ExternalId>) -> Vec<Tag> {
        let mut tags = vec![Self::collection(kind, parent)];
        if let (Some(parent_kind), Some(parent)) = (kind.parent_kind(), parent) {
            tags.push(Self::resource(parent_kind, parent));
        }
        tags
    }

    /// Tags to invalidate when `resource` is created, changed or deleted:
    /// the resource itself and the collection it belongs to.
    pub fn for_mutation(resource: &ResourceRef) -> Vec<Tag> {
        vec![
            Self::resource(resource.kind, &resource.id),
            Self::collection(resource.kind, resource.parent.as_ref()),
        ]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn scope(parent: Option<&ExternalId>) -> String {
    parent.map_or_else(|| ROOT.to_string(), ExternalId::to_string)
}
