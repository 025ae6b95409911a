//! Types shared by storage backends and their callers.

use std::fmt;

use coreroot_core::{ExternalId, ResourceKind, SurrogateKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Upper bound on requested page sizes.
pub const MAX_PAGE_SIZE: usize = 100;

/// Limit/offset pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// Builds a page from optional query values using the default bounds.
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self::bounded(limit, offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    /// Builds a page, clamping the limit into `1..=max_limit`.
    pub fn bounded(
        limit: Option<usize>,
        offset: Option<usize>,
        default_limit: usize,
        max_limit: usize,
    ) -> Self {
        let max_limit = max_limit.max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, max_limit);
        Self {
            limit,
            offset: offset.unwrap_or(0),
        }
    }

    /// The page after this one, if `total` has more items.
    pub fn next(&self, total: usize) -> Option<Page> {
        let next_offset = self
            .offset
            .checked_add(self.limit)
            .filter(|offset| *offset < total)?;
        Some(Page {
            limit: self.limit,
            offset: next_offset,
        })
    }

    /// The page before this one, if this is not the first page.
    pub fn previous(&self) -> Option<Page> {
        (self.offset > 0).then(|| Page {
            limit: self.limit,
            offset: self.offset.saturating_sub(self.limit),
        })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.limit, self.offset)
    }
}

/// One page of results plus the total number of matching items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: usize,
    pub page: Page,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn map<U, F>(self, f: F) -> Paginated<U>
    where
        F: FnMut(T) -> U,
    {
        Paginated {
            count: self.count,
            page: self.page,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Data needed to create a post or comment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResource {
    pub kind: ResourceKind,
    pub owner: SurrogateKey,
    pub parent: Option<SurrogateKey>,
    pub body: Value,
}

/// How an update applies the new body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceUpdate {
    /// Full replacement (PUT).
    Replace(Value),
    /// Top-level field merge (PATCH).
    Merge(Value),
}

impl ResourceUpdate {
    /// Applies the update to an existing body.
    pub fn apply(self, current: &Value) -> Value {
        match self {
            Self::Replace(body) => body,
            Self::Merge(patch) => match (current, patch) {
                (Value::Object(base), Value::Object(changes)) => {
                    let mut merged = base.clone();
                    for (field, value) in changes {
                        merged.insert(field, value);
                    }
                    Value::Object(merged)
                }
                (_, other) => other,
            },
        }
    }
}

/// Data needed to register a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

/// A stored user account.
#[derive(Clone, PartialEq)]
pub struct UserRecord {
    pub key: SurrogateKey,
    pub id: ExternalId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}
