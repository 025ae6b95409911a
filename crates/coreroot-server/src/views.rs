//! Response bodies. Only external identifiers leave the server.

use coreroot_core::ExternalId;
use coreroot_storage::{Page, Paginated};
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

/// A post or comment as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    pub id: ExternalId,
    /// External id of the owning user.
    pub author: ExternalId,
    /// External id of the parent post, for comments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<ExternalId>,
    pub body: Value,
    /// Present only on kinds that accept likes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes_count: Option<usize>,
    /// Whether the viewer likes it. Absent for anonymous viewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    pub edited: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated: OffsetDateTime,
}

/// One page of a list response.
#[derive(Debug, Clone, Serialize)]
pub struct PageView<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageView<T> {
    /// Wraps a page, linking neighbours relative to `path`.
    pub fn new(path: &str, page: Paginated<T>) -> Self {
        Self {
            count: page.count,
            next: page.page.next(page.count).map(|p| link(path, p)),
            previous: page.page.previous().map(|p| link(path, p)),
            results: page.results,
        }
    }
}

fn link(path: &str, page: Page) -> String {
    format!("{path}?limit={}&offset={}", page.limit, page.offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_links() {
        let page = Paginated {
            count: 25,
            page: Page::new(Some(10), Some(10)),
            results: vec![1, 2, 3],
        };
        let view = PageView::new("/api/post/", page);
        assert_eq!(view.next.as_deref(), Some("/api/post/?limit=10&offset=20"));
        assert_eq!(view.previous.as_deref(), Some("/api/post/?limit=10&offset=0"));

        let first = Paginated {
            count: 3,
            page: Page::default(),
            results: vec![1, 2, 3],
        };
        let view = PageView::new("/api/post/", first);
        assert!(view.next.is_none());
        assert!(view.previous.is_none());
    }
}
