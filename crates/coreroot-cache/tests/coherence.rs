use std::sync::Arc;
use std::time::Duration;

use coreroot_cache::{CacheAside, CoherentStore, LocalCacheStore};
use coreroot_core::{ManualClock, Resource, ResourceKind, ResourceRef, SurrogateKey};
use coreroot_storage::{
    IdentifierTranslator, InMemoryStore, NewResource, Page, ResourceStore, ResourceUpdate,
};
use serde_json::json;

const ALICE: SurrogateKey = SurrogateKey(1);
const BOB: SurrogateKey = SurrogateKey(2);

struct Fixture {
    store: Arc<InMemoryStore>,
    content: CoherentStore,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let backend = Arc::new(LocalCacheStore::new(1_000, clock));
    let cache = Arc::new(CacheAside::new(backend, Duration::from_secs(300)));
    let translator = Arc::new(IdentifierTranslator::new(store.clone()));
    let content = CoherentStore::new(store.clone(), cache, translator);
    Fixture { store, content }
}

async fn create_post(content: &CoherentStore, body: &str) -> Resource {
    content
        .create(NewResource {
            kind: ResourceKind::Post,
            owner: ALICE,
            parent: None,
            body: json!({ "body": body }),
        })
        .await
        .unwrap()
}

async fn create_comment(content: &CoherentStore, post: &Resource, body: &str) -> Resource {
    content
        .create(NewResource {
            kind: ResourceKind::Comment,
            owner: BOB,
            parent: Some(post.key),
            body: json!({ "body": body }),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_update_is_visible_to_next_read() {
    let f = fixture();
    let post = create_post(&f.content, "v1").await;
    let reference = ResourceRef::new(ResourceKind::Post, post.id);

    let first = f.content.get(&reference, post.key).await.unwrap();
    assert_eq!(first.body["body"], "v1");
    let cached = f.content.get(&reference, post.key).await.unwrap();
    assert_eq!(cached, first);
    assert_eq!(f.content.cache().stats().hits, 1);

    f.content
        .update(
            ResourceKind::Post,
            post.key,
            ResourceUpdate::Merge(json!({ "body": "v2" })),
        )
        .await
        .unwrap();

    let after = f.content.get(&reference, post.key).await.unwrap();
    assert_eq!(after.body["body"], "v2");
    assert!(after.edited);
}

#[tokio::test]
async fn test_list_pages_see_new_posts() {
    let f = fixture();
    create_post(&f.content, "first").await;

    let page = f
        .content
        .list(ResourceKind::Post, None, Page::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);

    create_post(&f.content, "second").await;
    let page = f
        .content
        .list(ResourceKind::Post, None, Page::default())
        .await
        .unwrap();
    assert_eq!(page.count, 2);
}

#[tokio::test]
async fn test_like_updates_cached_count() {
    let f = fixture();
    let post = create_post(&f.content, "likeable").await;
    let reference = ResourceRef::new(ResourceKind::Post, post.id);

    assert_eq!(
        f.content.get(&reference, post.key).await.unwrap().likes_count(),
        0
    );

    f.content
        .set_like(ResourceKind::Post, post.key, BOB, true)
        .await
        .unwrap();
    f.content
        .set_like(ResourceKind::Post, post.key, BOB, true)
        .await
        .unwrap();

    let liked = f.content.get(&reference, post.key).await.unwrap();
    assert_eq!(liked.likes_count(), 1);
    assert!(liked.is_liked_by(BOB));

    f.content
        .set_like(ResourceKind::Post, post.key, BOB, false)
        .await
        .unwrap();
    assert_eq!(
        f.content.get(&reference, post.key).await.unwrap().likes_count(),
        0
    );
}

#[tokio::test]
async fn test_new_comment_invalidates_comment_pages() {
    let f = fixture();
    let post = create_post(&f.content, "thread").await;
    let parent = Some((post.id, post.key));

    let empty = f
        .content
        .list(ResourceKind::Comment, parent, Page::default())
        .await
        .unwrap();
    assert_eq!(empty.count, 0);

    create_comment(&f.content, &post, "hello").await;
    let page = f
        .content
        .list(ResourceKind::Comment, parent, Page::default())
        .await
        .unwrap();
    assert_eq!(page.count, 1);
}

#[tokio::test]
async fn test_deleting_post_clears_its_comments() {
    let f = fixture();
    let post = create_post(&f.content, "doomed").await;
    let comment = create_comment(&f.content, &post, "reply").await;
    let comment_ref = ResourceRef::new(ResourceKind::Comment, comment.id).with_parent(post.id);
    let parent = Some((post.id, post.key));

    f.content.get(&comment_ref, comment.key).await.unwrap();
    f.content
        .list(ResourceKind::Comment, parent, Page::default())
        .await
        .unwrap();

    let deleted = f
        .content
        .delete(ResourceKind::Post, post.key)
        .await
        .unwrap();
    assert_eq!(deleted.cascaded.len(), 1);

    let err = f
        .content
        .get(&comment_ref, comment.key)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let page = f
        .content
        .list(ResourceKind::Comment, parent, Page::default())
        .await
        .unwrap();
    assert_eq!(page.count, 0);

    let lookup = f
        .content
        .translator()
        .resolve(ResourceKind::Comment, &comment.id.to_string())
        .await;
    assert!(lookup.is_err());
}

#[tokio::test]
async fn test_comment_change_keeps_post_entry() {
    let f = fixture();
    let post = create_post(&f.content, "stable").await;
    let post_ref = ResourceRef::new(ResourceKind::Post, post.id);
    let comment = create_comment(&f.content, &post, "first").await;

    f.content.get(&post_ref, post.key).await.unwrap();
    f.content
        .update(
            ResourceKind::Comment,
            comment.key,
            ResourceUpdate::Replace(json!({ "body": "second" })),
        )
        .await
        .unwrap();

    let hits = f.content.cache().stats().hits;
    f.content.get(&post_ref, post.key).await.unwrap();
    assert_eq!(f.content.cache().stats().hits, hits + 1);
}

#[tokio::test]
async fn test_failed_write_leaves_cache_untouched() {
    let f = fixture();
    let post = create_post(&f.content, "kept").await;
    let reference = ResourceRef::new(ResourceKind::Post, post.id);
    f.content.get(&reference, post.key).await.unwrap();

    let err = f
        .content
        .update(
            ResourceKind::Post,
            SurrogateKey(9_999),
            ResourceUpdate::Replace(json!({})),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let invalidations = f.content.cache().stats().invalidations;
    assert_eq!(invalidations, 1); // from the create only
    assert_eq!(f.store.resource_count(), 1);
}
