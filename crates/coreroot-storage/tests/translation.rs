use std::sync::Arc;

use coreroot_core::{ResourceKind, SurrogateKey};
use coreroot_storage::{IdentifierTranslator, InMemoryStore, NewResource, ResourceStore};
use serde_json::json;

async fn seeded() -> (Arc<InMemoryStore>, IdentifierTranslator) {
    let store = Arc::new(InMemoryStore::new());
    let translator = IdentifierTranslator::new(store.clone());
    (store, translator)
}

#[tokio::test]
async fn test_translator_follows_store_lifecycle() {
    let (store, translator) = seeded().await;
    let post = store
        .create(NewResource {
            kind: ResourceKind::Post,
            owner: SurrogateKey(1),
            parent: None,
            body: json!({"body": "first"}),
        })
        .await
        .unwrap();

    let key = translator
        .resolve(ResourceKind::Post, &post.id.to_string())
        .await
        .unwrap();
    assert_eq!(key, post.key);

    let deleted = store.delete(ResourceKind::Post, key).await.unwrap();
    translator.forget(ResourceKind::Post, key, deleted.resource.id);

    let err = translator
        .resolve(ResourceKind::Post, &post.id.to_string())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_concurrent_resolution_agrees() {
    let (store, translator) = seeded().await;
    let translator = Arc::new(translator);
    let post = store
        .create(NewResource {
            kind: ResourceKind::Post,
            owner: SurrogateKey(1),
            parent: None,
            body: json!({"body": "shared"}),
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let translator = translator.clone();
        let raw = post.id.to_string();
        handles.push(tokio::spawn(async move {
            translator.resolve(ResourceKind::Post, &raw).await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), post.key);
    }
}

#[tokio::test]
async fn test_surrogate_keys_never_parse_as_external_ids() {
    let (store, translator) = seeded().await;
    let post = store
        .create(NewResource {
            kind: ResourceKind::Post,
            owner: SurrogateKey(1),
            parent: None,
            body: json!({}),
        })
        .await
        .unwrap();

    let err = translator
        .resolve(ResourceKind::Post, &post.key.to_string())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
