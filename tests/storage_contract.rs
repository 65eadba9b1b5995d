//! Behaviour every backend shares, run against the memory and journal stores.

mod common;

use std::sync::Arc;

use common::{USER_A, USER_B, keys, user};
use url_shortener_store::application::services::ShortenerService;
use url_shortener_store::domain::context::RequestContext;
use url_shortener_store::domain::deletion_worker::{DeletionQueue, DeletionQueueConfig};
use url_shortener_store::domain::storage::Storage;
use url_shortener_store::error::AppError;
use url_shortener_store::infrastructure::persistence::{StorageConfig, StorageFactory};
use url_shortener_store::utils::key_deriver::derive_key;

async fn memory() -> Arc<dyn Storage> {
    let storage = StorageFactory::create(&StorageConfig::default())
        .await
        .unwrap();
    storage.load().await.unwrap();
    storage
}

async fn journal(dir: &tempfile::TempDir) -> Arc<dyn Storage> {
    let config = StorageConfig {
        file_storage_path: Some(dir.path().join("urls.json")),
        ..Default::default()
    };
    let storage = StorageFactory::create(&config).await.unwrap();
    storage.load().await.unwrap();
    storage
}

async fn shorten_delete_resolve(storage: Arc<dyn Storage>) {
    storage
        .set(&user(USER_A), "abc1234", "https://example.com/a")
        .await
        .unwrap();
    assert_eq!(
        storage.get("abc1234").await.unwrap(),
        "https://example.com/a"
    );

    let conflict = storage
        .set(&user(USER_B), "abc1234", "https://example.com/a")
        .await;
    assert!(matches!(conflict, Err(AppError::Conflict { .. })));

    let listed = storage.get_by_user_id(&user(USER_A)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_key, "abc1234");
    assert!(storage.get_by_user_id(&user(USER_B)).await.unwrap().is_empty());

    // another user's deletion is a no-op
    storage
        .delete_batch(&keys(&["abc1234"]), USER_B)
        .await
        .unwrap();
    assert_eq!(
        storage.get("abc1234").await.unwrap(),
        "https://example.com/a"
    );

    storage
        .delete_batch(&keys(&["abc1234"]), USER_A)
        .await
        .unwrap();
    assert!(matches!(
        storage.get("abc1234").await,
        Err(AppError::Deleted { .. })
    ));

    // deleted keys are never recycled
    let reuse = storage
        .set(&user(USER_A), "abc1234", "https://example.com/new")
        .await;
    assert!(matches!(reuse, Err(AppError::Conflict { .. })));

    assert!(matches!(
        storage.get("zzzzzzz").await,
        Err(AppError::NotFound { .. })
    ));
}

async fn identity_is_required(storage: Arc<dyn Storage>) {
    let anonymous = RequestContext::anonymous();

    assert!(matches!(
        storage.set(&anonymous, "k1", "https://a").await,
        Err(AppError::MissingUser)
    ));
    assert!(matches!(
        storage.get_by_user_id(&anonymous).await,
        Err(AppError::MissingUser)
    ));
    assert!(matches!(
        storage.get("k1").await,
        Err(AppError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_memory_shorten_delete_resolve() {
    shorten_delete_resolve(memory().await).await;
}

#[tokio::test]
async fn test_journal_shorten_delete_resolve() {
    let dir = tempfile::tempdir().unwrap();
    shorten_delete_resolve(journal(&dir).await).await;
}

#[tokio::test]
async fn test_memory_requires_identity() {
    identity_is_required(memory().await).await;
}

#[tokio::test]
async fn test_journal_requires_identity() {
    let dir = tempfile::tempdir().unwrap();
    identity_is_required(journal(&dir).await).await;
}

#[tokio::test]
async fn test_concurrent_writers_of_one_key() {
    let storage = memory().await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let storage = storage.clone();
        handles.push(tokio::spawn(async move {
            storage
                .set(
                    &user(&format!("user-{i}")),
                    "abc1234",
                    "https://example.com",
                )
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => created += 1,
            Err(e) => assert!(e.is_conflict()),
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn test_queued_deletion_through_service() {
    let dir = tempfile::tempdir().unwrap();
    let storage = journal(&dir).await;
    let (queue, worker) = DeletionQueue::spawn(storage.clone(), &DeletionQueueConfig::default());
    let service = ShortenerService::new(storage.clone(), queue, "http://localhost:8080");

    let first = service
        .shorten(&user(USER_A), "https://example.com/a")
        .await
        .unwrap();
    let again = service
        .shorten(&user(USER_B), "https://example.com/a")
        .await
        .unwrap();
    assert!(first.is_created());
    assert!(!again.is_created());
    assert_eq!(first.short_url(), again.short_url());
    assert_eq!(first.key(), derive_key(b"https://example.com/a"));

    service
        .delete_urls(&user(USER_A), vec![first.key().to_string()])
        .await
        .unwrap();

    let stats = worker.shutdown().await;
    assert_eq!(stats.processed, 1);
    assert!(matches!(
        service.resolve(first.key()).await,
        Err(AppError::Deleted { .. })
    ));

    let visible = service.user_urls(&user(USER_A), false).await.unwrap();
    assert!(visible.is_empty());

    let refused = service
        .delete_urls(&user(USER_A), vec!["other".to_string()])
        .await;
    assert!(matches!(refused, Err(AppError::QueueClosed)));
}
