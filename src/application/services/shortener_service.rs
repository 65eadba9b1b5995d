//! URL shortening service.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::context::RequestContext;
use crate::domain::deletion_request::DeletionRequest;
use crate::domain::deletion_worker::DeletionQueue;
use crate::domain::storage::Storage;
use crate::error::AppError;
use crate::utils::key_deriver::derive_key;

/// Result of shortening a single URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new record was stored.
    Created { key: String, short_url: String },
    /// The key was already taken; `short_url` points at the existing record.
    Existing { key: String, short_url: String },
}

impl Shortened {
    pub fn key(&self) -> &str {
        match self {
            Shortened::Created { key, .. } | Shortened::Existing { key, .. } => key,
        }
    }

    pub fn short_url(&self) -> &str {
        match self {
            Shortened::Created { short_url, .. } | Shortened::Existing { short_url, .. } => {
                short_url
            }
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Shortened::Created { .. })
    }
}

/// One item of a batch shortening request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

/// One item of a batch shortening response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// A user's URL as presented to that user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserShortUrl {
    pub short_url: String,
    pub original_url: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// Derives keys for submitted URLs and drives the storage contract.
///
/// This is the layer an HTTP handler calls once it has resolved the caller's
/// identity and read the request body.
pub struct ShortenerService<S: Storage + ?Sized> {
    storage: Arc<S>,
    deletions: DeletionQueue,
    base_url: String,
}

impl<S: Storage + ?Sized> ShortenerService<S> {
    /// Creates a service. `base_url` is the prefix of every returned short URL.
    pub fn new(storage: Arc<S>, deletions: DeletionQueue, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            storage,
            deletions,
            base_url,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Builds the public short URL for `key`.
    pub fn short_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Shortens `original_url` for the user bound to `ctx`.
    ///
    /// Submitting a URL that already has a record (from any user) is not an
    /// error: the existing key is returned as [`Shortened::Existing`]. The URL
    /// is hashed and stored byte for byte as given.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for a blank URL,
    /// [`AppError::MissingUser`] without identity, and backend errors as is.
    pub async fn shorten(
        &self,
        ctx: &RequestContext,
        original_url: &str,
    ) -> Result<Shortened, AppError> {
        if original_url.trim().is_empty() {
            return Err(AppError::validation("URL must not be empty"));
        }

        let key = derive_key(original_url.as_bytes());
        let short_url = self.short_url(&key);

        match self.storage.set(ctx, &key, original_url).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Short URL created");
                Ok(Shortened::Created { key, short_url })
            }
            Err(AppError::Conflict { .. }) => {
                tracing::debug!(key = %key, "URL already shortened");
                Ok(Shortened::Existing { key, short_url })
            }
            Err(e) => Err(e),
        }
    }

    /// Shortens several URLs in one storage call.
    ///
    /// Results keep the order and correlation ids of `items`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if any URL is empty; nothing is stored
    /// in that case. Storage errors are propagated; whether earlier items were
    /// persisted depends on [`Storage::supports_atomic_batch`].
    pub async fn shorten_batch(
        &self,
        ctx: &RequestContext,
        items: Vec<BatchItem>,
    ) -> Result<Vec<BatchResult>, AppError> {
        if let Some(empty) = items.iter().find(|i| i.original_url.trim().is_empty()) {
            return Err(AppError::validation(format!(
                "URL for correlation id '{}' must not be empty",
                empty.correlation_id
            )));
        }

        let mut batch = BTreeMap::new();
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let original_url = item.original_url;
            let key = derive_key(original_url.as_bytes());
            results.push(BatchResult {
                correlation_id: item.correlation_id,
                short_url: self.short_url(&key),
            });
            batch.insert(key, original_url);
        }

        if !batch.is_empty() {
            self.storage.set_batch(ctx, batch).await?;
        }
        Ok(results)
    }

    /// Resolves a short key to the URL to redirect to.
    pub async fn resolve(&self, key: &str) -> Result<String, AppError> {
        self.storage.get(key).await
    }

    /// Lists the URLs created by the user bound to `ctx`.
    ///
    /// Soft-deleted URLs are included only if `include_deleted` is set.
    pub async fn user_urls(
        &self,
        ctx: &RequestContext,
        include_deleted: bool,
    ) -> Result<Vec<UserShortUrl>, AppError> {
        let urls = self.storage.get_by_user_id(ctx).await?;

        Ok(urls
            .into_iter()
            .filter(|u| include_deleted || !u.deleted)
            .map(|u| UserShortUrl {
                short_url: self.short_url(&u.short_key),
                original_url: u.original_url,
                deleted: u.deleted,
            })
            .collect())
    }

    /// Accepts a deletion of `keys` for the user bound to `ctx`.
    ///
    /// Returns as soon as the request is queued; deletion happens in the
    /// background and failures are only logged.
    pub async fn delete_urls(&self, ctx: &RequestContext, keys: Vec<String>) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;
        self.deletions
            .enqueue(DeletionRequest::new(user_id, keys))
            .await
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.storage.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deletion_worker::DeletionQueueConfig;
    use crate::domain::entities::UserUrl;
    use crate::domain::storage::MockStorage;

    fn service(mock: MockStorage) -> ShortenerService<MockStorage> {
        let (queue, _rx) = DeletionQueue::bounded(&DeletionQueueConfig::default());
        ShortenerService::new(Arc::new(mock), queue, "http://localhost:8080/")
    }

    fn user() -> RequestContext {
        RequestContext::for_user("user-a")
    }

    #[tokio::test]
    async fn test_shorten_creates_record() {
        let mut mock = MockStorage::new();
        let expected_key = derive_key(b"https://example.com");
        let key_for_mock = expected_key.clone();

        mock.expect_set()
            .withf(move |_, key, value| key == key_for_mock && value == "https://example.com")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let result = service(mock)
            .shorten(&user(), "https://example.com")
            .await
            .unwrap();

        assert!(result.is_created());
        assert_eq!(result.key(), expected_key);
        assert_eq!(
            result.short_url(),
            format!("http://localhost:8080/{expected_key}")
        );
    }

    #[tokio::test]
    async fn test_shorten_conflict_returns_existing() {
        let mut mock = MockStorage::new();
        mock.expect_set().times(1).returning(|_, key, _| {
            Err(AppError::Conflict {
                key: key.to_string(),
            })
        });

        let result = service(mock)
            .shorten(&user(), "https://example.com")
            .await
            .unwrap();

        assert!(!result.is_created());
        assert_eq!(result.key(), derive_key(b"https://example.com"));
    }

    #[tokio::test]
    async fn test_shorten_rejects_empty_url() {
        let mut mock = MockStorage::new();
        mock.expect_set().times(0);

        let result = service(mock).shorten(&user(), "   ").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_shorten_keeps_url_bytes_as_given() {
        let mut mock = MockStorage::new();
        let expected_key = derive_key(b" https://example.com\n");
        let key_for_mock = expected_key.clone();

        mock.expect_set()
            .withf(move |_, key, value| key == key_for_mock && value == " https://example.com\n")
            .times(1)
            .returning(|_, _, _| Ok(()));

        let result = service(mock)
            .shorten(&user(), " https://example.com\n")
            .await
            .unwrap();

        assert_eq!(result.key(), expected_key);
        assert_ne!(result.key(), derive_key(b"https://example.com"));
    }

    #[tokio::test]
    async fn test_shorten_propagates_missing_user() {
        let mut mock = MockStorage::new();
        mock.expect_set()
            .returning(|_, _, _| Err(AppError::MissingUser));

        let result = service(mock)
            .shorten(&RequestContext::anonymous(), "https://example.com")
            .await;
        assert!(matches!(result, Err(AppError::MissingUser)));
    }

    #[tokio::test]
    async fn test_shorten_batch_keeps_correlation_ids() {
        let mut mock = MockStorage::new();
        mock.expect_set_batch()
            .withf(|_, items| items.len() == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let items = vec![
            BatchItem {
                correlation_id: "1".to_string(),
                original_url: "https://example.com/a".to_string(),
            },
            BatchItem {
                correlation_id: "2".to_string(),
                original_url: "https://example.com/b".to_string(),
            },
        ];

        let results = service(mock).shorten_batch(&user(), items).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].correlation_id, "1");
        assert_eq!(
            results[0].short_url,
            format!("http://localhost:8080/{}", derive_key(b"https://example.com/a"))
        );
        assert_eq!(results[1].correlation_id, "2");
    }

    #[tokio::test]
    async fn test_shorten_batch_rejects_empty_url_before_storing() {
        let mut mock = MockStorage::new();
        mock.expect_set_batch().times(0);

        let items = vec![BatchItem {
            correlation_id: "x".to_string(),
            original_url: String::new(),
        }];

        let result = service(mock).shorten_batch(&user(), items).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_resolve_passes_through_deleted() {
        let mut mock = MockStorage::new();
        mock.expect_get()
            .withf(|key| key == "abc1234")
            .returning(|key| {
                Err(AppError::Deleted {
                    key: key.to_string(),
                })
            });

        let result = service(mock).resolve("abc1234").await;
        assert!(matches!(result, Err(AppError::Deleted { .. })));
    }

    #[tokio::test]
    async fn test_user_urls_hides_deleted_by_default() {
        let mut mock = MockStorage::new();
        mock.expect_get_by_user_id().times(2).returning(|_| {
            Ok(vec![
                UserUrl {
                    short_key: "k1".to_string(),
                    original_url: "https://a".to_string(),
                    deleted: false,
                },
                UserUrl {
                    short_key: "k2".to_string(),
                    original_url: "https://b".to_string(),
                    deleted: true,
                },
            ])
        });

        let service = service(mock);

        let visible = service.user_urls(&user(), false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].short_url, "http://localhost:8080/k1");

        let all = service.user_urls(&user(), true).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[1].deleted);
    }

    #[tokio::test]
    async fn test_delete_urls_enqueues_request() {
        let (queue, mut rx) = DeletionQueue::bounded(&DeletionQueueConfig::default());
        let service = ShortenerService::new(Arc::new(MockStorage::new()), queue, "http://s");

        service
            .delete_urls(&user(), vec!["k1".to_string(), "k2".to_string()])
            .await
            .unwrap();

        let request = rx.recv().await.unwrap();
        assert_eq!(request.user_id, "user-a");
        assert_eq!(request.keys, vec!["k1", "k2"]);
    }

    #[tokio::test]
    async fn test_delete_urls_requires_user() {
        let result = service(MockStorage::new())
            .delete_urls(&RequestContext::anonymous(), vec!["k1".to_string()])
            .await;
        assert!(matches!(result, Err(AppError::MissingUser)));
    }
}
