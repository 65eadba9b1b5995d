//! In-memory storage backend.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::context::RequestContext;
use crate::domain::entities::{UrlRecord, UserUrl};
use crate::domain::storage::{Storage, StorageKind};
use crate::error::AppError;
use crate::infrastructure::persistence::index::UrlIndex;

/// Storage that lives for the lifetime of the process.
///
/// Used when neither a database nor a journal file is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<UrlIndex>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn load(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn set(&self, ctx: &RequestContext, key: &str, value: &str) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;
        let record = UrlRecord::new(key.to_string(), value.to_string(), user_id.to_string());
        self.index.write().await.insert(record)
    }

    async fn set_batch(
        &self,
        ctx: &RequestContext,
        items: BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;
        let mut index = self.index.write().await;
        let mut first_error = None;

        for (key, value) in items {
            let record = UrlRecord::new(key, value, user_id.to_string());
            if let Err(e) = index.insert(record) {
                tracing::debug!(error = %e, "Skipping batch item");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn get(&self, key: &str) -> Result<String, AppError> {
        self.index.read().await.resolve(key)
    }

    async fn get_by_user_id(&self, ctx: &RequestContext) -> Result<Vec<UserUrl>, AppError> {
        let user_id = ctx.user_id()?;
        Ok(self.index.read().await.by_user(user_id))
    }

    async fn delete_batch(&self, keys: &[String], user_id: &str) -> Result<(), AppError> {
        let mut index = self.index.write().await;
        let owned: Vec<String> = index
            .deletable(keys, user_id)
            .map(|record| record.short_key.clone())
            .collect();

        let deleted = owned.iter().filter(|key| index.mark_deleted(key)).count();
        tracing::debug!(user_id, requested = keys.len(), deleted, "Soft-deleted keys");
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Memory
    }

    fn supports_atomic_batch(&self) -> bool {
        false
    }

    fn supports_soft_delete(&self) -> bool {
        true
    }
}
