//! Storage contract shared by every backend.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::context::RequestContext;
use crate::domain::entities::UserUrl;
use crate::error::AppError;
use async_trait::async_trait;

/// The backend behind a [`Storage`] handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Journal,
    Postgres,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Memory => "memory",
            StorageKind::Journal => "journal",
            StorageKind::Postgres => "postgres",
        };
        f.write_str(name)
    }
}

/// Storage of short key to URL mappings.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryStore`] - process memory only
/// - [`crate::infrastructure::persistence::JournalStore`] - append-only JSON lines file
/// - [`crate::infrastructure::persistence::PgStore`] - PostgreSQL table
///
/// [`Storage::load`] must be called once before any other operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Backend initialization: schema setup or journal replay.
    ///
    /// # Errors
    ///
    /// Any error is fatal to startup.
    async fn load(&self) -> Result<(), AppError>;

    /// Stores `value` under `key`, owned by the user bound to `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if `key` is already claimed. The existing
    /// mapping is kept; `value` is discarded.
    /// Returns [`AppError::MissingUser`] if `ctx` carries no identity.
    async fn set(&self, ctx: &RequestContext, key: &str, value: &str) -> Result<(), AppError>;

    /// Stores several mappings for the user bound to `ctx`.
    ///
    /// Atomic only when [`Storage::supports_atomic_batch`] is true. Otherwise
    /// non-colliding items are applied even if another item fails, and the
    /// first failure is returned.
    async fn set_batch(
        &self,
        ctx: &RequestContext,
        items: BTreeMap<String, String>,
    ) -> Result<(), AppError>;

    /// Resolves `key` to its original URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the key was never stored and
    /// [`AppError::Deleted`] if it was soft-deleted.
    async fn get(&self, key: &str) -> Result<String, AppError>;

    /// Lists every record created by the user bound to `ctx`, in creation
    /// order, soft-deleted ones included.
    async fn get_by_user_id(&self, ctx: &RequestContext) -> Result<Vec<UserUrl>, AppError>;

    /// Soft-deletes the records in `keys` owned by `user_id`.
    ///
    /// Keys that do not exist or belong to another user are skipped.
    async fn delete_batch(&self, keys: &[String], user_id: &str) -> Result<(), AppError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), AppError>;

    /// Releases backend resources. Idempotent.
    async fn close(&self) -> Result<(), AppError>;

    fn kind(&self) -> StorageKind;

    /// Whether `set_batch` is all-or-nothing.
    fn supports_atomic_batch(&self) -> bool;

    /// Whether `delete_batch` makes keys resolve to [`AppError::Deleted`].
    fn supports_soft_delete(&self) -> bool;
}
