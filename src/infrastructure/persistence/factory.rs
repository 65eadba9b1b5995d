//! Backend selection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::storage::{Storage, StorageKind};
use crate::error::AppError;
use crate::infrastructure::persistence::{JournalStore, MemoryStore, PgStore};

/// Settings the factory needs to pick and build a backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_dsn: Option<String>,
    pub file_storage_path: Option<PathBuf>,
    pub database_timeout: Duration,
    pub db_max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_dsn: None,
            file_storage_path: None,
            database_timeout: Duration::from_secs(1),
            db_max_connections: 10,
        }
    }
}

impl StorageConfig {
    /// The backend these settings select.
    ///
    /// A database DSN wins over a journal path; with neither, storage is
    /// in-memory. Empty values count as absent.
    pub fn kind(&self) -> StorageKind {
        if self.database_dsn.as_deref().is_some_and(|dsn| !dsn.is_empty()) {
            StorageKind::Postgres
        } else if self
            .file_storage_path
            .as_ref()
            .is_some_and(|path| !path.as_os_str().is_empty())
        {
            StorageKind::Journal
        } else {
            StorageKind::Memory
        }
    }
}

pub struct StorageFactory;

impl StorageFactory {
    /// Builds the backend selected by `config`.
    ///
    /// The returned storage is not loaded yet; call [`Storage::load`] once
    /// before using it.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be opened or the DSN is invalid.
    pub async fn create(config: &StorageConfig) -> Result<Arc<dyn Storage>, AppError> {
        let selected = (
            config.kind(),
            config.database_dsn.as_deref(),
            config.file_storage_path.as_deref(),
        );

        let storage: Arc<dyn Storage> = match selected {
            (StorageKind::Postgres, Some(dsn), _) => Arc::new(PgStore::connect_lazy(
                dsn,
                config.db_max_connections,
                config.database_timeout,
            )?),
            (StorageKind::Journal, _, Some(path)) => Arc::new(JournalStore::open(path).await?),
            _ => Arc::new(MemoryStore::new()),
        };

        tracing::info!(backend = %storage.kind(), "Storage backend selected");
        Ok(storage)
    }
}
