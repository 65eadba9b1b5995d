//! Storage and background worker lifecycle.
//!
//! Handles backend selection, loading, deletion worker spawning and an
//! orderly shutdown.

use std::sync::Arc;

use crate::application::services::ShortenerService;
use crate::config::Config;
use crate::domain::deletion_worker::{DeletionQueue, DeletionStats, DeletionWorker};
use crate::domain::storage::Storage;
use crate::error::AppError;
use crate::infrastructure::persistence::StorageFactory;

/// A loaded storage backend together with its deletion worker.
pub struct Runtime {
    storage: Arc<dyn Storage>,
    service: Arc<ShortenerService<dyn Storage>>,
    worker: DeletionWorker,
}

impl Runtime {
    /// Starts the runtime with the given configuration.
    ///
    /// Initializes:
    /// - The storage backend selected by the configuration
    /// - Its persisted state (schema setup or journal replay)
    /// - Background deletion worker
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created or loaded.
    pub async fn start(config: &Config) -> Result<Self, AppError> {
        let storage = StorageFactory::create(&config.storage_config()).await?;

        if let Err(e) = storage.load().await {
            tracing::error!(error = %e, backend = %storage.kind(), "Failed to load storage");
            if let Err(close) = storage.close().await {
                tracing::warn!(error = %close, "Failed to close storage");
            }
            return Err(e);
        }

        let (queue, worker) = DeletionQueue::spawn(storage.clone(), &config.deletion_queue_config());

        let service = Arc::new(ShortenerService::new(
            storage.clone(),
            queue,
            config.base_url.clone(),
        ));

        Ok(Self {
            storage,
            service,
            worker,
        })
    }

    pub fn service(&self) -> Arc<ShortenerService<dyn Storage>> {
        self.service.clone()
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Drains queued deletions, stops the worker and closes storage.
    ///
    /// Requests enqueued after this call starts are refused with
    /// [`AppError::QueueClosed`].
    pub async fn shutdown(self) -> Result<DeletionStats, AppError> {
        let stats = self.worker.shutdown().await;
        self.storage.close().await?;
        Ok(stats)
    }
}
