//! Asynchronous batch deletion pipeline.
//!
//! Deletions are accepted immediately and applied later by one background
//! worker. Requests are processed in FIFO order; a failed request is logged
//! and the worker moves on to the next one.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::domain::deletion_request::DeletionRequest;
use crate::domain::storage::Storage;
use crate::error::AppError;

/// What `enqueue` does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for free capacity (backpressure).
    #[default]
    Block,
    /// Fail with [`AppError::QueueFull`].
    Reject,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown overflow policy '{other}'")),
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionQueueConfig {
    pub capacity: usize,
    pub overflow: OverflowPolicy,
    /// Retries of a transiently failing `delete_batch`. Zero disables retry.
    pub retry_attempts: usize,
}

impl Default for DeletionQueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            overflow: OverflowPolicy::Block,
            retry_attempts: 2,
        }
    }
}

/// Producer side of the deletion queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::Sender<DeletionRequest>,
    overflow: OverflowPolicy,
}

impl DeletionQueue {
    /// Creates the bounded channel without starting a consumer.
    pub fn bounded(config: &DeletionQueueConfig) -> (Self, mpsc::Receiver<DeletionRequest>) {
        let (tx, rx) = mpsc::channel(config.capacity.max(1));
        (
            Self {
                tx,
                overflow: config.overflow,
            },
            rx,
        )
    }

    /// Creates the queue and spawns its worker on the current runtime.
    pub fn spawn<S>(storage: Arc<S>, config: &DeletionQueueConfig) -> (Self, DeletionWorker)
    where
        S: Storage + ?Sized + 'static,
    {
        let (queue, rx) = Self::bounded(config);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_deletion_worker(
            rx,
            storage,
            config.retry_attempts,
            shutdown_rx,
        ));
        tracing::info!(
            capacity = config.capacity,
            overflow = ?config.overflow,
            "Deletion worker started"
        );

        (
            queue,
            DeletionWorker {
                shutdown: Some(shutdown_tx),
                handle,
            },
        )
    }

    /// Submits a deletion request.
    ///
    /// Empty requests are accepted and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::QueueFull`] when the queue is full under
    /// [`OverflowPolicy::Reject`], and [`AppError::QueueClosed`] once the
    /// worker has shut down.
    pub async fn enqueue(&self, request: DeletionRequest) -> Result<(), AppError> {
        if request.is_empty() {
            return Ok(());
        }

        match self.overflow {
            OverflowPolicy::Block => self
                .tx
                .send(request)
                .await
                .map_err(|_| AppError::QueueClosed)?,
            OverflowPolicy::Reject => match self.tx.try_send(request) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    counter!("deletion_requests_rejected_total").increment(1);
                    return Err(AppError::QueueFull);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(AppError::QueueClosed),
            },
        }

        counter!("deletion_requests_enqueued_total").increment(1);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots currently available.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Outcome counters of a worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionStats {
    pub processed: u64,
    pub failed: u64,
}

/// Handle to the spawned deletion worker.
pub struct DeletionWorker {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<DeletionStats>,
}

impl DeletionWorker {
    /// Stops accepting requests, drains what is already queued and waits
    /// for the worker to finish.
    pub async fn shutdown(mut self) -> DeletionStats {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        match self.handle.await {
            Ok(stats) => {
                tracing::info!(
                    processed = stats.processed,
                    failed = stats.failed,
                    "Deletion worker stopped"
                );
                stats
            }
            Err(e) => {
                tracing::error!(error = %e, "Deletion worker terminated abnormally");
                DeletionStats::default()
            }
        }
    }
}

enum Next {
    Request(Option<DeletionRequest>),
    Shutdown { requested: bool },
}

/// Consumes deletion requests until the queue is closed and drained.
///
/// A shutdown signal closes the queue to new requests; already buffered
/// requests are still applied. If the shutdown handle is dropped instead,
/// the worker keeps running until every producer is gone.
pub async fn run_deletion_worker<S>(
    mut rx: mpsc::Receiver<DeletionRequest>,
    storage: Arc<S>,
    retry_attempts: usize,
    shutdown: oneshot::Receiver<()>,
) -> DeletionStats
where
    S: Storage + ?Sized,
{
    let mut stats = DeletionStats::default();
    let mut shutdown = Some(shutdown);

    loop {
        let next = match shutdown.as_mut() {
            Some(signal) => tokio::select! {
                request = rx.recv() => Next::Request(request),
                result = signal => Next::Shutdown { requested: result.is_ok() },
            },
            None => Next::Request(rx.recv().await),
        };

        let request = match next {
            Next::Shutdown { requested } => {
                shutdown = None;
                if requested {
                    tracing::info!("Deletion worker draining queue before shutdown");
                    rx.close();
                }
                continue;
            }
            Next::Request(Some(request)) => request,
            Next::Request(None) => break,
        };

        match delete_with_retry(storage.as_ref(), &request, retry_attempts).await {
            Ok(()) => {
                stats.processed += 1;
                counter!("deletion_requests_processed_total").increment(1);
                tracing::debug!(
                    user_id = %request.user_id,
                    keys = request.keys.len(),
                    waited_ms = request.waited_ms(),
                    "Deletion batch applied"
                );
            }
            Err(e) => {
                stats.failed += 1;
                counter!("deletion_requests_failed_total").increment(1);
                tracing::error!(
                    user_id = %request.user_id,
                    keys = request.keys.len(),
                    error = %e,
                    "Failed to apply deletion batch"
                );
            }
        }
    }

    stats
}

async fn delete_with_retry<S>(
    storage: &S,
    request: &DeletionRequest,
    retry_attempts: usize,
) -> Result<(), AppError>
where
    S: Storage + ?Sized,
{
    // 50ms, 100ms, 200ms ... capped at one second
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(25)
        .max_delay(Duration::from_secs(1))
        .map(jitter)
        .take(retry_attempts);

    RetryIf::start(
        strategy,
        || storage.delete_batch(&request.keys, &request.user_id),
        AppError::is_transient,
    )
    .await
}
