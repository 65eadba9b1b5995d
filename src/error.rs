//! Crate-wide error type.
//!
//! Every backend translates its own failures (I/O, `serde_json`, `sqlx`) into
//! [`AppError`] before returning, so callers of [`crate::domain::storage::Storage`]
//! only ever match on the variants below.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The short key is already claimed by another record.
    #[error("short key `{key}` is already taken")]
    Conflict { key: String },

    #[error("short key `{key}` not found")]
    NotFound { key: String },

    /// The record exists but has been soft-deleted.
    #[error("short key `{key}` has been deleted")]
    Deleted { key: String },

    /// No user identity was bound to the request context.
    #[error("user identity is missing from the request context")]
    MissingUser,

    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed journal record at line {line}: {source}")]
    Journal {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Backend(String),

    #[error("storage backend is closed")]
    Closed,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("deletion queue is full")]
    QueueFull,

    #[error("deletion queue is closed")]
    QueueClosed,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Conflict { .. } => "conflict",
            AppError::NotFound { .. } => "not_found",
            AppError::Deleted { .. } => "deleted",
            AppError::MissingUser => "unauthorized",
            AppError::Timeout(_) => "timeout",
            AppError::Io(_) | AppError::Journal { .. } => "journal_error",
            AppError::Backend(_) => "database_error",
            AppError::Closed => "closed",
            AppError::Validation(_) => "validation_error",
            AppError::QueueFull => "queue_full",
            AppError::QueueClosed => "queue_closed",
        }
    }

    /// HTTP status an outer handler should answer with.
    ///
    /// Unknown keys map to `400 Bad Request` and deleted keys to `410 Gone`,
    /// which is what redirect clients of the service expect.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Conflict { .. } => 409,
            AppError::NotFound { .. } | AppError::Validation(_) => 400,
            AppError::Deleted { .. } => 410,
            AppError::MissingUser => 401,
            AppError::Timeout(_) | AppError::QueueFull => 503,
            _ => 500,
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Timeout(_) | AppError::Backend(_) | AppError::Io(_)
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict { .. })
    }
}
