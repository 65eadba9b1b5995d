//! Deletion request model for the asynchronous deletion queue.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// A request to soft-delete a set of short keys on behalf of their owner.
///
/// Created by the caller that accepted the delete (which answers the client
/// immediately), then consumed by
/// [`crate::domain::deletion_worker::run_deletion_worker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    pub user_id: String,
    pub keys: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

impl DeletionRequest {
    /// Creates a request. Duplicate keys are collapsed, order is preserved.
    pub fn new(user_id: impl Into<String>, keys: Vec<String>) -> Self {
        let mut seen = HashSet::with_capacity(keys.len());
        let unique = keys
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();

        Self {
            user_id: user_id.into(),
            keys: unique,
            requested_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Time spent between acceptance and now, in milliseconds.
    pub fn waited_ms(&self) -> i64 {
        (Utc::now() - self.requested_at).num_milliseconds().max(0)
    }
}
