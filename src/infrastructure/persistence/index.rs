//! In-memory record index shared by the memory and journal backends.

use std::collections::HashMap;

use crate::domain::entities::{UrlRecord, UserUrl};
use crate::error::AppError;

/// Records keyed by short key, plus the per-owner index of keys in
/// creation order.
///
/// `user_links` is append-only: soft-deleting a record leaves its key
/// listed for the owner.
#[derive(Debug, Default)]
pub struct UrlIndex {
    records: HashMap<String, UrlRecord>,
    user_links: HashMap<String, Vec<String>>,
}

impl UrlIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Checks that `key` is free without inserting anything.
    pub fn ensure_vacant(&self, key: &str) -> Result<(), AppError> {
        if self.contains(key) {
            return Err(AppError::Conflict {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Inserts `record` and links it to its owner.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the key is already present, live or deleted.
    pub fn insert(&mut self, record: UrlRecord) -> Result<(), AppError> {
        self.ensure_vacant(&record.short_key)?;

        self.user_links
            .entry(record.owner_user_id.clone())
            .or_default()
            .push(record.short_key.clone());
        self.records.insert(record.short_key.clone(), record);
        Ok(())
    }

    pub fn record(&self, key: &str) -> Option<&UrlRecord> {
        self.records.get(key)
    }

    /// Resolves a key the way `Storage::get` does.
    pub fn resolve(&self, key: &str) -> Result<String, AppError> {
        match self.records.get(key) {
            None => Err(AppError::NotFound {
                key: key.to_string(),
            }),
            Some(record) if record.deleted => Err(AppError::Deleted {
                key: key.to_string(),
            }),
            Some(record) => Ok(record.original_url.clone()),
        }
    }

    pub fn by_user(&self, user_id: &str) -> Vec<UserUrl> {
        self.user_links
            .get(user_id)
            .map(|keys| {
                keys.iter()
                    .filter_map(|key| self.records.get(key))
                    .map(UrlRecord::to_user_url)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the live records among `keys` owned by `user_id`.
    pub fn deletable<'a>(
        &'a self,
        keys: &'a [String],
        user_id: &'a str,
    ) -> impl Iterator<Item = &'a UrlRecord> + 'a {
        keys.iter()
            .filter_map(|key| self.records.get(key))
            .filter(move |record| record.is_owned_by(user_id) && !record.deleted)
    }

    /// Flags `key` as deleted. Returns false if it was absent or already deleted.
    pub fn mark_deleted(&mut self, key: &str) -> bool {
        match self.records.get_mut(key) {
            Some(record) if !record.deleted => {
                record.deleted = true;
                true
            }
            _ => false,
        }
    }
}
