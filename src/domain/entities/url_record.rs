//! URL record entity.

use uuid::Uuid;

/// A shortened URL as held by a storage backend.
///
/// Records are created by `set`/`set_batch` and only ever mutated by a
/// soft delete, which flips `deleted`. They are never physically removed,
/// so a deleted key stays claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    pub id: Uuid,
    pub short_key: String,
    pub original_url: String,
    pub owner_user_id: String,
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a live record with a fresh id.
    pub fn new(short_key: String, original_url: String, owner_user_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            short_key,
            original_url,
            owner_user_id,
            deleted: false,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id
    }

    /// Projection used by per-user listings.
    pub fn to_user_url(&self) -> UserUrl {
        UserUrl {
            short_key: self.short_key.clone(),
            original_url: self.original_url.clone(),
            deleted: self.deleted,
        }
    }
}

/// A record as returned by `get_by_user_id`.
///
/// Soft-deleted records are still listed for their owner; `deleted`
/// lets callers hide them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUrl {
    pub short_key: String,
    pub original_url: String,
    pub deleted: bool,
}
