//! Append-only journal storage backend.
//!
//! Every accepted write is appended to a file as one JSON object per line and
//! mirrored into an in-memory [`UrlIndex`]. On startup [`Storage::load`]
//! replays the file in order to rebuild the index.
//!
//! # Record format
//!
//! ```text
//! {"uuid":"6f1c…","short_url":"abc1234","original_url":"https://example.com","user_uuid":"u-1"}
//! {"uuid":"6f1c…","short_url":"abc1234","original_url":"https://example.com","user_uuid":"u-1","deleted":true}
//! ```
//!
//! The second line is a tombstone: it soft-deletes the record appended earlier
//! under the same key. Lines without `deleted` (or without `user_uuid`, as in
//! older journals) are plain inserts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::context::RequestContext;
use crate::domain::entities::{UrlRecord, UserUrl};
use crate::domain::storage::{Storage, StorageKind};
use crate::error::AppError;
use crate::infrastructure::persistence::index::UrlIndex;

#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry {
    uuid: Uuid,
    short_url: String,
    original_url: String,
    #[serde(default)]
    user_uuid: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    deleted: bool,
}

impl JournalEntry {
    fn insert(record: &UrlRecord) -> Self {
        Self {
            uuid: record.id,
            short_url: record.short_key.clone(),
            original_url: record.original_url.clone(),
            user_uuid: record.owner_user_id.clone(),
            deleted: false,
        }
    }

    fn tombstone(record: &UrlRecord) -> Self {
        Self {
            deleted: true,
            ..Self::insert(record)
        }
    }

    fn encode(&self) -> Result<String, AppError> {
        let mut line = serde_json::to_string(self).map_err(std::io::Error::from)?;
        line.push('\n');
        Ok(line)
    }
}

struct JournalState {
    index: UrlIndex,
    file: Option<File>,
    loaded: bool,
}

impl JournalState {
    /// Appends `bytes` as a whole or not at all.
    ///
    /// A failed write is cut back to the previous end of file. If that fails
    /// too the file handle is dropped and later writes return
    /// [`AppError::Closed`], so no record is ever appended after a fragment.
    async fn append(&mut self, bytes: &[u8]) -> Result<(), AppError> {
        let file = self.file.as_mut().ok_or(AppError::Closed)?;
        let end = file.metadata().await?.len();

        let written = match file.write_all(bytes).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        let Err(e) = written else {
            return Ok(());
        };

        match file.set_len(end).await {
            Ok(()) => tracing::warn!(error = %e, "Rolled back partial journal write"),
            Err(rollback) => {
                tracing::error!(
                    error = %e,
                    rollback_error = %rollback,
                    "Journal left with a partial record, refusing further writes"
                );
                self.file = None;
            }
        }
        Err(e.into())
    }

    fn replay(&mut self, entry: JournalEntry) {
        if entry.deleted {
            self.index.mark_deleted(&entry.short_url);
            return;
        }

        let record = UrlRecord {
            id: entry.uuid,
            short_key: entry.short_url,
            original_url: entry.original_url,
            owner_user_id: entry.user_uuid,
            deleted: false,
        };
        if let Err(e) = self.index.insert(record) {
            tracing::debug!(error = %e, "Skipping duplicate journal record");
        }
    }
}

/// Storage backed by an append-only file.
///
/// The file handle is owned exclusively by this instance; two stores must
/// not share one journal.
pub struct JournalStore {
    path: PathBuf,
    state: Mutex<JournalState>,
}

impl JournalStore {
    /// Opens the journal at `path`, creating it (and its parent directory) if absent.
    ///
    /// The file is not read until [`Storage::load`] is called.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            state: Mutex::new(JournalState {
                index: UrlIndex::new(),
                file: Some(file),
                loaded: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently indexed, deleted ones included.
    pub async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Storage for JournalStore {
    async fn load(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.loaded {
            tracing::debug!(path = %self.path.display(), "Journal already loaded");
            return Ok(());
        }

        let mut reader = BufReader::new(File::open(&self.path).await?);
        let mut line = Vec::new();
        let mut line_no = 0;
        let mut offset: u64 = 0;

        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                break;
            }
            line_no += 1;

            // only the last line of the file can lack its newline
            let terminated = line.last() == Some(&b'\n');
            if line.trim_ascii().is_empty() {
                offset += read as u64;
                continue;
            }

            match serde_json::from_slice::<JournalEntry>(&line) {
                Ok(entry) => {
                    state.replay(entry);
                    if !terminated {
                        tracing::warn!(
                            path = %self.path.display(),
                            line = line_no,
                            "Completing journal record missing its newline"
                        );
                        state.append(b"\n").await?;
                    }
                }
                // an undecodable final line without newline is an interrupted append
                Err(source) if !terminated => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = line_no,
                        error = %source,
                        "Discarding torn record at end of journal"
                    );
                    if let Some(file) = state.file.as_ref() {
                        file.set_len(offset).await?;
                    }
                    break;
                }
                Err(source) => {
                    return Err(AppError::Journal {
                        line: line_no,
                        source,
                    });
                }
            }
            offset += read as u64;
        }

        state.loaded = true;
        tracing::info!(
            path = %self.path.display(),
            records = state.index.len(),
            "Journal replayed"
        );
        Ok(())
    }

    async fn set(&self, ctx: &RequestContext, key: &str, value: &str) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;
        let mut state = self.state.lock().await;
        state.index.ensure_vacant(key)?;

        let record = UrlRecord::new(key.to_string(), value.to_string(), user_id.to_string());
        let line = JournalEntry::insert(&record).encode()?;
        state.append(line.as_bytes()).await?;
        state.index.insert(record)
    }

    async fn set_batch(
        &self,
        ctx: &RequestContext,
        items: BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        let user_id = ctx.user_id()?;
        let mut state = self.state.lock().await;
        let mut first_error = None;

        for (key, value) in items {
            if let Err(e) = state.index.ensure_vacant(&key) {
                tracing::debug!(error = %e, "Skipping batch item");
                first_error.get_or_insert(e);
                continue;
            }

            let record = UrlRecord::new(key, value, user_id.to_string());
            let line = JournalEntry::insert(&record).encode()?;
            state.append(line.as_bytes()).await?;
            state.index.insert(record)?;
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn get(&self, key: &str) -> Result<String, AppError> {
        self.state.lock().await.index.resolve(key)
    }

    async fn get_by_user_id(&self, ctx: &RequestContext) -> Result<Vec<UserUrl>, AppError> {
        let user_id = ctx.user_id()?;
        Ok(self.state.lock().await.index.by_user(user_id))
    }

    async fn delete_batch(&self, keys: &[String], user_id: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        let mut tombstones: Vec<JournalEntry> = Vec::new();
        for record in state.index.deletable(keys, user_id) {
            if !tombstones.iter().any(|t| t.short_url == record.short_key) {
                tombstones.push(JournalEntry::tombstone(record));
            }
        }
        if tombstones.is_empty() {
            return Ok(());
        }

        let mut buf = String::new();
        for tombstone in &tombstones {
            buf.push_str(&tombstone.encode()?);
        }
        state.append(buf.as_bytes()).await?;

        for tombstone in &tombstones {
            state.index.mark_deleted(&tombstone.short_url);
        }
        tracing::debug!(
            user_id,
            requested = keys.len(),
            deleted = tombstones.len(),
            "Soft-deleted keys"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if let Some(mut file) = state.file.take() {
            file.flush().await?;
            file.sync_all().await?;
            tracing::info!(path = %self.path.display(), "Journal closed");
        }
        Ok(())
    }

    fn kind(&self) -> StorageKind {
        StorageKind::Journal
    }

    fn supports_atomic_batch(&self) -> bool {
        false
    }

    fn supports_soft_delete(&self) -> bool {
        true
    }
}
