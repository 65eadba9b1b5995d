#![allow(dead_code)]

use std::path::Path;

use url_shortener_store::domain::context::RequestContext;
use url_shortener_store::domain::storage::Storage;
use url_shortener_store::infrastructure::persistence::JournalStore;

pub const USER_A: &str = "user-a";
pub const USER_B: &str = "user-b";

pub fn user(id: &str) -> RequestContext {
    RequestContext::for_user(id)
}

/// Opens and loads the journal at `path`.
pub async fn open_journal(path: &Path) -> JournalStore {
    let store = JournalStore::open(path).await.unwrap();
    store.load().await.unwrap();
    store
}

/// Reopens a journal the way a restarted process would.
pub async fn reopen_journal(store: JournalStore) -> JournalStore {
    let path = store.path().to_path_buf();
    store.close().await.unwrap();
    open_journal(&path).await
}

pub fn keys(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}
