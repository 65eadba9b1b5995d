//! Storage backend implementations.
//!
//! Concrete implementations of [`crate::domain::storage::Storage`]:
//!
//! - [`MemoryStore`] - Process-lifetime map, no persistence
//! - [`JournalStore`] - Append-only JSON lines file replayed at startup
//! - [`PgStore`] - PostgreSQL table with a unique short key constraint
//!
//! [`StorageFactory`] picks one from [`StorageConfig`].

pub mod factory;
pub mod index;
pub mod journal_store;
pub mod memory_store;
pub mod pg_store;

pub use factory::{StorageConfig, StorageFactory};
pub use index::UrlIndex;
pub use journal_store::JournalStore;
pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
