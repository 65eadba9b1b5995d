//! Core domain entities.
//!
//! - [`UrlRecord`] - A persisted short key to URL mapping
//! - [`UserUrl`] - A record as listed for its owner

pub mod url_record;

pub use url_record::{UrlRecord, UserUrl};
