//! Utility functions shared by the storage backends and services.
//!
//! - [`key_deriver`] - Content-addressed short key derivation
//! - [`db_error`] - Classification of PostgreSQL errors

pub mod db_error;
pub mod key_deriver;
