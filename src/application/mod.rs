//! Application layer services.
//!
//! Services sit between an outer surface (HTTP handlers, the operator CLI)
//! and the [`crate::domain::storage::Storage`] contract.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerService`] - Shortening, resolution, listing and deletion

pub mod services;
