//! Infrastructure layer implementing the storage contract.
//!
//! # Modules
//!
//! - [`persistence`] - Memory, journal and PostgreSQL backends, plus backend selection

pub mod persistence;
