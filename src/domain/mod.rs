//! Domain layer containing entities, the storage contract and the deletion
//! pipeline.
//!
//! # Architecture
//!
//! - [`entities`] - Stored records
//! - [`context`] - Caller identity passed into user-scoped operations
//! - [`storage`] - The contract every backend implements
//! - [`deletion_request`] - One user's batch of keys to delete
//! - [`deletion_worker`] - Bounded queue and background worker
//!
//! # Deletion Flow
//!
//! 1. A caller submits keys through [`deletion_worker::DeletionQueue::enqueue`]
//! 2. [`deletion_worker::run_deletion_worker`] takes requests in FIFO order
//! 3. Each request becomes one [`storage::Storage::delete_batch`] call, retried on transient errors

pub mod context;
pub mod deletion_request;
pub mod deletion_worker;
pub mod entities;
pub mod storage;
