//! Directory domain model.
//!
//! # Responsibility
//! - Define the storage-row shapes read from and written to the store.
//! - Define the immutable response shapes handed to callers.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID.
//! - Storage rows and response records are distinct types connected by one
//!   explicit conversion step (see `service::aggregator`).
//! - Relations are id references resolved by lookup, never object links.

pub mod category;
pub mod location;
pub mod organization;
