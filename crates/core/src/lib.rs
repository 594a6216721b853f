//! `disasterconnect-core`: data model for deferred writes.
//!
//! This crate contains **pure data** (no persistence, no network). The desktop
//! crate owns the queue store and the sync engine built on top of it.

pub mod error;
pub mod id;
pub mod mutation;

pub use error::{DomainError, DomainResult};
pub use id::MutationId;
pub use mutation::{Fields, Mutation, Operation, QueuedMutation, RECORD_ID_FIELD};
