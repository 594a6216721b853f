//! `disasterconnect-desktop`
//!
//! **Responsibility:** offline write path and sync engine for the desktop client.
//!
//! This crate provides:
//! - A durable FIFO of mutations made while offline
//! - Connectivity tracking with user-facing transition notices
//! - A drain pass that replays queued mutations with a retry ceiling
//! - A background worker that decides when to drain
//!
//! The hosted database stays the authority; the queue only defers writes.

pub mod app;
pub mod config;
pub mod mutation_queue;
pub mod notify;
pub mod offline;
pub mod remote;
pub mod status;
pub mod storage;
pub mod sync;
pub mod sync_engine;
pub mod sync_worker;
pub mod types;

#[cfg(test)]
mod test_support;

pub use app::{OfflineClient, WriteError, WriteOutcome};
pub use config::{ConfigError, SyncConfig};
pub use mutation_queue::{MutationQueue, QUEUE_STORAGE_KEY};
pub use notify::{BusSink, CacheInvalidator, Notifier};
pub use offline::{ConnectivityEvent, ConnectivityMonitor};
pub use remote::{Record, RemoteError, RemoteStore, RestRemoteStore};
pub use status::{SyncGuard, SyncStatus};
pub use storage::{InMemoryKeyValueStore, KeyValueStore, SqliteKeyValueStore, StorageError};
pub use sync::{ConnectivitySource, HttpHealthProbe, watch_connectivity};
pub use sync_engine::{MAX_RETRIES, SyncEngine};
pub use sync_worker::SyncWorker;
pub use types::{ConnectivityState, DrainReport};
