//! Application state shared by the UI layer.

use std::sync::Arc;
use std::time::Duration;

use disasterconnect_core::{DomainError, Fields, Mutation, Operation, QueuedMutation};

use crate::mutation_queue::MutationQueue;
use crate::notify::{CacheInvalidator, Notifier};
use crate::offline::ConnectivityMonitor;
use crate::remote::{self, Record, RemoteError, RemoteStore};
use crate::status::SyncStatus;
use crate::storage::StorageError;
use crate::sync_engine::SyncEngine;
use crate::sync_worker::SyncWorker;
use crate::types::{ConnectivityState, DrainReport};

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Where a write ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Sent straight to the remote store; carries the returned row, if any.
    Applied(Option<Record>),
    /// Stored locally for a later drain pass.
    Queued(QueuedMutation),
}

/// Owns the offline queue, the shared status and the sync engine, with every
/// collaborator injected by the application root.
#[derive(Clone)]
pub struct OfflineClient {
    engine: Arc<SyncEngine>,
    notifier: Arc<dyn Notifier>,
}

impl OfflineClient {
    /// Status starts offline until the host reports otherwise
    /// (see [`ConnectivityMonitor::activate`]).
    pub async fn new(
        queue: Arc<MutationQueue>,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn CacheInvalidator>,
        notifier: Arc<dyn Notifier>,
        max_retries: u32,
    ) -> Self {
        let status = SyncStatus::new(false, queue.last_synced_at().await);
        let engine = SyncEngine::new(queue, status, remote, cache, notifier.clone())
            .with_max_retries(max_retries);

        Self {
            engine: Arc::new(engine),
            notifier,
        }
    }

    /// Apply a write now if online with nothing ahead of it, otherwise queue it.
    ///
    /// A write made while entries are pending or a pass is running goes to the
    /// back of the queue so it cannot overtake them. Direct-path failures are
    /// returned to the caller, not queued.
    pub async fn write(
        &self,
        table: &str,
        mutation: Mutation,
    ) -> Result<WriteOutcome, WriteError> {
        if self.can_apply_directly().await {
            let record = remote::apply(self.engine.remote(), table, &mutation).await?;
            return Ok(WriteOutcome::Applied(record));
        }

        let entry = self.engine.queue().enqueue(table, mutation).await?;
        Ok(WriteOutcome::Queued(entry))
    }

    async fn can_apply_directly(&self) -> bool {
        let status = self.engine.status();
        status.is_online() && !status.is_syncing() && self.engine.queue().is_empty().await
    }

    /// [`OfflineClient::write`] for an untyped `(operation, payload)` pair.
    pub async fn write_payload(
        &self,
        table: &str,
        operation: Operation,
        payload: Fields,
    ) -> Result<WriteOutcome, WriteError> {
        let mutation = Mutation::from_payload(operation, payload)?;
        self.write(table, mutation).await
    }

    /// Manual drain. `None` if offline, idle-with-nothing-to-do or busy.
    pub async fn sync_now(&self) -> Option<DrainReport> {
        self.engine.try_drain().await
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.engine.status().snapshot()
    }

    pub async fn pending(&self) -> Vec<QueuedMutation> {
        self.engine.queue().snapshot().await
    }

    pub async fn clear_queue(&self) -> Result<usize, StorageError> {
        self.engine.queue().clear().await
    }

    pub fn monitor(&self) -> ConnectivityMonitor {
        ConnectivityMonitor::new(self.engine.status().clone(), self.notifier.clone())
    }

    pub fn worker(&self, retry_interval: Duration) -> SyncWorker {
        SyncWorker::new(self.engine.clone(), retry_interval)
    }
}

impl core::fmt::Debug for OfflineClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OfflineClient")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
