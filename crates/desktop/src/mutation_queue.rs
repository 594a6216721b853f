//! Durable FIFO of writes waiting to be replayed.
//!
//! `MutationQueue` is the single owner of queued mutations. UI code appends
//! through [`MutationQueue::enqueue`]; only the sync engine removes entries or
//! bumps their retry counters. Every change is written through to the
//! [`KeyValueStore`] as one JSON document under [`QUEUE_STORAGE_KEY`] while the
//! queue lock is held, so the persisted order always matches the in-memory
//! order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use disasterconnect_core::{Mutation, MutationId, QueuedMutation};
use tokio::sync::{Mutex, Notify};

use crate::storage::{KeyValueStore, StorageError};
use crate::types::PersistedQueue;

/// Storage key holding the serialized queue.
pub const QUEUE_STORAGE_KEY: &str = "offline-queue";

pub struct MutationQueue {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<PersistedQueue>,
    changed: Notify,
}

impl MutationQueue {
    /// Restore the queue persisted in `store`, or start empty.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        let state = match store.read(QUEUE_STORAGE_KEY).await? {
            Some(raw) => serde_json::from_str::<PersistedQueue>(&raw)?,
            None => PersistedQueue::default(),
        };

        tracing::info!(
            pending = state.queue.len(),
            last_synced_at = ?state.last_synced_at,
            "loaded offline queue"
        );

        Ok(Self {
            store,
            state: Mutex::new(state),
            changed: Notify::new(),
        })
    }

    /// Append a mutation for `table` and persist it before returning.
    ///
    /// If the write fails the append is rolled back, so the queue never holds
    /// an entry that a restart would lose.
    pub async fn enqueue(
        &self,
        table: impl Into<String>,
        mutation: Mutation,
    ) -> Result<QueuedMutation, StorageError> {
        let entry = QueuedMutation::new(table, mutation, Utc::now());

        let mut state = self.state.lock().await;
        state.queue.push(entry.clone());

        if let Err(err) = self.persist(&state).await {
            state.queue.pop();
            tracing::error!(error = %err, table = %entry.table, "failed to persist queued mutation");
            return Err(err);
        }
        let pending = state.queue.len();
        drop(state);

        tracing::info!(
            mutation_id = %entry.id,
            table = %entry.table,
            operation = %entry.operation(),
            pending,
            "queued offline mutation"
        );

        self.changed.notify_one();
        Ok(entry)
    }

    /// Remove the entry with `id`. Returns whether anything was removed;
    /// removing an absent id leaves the queue (and storage) untouched.
    pub async fn dequeue(&self, id: MutationId) -> bool {
        let mut state = self.state.lock().await;
        let before = state.queue.len();
        state.queue.retain(|m| m.id != id);

        if state.queue.len() == before {
            return false;
        }

        self.persist_or_log(&state, "dequeue").await;
        true
    }

    /// Add one failed attempt to the entry with `id`. Returns the new count,
    /// or `None` if the entry is gone.
    pub async fn increment_retries(&self, id: MutationId) -> Option<u32> {
        let mut state = self.state.lock().await;
        let entry = state.queue.iter_mut().find(|m| m.id == id)?;
        entry.retries = entry.retries.saturating_add(1);
        let retries = entry.retries;

        self.persist_or_log(&state, "increment_retries").await;
        Some(retries)
    }

    /// Drop every pending mutation. Returns how many were discarded.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let mut state = self.state.lock().await;
        let removed = std::mem::take(&mut state.queue);

        if let Err(err) = self.persist(&state).await {
            state.queue = removed;
            return Err(err);
        }

        tracing::warn!(discarded = removed.len(), "offline queue cleared");
        Ok(removed.len())
    }

    /// Current entries in insertion order.
    pub async fn snapshot(&self) -> Vec<QueuedMutation> {
        self.state.lock().await.queue.clone()
    }

    pub async fn get(&self, id: MutationId) -> Option<QueuedMutation> {
        self.state.lock().await.queue.iter().find(|m| m.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.queue.is_empty()
    }

    pub async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_synced_at
    }

    /// Remember when the last productive drain pass finished.
    pub async fn record_synced(&self, at: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.last_synced_at = Some(at);
        self.persist_or_log(&state, "record_synced").await;
    }

    /// Resolves after the next successful enqueue (or immediately if one
    /// happened since the last wait).
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    async fn persist(&self, state: &PersistedQueue) -> Result<(), StorageError> {
        let raw = serde_json::to_string(state)?;
        self.store.write(QUEUE_STORAGE_KEY, &raw).await
    }

    /// Used on the drain path, which must not fail: the in-memory change stands
    /// and the next successful write carries it to disk.
    async fn persist_or_log(&self, state: &PersistedQueue, op: &'static str) {
        if let Err(err) = self.persist(state).await {
            tracing::error!(error = %err, op, "failed to persist offline queue");
        }
    }
}

impl core::fmt::Debug for MutationQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MutationQueue").finish_non_exhaustive()
    }
}
