//! Sync engine: replays queued mutations against the remote store.
//!
//! A drain pass walks a snapshot of the queue in FIFO order and replays each
//! entry exactly once. Successes are dequeued, failures get their retry count
//! bumped, and entries that already reached the ceiling are dropped without
//! another attempt. At most one pass runs at a time, enforced through the
//! `is_syncing` claim on [`SyncStatus`].

use std::sync::Arc;

use chrono::Utc;
use disasterconnect_events::Severity;

use crate::mutation_queue::MutationQueue;
use crate::notify::{CacheInvalidator, Notifier};
use crate::remote::{self, RemoteStore};
use crate::status::SyncStatus;
use crate::types::DrainReport;

/// Failed attempts after which a queued mutation is abandoned.
pub const MAX_RETRIES: u32 = 3;

pub struct SyncEngine {
    queue: Arc<MutationQueue>,
    status: SyncStatus,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn CacheInvalidator>,
    notifier: Arc<dyn Notifier>,
    max_retries: u32,
}

impl SyncEngine {
    pub fn new(
        queue: Arc<MutationQueue>,
        status: SyncStatus,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn CacheInvalidator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            queue,
            status,
            remote,
            cache,
            notifier,
            max_retries: MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn queue(&self) -> &Arc<MutationQueue> {
        &self.queue
    }

    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    /// Run one drain pass if online, idle and there is work.
    ///
    /// Returns `None` when the pass was skipped.
    pub async fn try_drain(&self) -> Option<DrainReport> {
        if !self.status.is_online() {
            tracing::debug!("drain skipped: offline");
            return None;
        }
        if self.queue.is_empty().await {
            tracing::debug!("drain skipped: queue empty");
            return None;
        }
        let Some(_guard) = self.status.try_begin_sync() else {
            tracing::debug!("drain skipped: pass already running");
            return None;
        };

        Some(self.drain().await)
    }

    async fn drain(&self) -> DrainReport {
        let pending = self.queue.snapshot().await;
        tracing::info!(pending = pending.len(), "starting drain pass");

        let mut report = DrainReport::default();

        for entry in pending {
            if entry.is_exhausted(self.max_retries) {
                self.queue.dequeue(entry.id).await;
                report.failed += 1;
                report.dropped += 1;
                tracing::error!(
                    mutation_id = %entry.id,
                    table = %entry.table,
                    operation = %entry.operation(),
                    retries = entry.retries,
                    "dropping mutation after exhausting retries"
                );
                continue;
            }

            match remote::apply(self.remote.as_ref(), &entry.table, &entry.mutation).await {
                Ok(_) => {
                    self.queue.dequeue(entry.id).await;
                    report.succeeded += 1;
                    tracing::debug!(mutation_id = %entry.id, table = %entry.table, "replayed mutation");
                }
                Err(err) => {
                    let retries = self.queue.increment_retries(entry.id).await;
                    report.failed += 1;
                    tracing::warn!(
                        mutation_id = %entry.id,
                        table = %entry.table,
                        operation = %entry.operation(),
                        retries = ?retries,
                        error = %err,
                        "replay failed"
                    );
                }
            }
        }

        if report.succeeded > 0 {
            self.cache.invalidate_all();
            let now = Utc::now();
            self.queue.record_synced(now).await;
            self.status.record_synced(now);
            self.notifier.notify(
                Severity::Success,
                &format!("Synced {} offline change(s)", report.succeeded),
            );
        }

        if report.failed > 0 {
            self.notifier.notify(
                Severity::Error,
                &format!("{} change(s) failed to sync", report.failed),
            );
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            dropped = report.dropped,
            "drain pass finished"
        );

        report
    }
}

impl core::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("status", &self.status)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
