//! Background worker that drives drain passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sync_engine::SyncEngine;

/// Re-evaluates the drain trigger at start, when connectivity comes back,
/// after each enqueue and on every `retry_interval` tick.
///
/// A pass finishing (`is_syncing` going false) is only a trigger when one of
/// those wakes found work but lost the claim to a pass started elsewhere.
/// Entries that keep failing wait for the next event instead of spinning.
pub struct SyncWorker {
    engine: Arc<SyncEngine>,
    retry_interval: Duration,
    shutdown: Arc<Notify>,
}

impl SyncWorker {
    pub fn new(engine: Arc<SyncEngine>, retry_interval: Duration) -> Self {
        Self {
            engine,
            retry_interval,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Notify this handle to stop the worker. A signal sent before the
    /// worker reaches its next wait is not lost.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Request graceful shutdown of the worker.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Start the background sync worker.
    pub fn start(self) -> JoinHandle<()> {
        let Self {
            engine,
            retry_interval,
            shutdown,
        } = self;

        tokio::spawn(async move {
            tracing::info!(retry_interval = ?retry_interval, "background sync worker started");

            let mut status_rx = engine.status().subscribe();
            let mut was_online = status_rx.borrow_and_update().is_online;
            // A wake that found work while another pass held the claim.
            let mut deferred = false;

            // First tick completes immediately, which covers the drain at start.
            let mut ticker = tokio::time::interval(retry_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        tracing::info!("background sync worker received shutdown signal");
                        break;
                    }
                    changed = status_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let (is_online, is_syncing) = {
                            let state = status_rx.borrow_and_update();
                            (state.is_online, state.is_syncing)
                        };
                        let came_online = is_online && !was_online;
                        was_online = is_online;

                        if came_online {
                            tracing::debug!("connectivity restored, evaluating drain");
                            deferred = Self::evaluate(&engine).await;
                        } else if deferred && !is_syncing {
                            tracing::debug!("claim released, evaluating deferred drain");
                            deferred = Self::evaluate(&engine).await;
                        }
                    }
                    _ = engine.queue().changed() => {
                        deferred = Self::evaluate(&engine).await;
                    }
                    _ = ticker.tick() => {
                        deferred = Self::evaluate(&engine).await;
                    }
                }
            }

            tracing::info!("background sync worker stopped");
        })
    }

    /// Try a pass. Returns true when work is pending, the host is online and
    /// the pass was still refused, which means another pass holds the claim.
    async fn evaluate(engine: &SyncEngine) -> bool {
        engine.try_drain().await.is_none()
            && engine.status().is_online()
            && !engine.queue().is_empty().await
    }
}

impl core::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("retry_interval", &self.retry_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation_queue::MutationQueue;
    use crate::status::SyncStatus;
    use crate::storage::InMemoryKeyValueStore;
    use crate::test_support::{RecordingSink, ScriptedRemote};
    use disasterconnect_core::Mutation;

    const LONG: Duration = Duration::from_secs(3600);

    async fn engine(remote: ScriptedRemote, online: bool) -> (Arc<SyncEngine>, Arc<ScriptedRemote>) {
        let store = Arc::new(InMemoryKeyValueStore::new());
        let queue = Arc::new(MutationQueue::load(store).await.unwrap());
        let remote = Arc::new(remote);
        let sink = Arc::new(RecordingSink::new());
        let engine = SyncEngine::new(
            queue,
            SyncStatus::new(online, None),
            remote.clone(),
            sink.clone(),
            sink,
        );
        (Arc::new(engine), remote)
    }

    async fn until_empty(engine: &SyncEngine) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !engine.queue().is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue was not drained");
    }

    #[tokio::test]
    async fn drains_pending_work_at_start() {
        let (engine, remote) = engine(ScriptedRemote::new(), true).await;
        engine.queue().enqueue("tasks", Mutation::delete("a")).await.unwrap();

        let worker = SyncWorker::new(engine.clone(), LONG);
        let shutdown = worker.shutdown_handle();
        let handle = worker.start();

        until_empty(&engine).await;
        assert_eq!(remote.calls().len(), 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn coming_online_triggers_a_pass() {
        let (engine, remote) = engine(ScriptedRemote::new(), false).await;
        engine.queue().enqueue("tasks", Mutation::delete("a")).await.unwrap();

        let worker = SyncWorker::new(engine.clone(), LONG);
        let shutdown = worker.shutdown_handle();
        let handle = worker.start();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.queue().len().await, 1);

        engine.status().set_online(true);
        until_empty(&engine).await;
        assert_eq!(remote.calls().len(), 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_while_online_triggers_a_pass() {
        let (engine, _) = engine(ScriptedRemote::new(), true).await;

        let worker = SyncWorker::new(engine.clone(), LONG);
        let shutdown = worker.shutdown_handle();
        let handle = worker.start();

        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.queue().enqueue("tasks", Mutation::delete("a")).await.unwrap();
        until_empty(&engine).await;

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn failures_are_not_retried_in_a_tight_loop() {
        let (engine, remote) = engine(ScriptedRemote::failing_on(&["locked"]), true).await;

        let worker = SyncWorker::new(engine.clone(), LONG);
        let shutdown = worker.shutdown_handle();
        let handle = worker.start();
        // Let the start-up tick pass on an empty queue.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let entry = engine.queue().enqueue("locked", Mutation::delete("a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(remote.calls().len(), 1);
        assert_eq!(engine.queue().get(entry.id).await.unwrap().retries, 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn retry_tick_picks_up_failed_entries() {
        let (engine, remote) = engine(ScriptedRemote::failing_on(&["locked"]), true).await;
        let entry = engine.queue().enqueue("locked", Mutation::delete("a")).await.unwrap();

        let worker = SyncWorker::new(engine.clone(), Duration::from_millis(20));
        let shutdown = worker.shutdown_handle();
        let handle = worker.start();

        tokio::time::timeout(Duration::from_secs(2), async {
            while engine.queue().get(entry.id).await.is_some() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("entry should hit the ceiling and be dropped");
        assert_eq!(remote.calls().len(), 3);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn enqueue_during_a_foreign_pass_drains_once_it_ends() {
        let (engine, remote) = engine(ScriptedRemote::new(), true).await;

        let worker = SyncWorker::new(engine.clone(), LONG);
        let shutdown = worker.shutdown_handle();
        let handle = worker.start();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let guard = engine.status().try_begin_sync().unwrap();
        engine.queue().enqueue("tasks", Mutation::delete("a")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(engine.queue().len().await, 1);
        assert!(remote.calls().is_empty());

        drop(guard);
        until_empty(&engine).await;
        assert_eq!(remote.calls().len(), 1);

        shutdown.notify_one();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_before_start_is_honoured() {
        let (engine, _) = engine(ScriptedRemote::new(), false).await;
        let worker = SyncWorker::new(engine, LONG);
        worker.shutdown();

        tokio::time::timeout(Duration::from_secs(1), worker.start())
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
