//! Shared connectivity/sync state.
//!
//! [`SyncStatus`] wraps a `tokio::sync::watch` channel so every writer
//! (monitor, engine) and every observer (worker, UI) agrees on one value and
//! observers are woken on each change. The `is_syncing` claim is a single
//! check-and-set under the channel's lock, which is what keeps drain passes
//! exclusive on a multi-threaded runtime.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::types::ConnectivityState;

#[derive(Debug, Clone)]
pub struct SyncStatus {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl SyncStatus {
    pub fn new(is_online: bool, last_synced_at: Option<DateTime<Utc>>) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState {
            is_online,
            is_syncing: false,
            last_synced_at,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ConnectivityState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().is_online
    }

    pub fn is_syncing(&self) -> bool {
        self.tx.borrow().is_syncing
    }

    /// Returns whether the value actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_online == online {
                return false;
            }
            state.is_online = online;
            true
        })
    }

    /// Claim the drain flag. `None` if a pass already holds it; otherwise the
    /// flag is held until the returned guard is dropped.
    pub fn try_begin_sync(&self) -> Option<SyncGuard> {
        let claimed = self.tx.send_if_modified(|state| {
            if state.is_syncing {
                return false;
            }
            state.is_syncing = true;
            true
        });

        claimed.then(|| SyncGuard {
            status: self.clone(),
        })
    }

    pub fn record_synced(&self, at: DateTime<Utc>) {
        self.tx.send_modify(|state| state.last_synced_at = Some(at));
    }

    fn end_sync(&self) {
        self.tx.send_modify(|state| state.is_syncing = false);
    }
}

/// Holds `is_syncing = true`; releases it on drop, even when unwinding.
#[derive(Debug)]
#[must_use = "dropping the guard immediately ends the sync"]
pub struct SyncGuard {
    status: SyncStatus,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.status.end_sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_guard_at_a_time() {
        let status = SyncStatus::new(true, None);

        let guard = status.try_begin_sync().expect("first claim succeeds");
        assert!(status.is_syncing());
        assert!(status.try_begin_sync().is_none());

        drop(guard);
        assert!(!status.is_syncing());
        assert!(status.try_begin_sync().is_some());
    }

    #[test]
    fn set_online_reports_real_changes_only() {
        let status = SyncStatus::new(false, None);
        assert!(status.set_online(true));
        assert!(!status.set_online(true));
        assert!(status.is_online());
        assert!(status.set_online(false));
    }

    #[tokio::test]
    async fn observers_see_changes() {
        let status = SyncStatus::new(false, None);
        let mut rx = status.subscribe();

        status.set_online(true);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_online);

        let at = Utc::now();
        status.record_synced(at);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().last_synced_at, Some(at));
    }

    #[test]
    fn concurrent_claims_yield_exactly_one_winner() {
        let status = SyncStatus::new(true, None);
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let status = status.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    // Leak the guard so the flag stays claimed for the others.
                    status.try_begin_sync().map(std::mem::forget).is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
