//! Offline mode detection and state management.

use std::sync::Arc;

use disasterconnect_events::Severity;
use tokio::sync::mpsc;

use crate::notify::Notifier;
use crate::status::SyncStatus;

pub const BACK_ONLINE_MESSAGE: &str = "Back online. Syncing queued changes...";
pub const WENT_OFFLINE_MESSAGE: &str =
    "You are offline. Changes will be queued and synced when you reconnect.";

/// Host reachability transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Reachable,
    Unreachable,
}

impl From<bool> for ConnectivityEvent {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Reachable
        } else {
            Self::Unreachable
        }
    }
}

/// Mirrors host reachability into [`SyncStatus::is_online`] and tells the
/// user about each transition.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    status: SyncStatus,
    notifier: Arc<dyn Notifier>,
}

impl ConnectivityMonitor {
    pub fn new(status: SyncStatus, notifier: Arc<dyn Notifier>) -> Self {
        Self { status, notifier }
    }

    /// Seed `is_online` from the host's current status. Silent.
    pub fn activate(&self, initially_online: bool) {
        self.status.set_online(initially_online);
        tracing::info!(is_online = initially_online, "connectivity monitor activated");
    }

    /// Apply one host event. Every event produces a notification, repeated
    /// ones included.
    pub fn handle(&self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::Reachable => {
                self.status.set_online(true);
                tracing::info!("host reachable");
                self.notifier.notify(Severity::Success, BACK_ONLINE_MESSAGE);
            }
            ConnectivityEvent::Unreachable => {
                self.status.set_online(false);
                tracing::info!("host unreachable");
                self.notifier.notify(Severity::Warning, WENT_OFFLINE_MESSAGE);
            }
        }
    }

    /// Consume host events until the sender side goes away.
    pub async fn run(self, mut events: mpsc::Receiver<ConnectivityEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!("connectivity event stream closed");
    }

    pub fn is_online(&self) -> bool {
        self.status.is_online()
    }
}

impl core::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
