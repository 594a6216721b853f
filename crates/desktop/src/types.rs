//! Shared types for the sync core.

use chrono::{DateTime, Utc};
use disasterconnect_core::QueuedMutation;
use serde::{Deserialize, Serialize};

/// Process-wide connectivity/sync state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    /// Last reachability reported by the host.
    pub is_online: bool,
    /// A drain pass is running.
    pub is_syncing: bool,
    /// End of the last pass that replayed at least one mutation.
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// What the queue store writes under its storage key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedQueue {
    #[serde(default)]
    pub queue: Vec<QueuedMutation>,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Mutations replayed and removed.
    pub succeeded: usize,
    /// Mutations that failed this pass, including the ones dropped at the ceiling.
    pub failed: usize,
    /// Subset of `failed` that was abandoned without a replay attempt.
    pub dropped: usize,
}
