//! Messages the sync core publishes to the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// A user-facing, fire-and-forget message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            emitted_at: Utc::now(),
        }
    }
}

/// Everything the sync core tells the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Show a toast.
    Notification(Notification),
    /// Every cached query may be stale; refetch on next read.
    InvalidateAll,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_a_type_tag_for_the_webview() {
        let value = serde_json::to_value(ClientEvent::InvalidateAll).unwrap();
        assert_eq!(value, json!({ "type": "invalidate_all" }));

        let n = Notification::new(Severity::Success, "Synced 2 changes");
        let value = serde_json::to_value(ClientEvent::Notification(n)).unwrap();
        assert_eq!(value["type"], json!("notification"));
        assert_eq!(value["severity"], json!("success"));
        assert_eq!(value["message"], json!("Synced 2 changes"));
    }
}
