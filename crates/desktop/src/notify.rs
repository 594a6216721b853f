//! Outbound signals from the sync core: user notifications and cache
//! invalidation.

use disasterconnect_events::{ClientEvent, EventBus, Notification, Severity};

/// Fire-and-forget, user-visible messages.
pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, message: &str);
}

/// Tells dependent read caches that everything may be stale.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate_all(&self);
}

/// Publishes notifications and invalidations as [`ClientEvent`]s on a bus.
///
/// A failed publish is logged and swallowed.
#[derive(Debug)]
pub struct BusSink<B> {
    bus: B,
}

impl<B> BusSink<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

impl<B> BusSink<B>
where
    B: EventBus<ClientEvent>,
{
    fn publish(&self, event: ClientEvent) {
        if let Err(err) = self.bus.publish(event) {
            tracing::warn!(error = ?err, "failed to publish client event");
        }
    }
}

impl<B> Notifier for BusSink<B>
where
    B: EventBus<ClientEvent>,
{
    fn notify(&self, severity: Severity, message: &str) {
        self.publish(ClientEvent::Notification(Notification::new(severity, message)));
    }
}

impl<B> CacheInvalidator for BusSink<B>
where
    B: EventBus<ClientEvent>,
{
    fn invalidate_all(&self) {
        self.publish(ClientEvent::InvalidateAll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use disasterconnect_events::InMemoryEventBus;
    use std::sync::Arc;

    #[test]
    fn sink_publishes_both_kinds_of_event() {
        let bus = Arc::new(InMemoryEventBus::<ClientEvent>::new());
        let subscription = bus.subscribe();
        let sink = BusSink::new(bus.clone());

        sink.notify(Severity::Warning, "offline");
        sink.invalidate_all();

        let events = subscription.drain();
        assert_eq!(events.len(), 2);
        match &events[0] {
            ClientEvent::Notification(n) => {
                assert_eq!(n.severity, Severity::Warning);
                assert_eq!(n.message, "offline");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[1], ClientEvent::InvalidateAll);
    }
}
