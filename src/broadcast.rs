//! Activity fan-out registry.
//!
//! An explicit, injectable wrapper around a `tokio::sync::broadcast` channel.
//! Created once at startup and cloned into whatever needs to publish;
//! consumers call [`Broadcaster::subscribe`]. Delivery is at-most-once and
//! fire-and-forget: a notify with no subscribers (or a lagging receiver) is
//! never an error for the operation that triggered it.

use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::DomainEvent;

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<DomainEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Publish a single activity frame. Send errors (no subscribers) are
    /// ignored.
    pub fn notify(&self, category: &str, action: &str, data: serde_json::Value) {
        let _ = self.tx.send(DomainEvent::new(category, action, data));
    }

    /// Publish an ordered batch of domain events, as returned by the tracker
    /// and importer.
    pub fn dispatch(&self, events: &[DomainEvent]) {
        for event in events {
            let _ = self.tx.send(event.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Drop the sender side, closing every outstanding receiver.
    pub fn shutdown(self) {
        debug!(
            subscribers = self.subscriber_count(),
            "broadcast registry shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivers_to_subscriber() {
        let broadcaster = Broadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        broadcaster.notify("task_execution", "started", json!({"task_id": 1}));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.category, "task_execution");
        assert_eq!(event.action, "started");
        assert_eq!(event.data["task_id"], 1);
    }

    #[tokio::test]
    async fn dispatch_preserves_order() {
        let broadcaster = Broadcaster::new(16);
        let mut rx = broadcaster.subscribe();

        let events = vec![
            DomainEvent::new("session", "closed", json!({"id": "s1"})),
            DomainEvent::new("task_execution", "abandoned", json!({"execution_id": 7})),
        ];
        broadcaster.dispatch(&events);

        assert_eq!(rx.recv().await.unwrap().category, "session");
        assert_eq!(rx.recv().await.unwrap().action, "abandoned");
    }

    #[test]
    fn notify_without_subscribers_is_silent() {
        let broadcaster = Broadcaster::new(4);
        broadcaster.notify("session", "created", json!({}));
        assert_eq!(broadcaster.subscriber_count(), 0);
    }
}
