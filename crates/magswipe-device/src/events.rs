//! Broadcast event stream for reader activity.
//!
//! Every consumer that calls [`EventBus::subscribe`] gets its own receiver
//! and sees every event published after that point. Publishing never blocks
//! and never waits on consumers: a receiver that falls more than the bus
//! capacity behind loses the oldest events and observes a lag marker on its
//! next `recv`.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use magswipe_core::{DeviceDescriptor, Error, ErrorKind};
use magswipe_decode::CardRecord;

/// An event observed on a connected reader.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReaderEvent {
    /// A card was swiped and at least one track span was located.
    CardSwipe(CardRecord),
    /// A device finished connecting and is being monitored.
    DeviceConnected(DeviceDescriptor),
    /// An operational error, classified for consumers.
    Error { kind: ErrorKind, message: String },
}

/// Fan-out channel for [`ReaderEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
}

impl EventBus {
    /// Create a bus retaining at most `capacity` undelivered events per
    /// receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all current subscribers. A bus with no
    /// subscribers silently drops the event.
    pub fn publish(&self, event: ReaderEvent) {
        if self.tx.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }

    /// Publish an error, classified through [`Error::kind`].
    pub fn publish_error(&self, error: &Error) {
        self.publish(ReaderEvent::Error {
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use magswipe_core::Error;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.publish_error(&Error::device_busy("mock/0"));

        let event = rx.recv().await.unwrap();
        let ReaderEvent::Error { kind, .. } = event else {
            panic!("expected error event");
        };
        assert_eq!(kind, ErrorKind::DeviceBusy);
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(8);
        bus.publish_error(&Error::disconnected("nobody listening"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest_events() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe();

        for n in 0..3 {
            bus.publish_error(&Error::communication(format!("event {n}")));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
        let ReaderEvent::Error { message, .. } = rx.recv().await.unwrap() else {
            panic!("expected error event");
        };
        assert!(message.contains("event 2"));
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = ReaderEvent::Error {
            kind: ErrorKind::Timeout,
            message: "read timed out".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error");
        assert_eq!(json["kind"], "timeout");
    }
}
