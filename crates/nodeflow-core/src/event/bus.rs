//! Broadcast event bus for execution events.
//!
//! Built on `tokio::sync::broadcast`. Every run publishes onto the same
//! bus; subscribers filter by `execution_id`. Publishing with no active
//! subscribers is a no-op.

use nodeflow_types::event::{EventEnvelope, ExecutionEvent};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Multi-consumer bus for execution lifecycle events.
///
/// Cloning the bus clones the sender, so the engine, the HTTP layer and
/// tests can all hold one.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new subscriber that will receive all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Stamp `event` with the run id and current time, then broadcast it.
    ///
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, execution_id: Uuid, event: ExecutionEvent) {
        let _ = self.sender.send(EventEnvelope::new(execution_id, event));
    }

    /// Access the underlying broadcast sender.
    pub fn sender(&self) -> &broadcast::Sender<EventEnvelope> {
        &self.sender
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_subscribe_delivers_envelope() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let execution_id = Uuid::now_v7();

        bus.publish(execution_id, ExecutionEvent::ExecutionCompleted);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.execution_id, execution_id);
        assert_eq!(received.event, ExecutionEvent::ExecutionCompleted);
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(
            Uuid::now_v7(),
            ExecutionEvent::NodeStarted {
                node_id: "n1".to_string(),
            },
        );

        assert!(matches!(
            rx1.recv().await.unwrap().event,
            ExecutionEvent::NodeStarted { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap().event,
            ExecutionEvent::NodeStarted { .. }
        ));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.publish(Uuid::now_v7(), ExecutionEvent::ExecutionCompleted);
    }

    #[test]
    fn lagged_receiver_reports_lag() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.publish(
                Uuid::now_v7(),
                ExecutionEvent::NodeStarted {
                    node_id: format!("n{i}"),
                },
            );
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }

    #[test]
    fn clone_shares_channel() {
        let bus = EventBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(Uuid::now_v7(), ExecutionEvent::ExecutionCompleted);
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn debug_shows_receivers() {
        let bus = EventBus::new(16);
        let _rx = bus.subscribe();
        let debug = format!("{bus:?}");
        assert!(debug.contains("receiver_count: 1"));
    }
}
