//! Event-driven communication system for inter-service messaging.

use anyhow::Result;
use tokio::sync::broadcast;

/// Application events for inter-service communication.
///
/// Events are published through the EventBus and consumed by interested
/// services. This enables loose coupling between components.
#[derive(Debug, Clone)]
pub enum Event {
    /// The BLE link was (re-)established.
    LinkUp,
    /// The BLE link dropped; carries the observed reason.
    LinkDown(String),
    /// An effect was started; carries the effect name.
    EffectStarted(String),
    /// The active effect was stopped or replaced.
    EffectStopped(String),
    SystemShutdown,
}

/// Event bus for publish-subscribe messaging between services.
///
/// Provides a centralized communication mechanism that allows services
/// to communicate without direct dependencies.
///
/// # Example
///
/// ```no_run
/// use bledomd::event::{Event, EventBus};
///
/// // Create event bus and subscriber
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// // Publish an event
/// event_bus.publish(Event::LinkUp);
///
/// // In async context, receive events:
/// // let event = subscriber.recv().await;
/// ```
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new EventBus with default capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.sender.send(event)?;
        Ok(())
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each subscriber receives all events published after subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::{Duration, sleep};

    #[test]
    fn event_bus_clone_creates_shared_channel() {
        let event_bus1 = EventBus::new();
        let event_bus2 = event_bus1.clone();

        let _receiver1 = event_bus1.subscribe();
        let _receiver2 = event_bus2.subscribe();

        // Both should share the same sender
        assert_eq!(event_bus1.sender.receiver_count(), 2);
        assert_eq!(event_bus2.sender.receiver_count(), 2);
    }

    #[tokio::test]
    async fn publish_and_subscribe_basic_event() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        event_bus.publish(Event::SystemShutdown).unwrap();

        let received_event = receiver.recv().await.unwrap();
        match received_event {
            Event::SystemShutdown => {} // Expected
            _ => panic!("Expected SystemShutdown event"),
        }
    }

    #[tokio::test]
    async fn link_events_carry_payload() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        event_bus
            .publish(Event::LinkDown("keepalive failed".to_string()))
            .unwrap();
        event_bus.publish(Event::LinkUp).unwrap();

        match receiver.recv().await.unwrap() {
            Event::LinkDown(reason) => assert_eq!(reason, "keepalive failed"),
            _ => panic!("Expected LinkDown event"),
        }
        match receiver.recv().await.unwrap() {
            Event::LinkUp => {}
            _ => panic!("Expected LinkUp event"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let event_bus = EventBus::new();
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        event_bus
            .publish(Event::EffectStarted("rainbow".to_string()))
            .unwrap();

        let event1 = receiver1.recv().await.unwrap();
        let event2 = receiver2.recv().await.unwrap();

        match (event1, event2) {
            (Event::EffectStarted(a), Event::EffectStarted(b)) => {
                assert_eq!(a, "rainbow");
                assert_eq!(b, "rainbow");
            }
            _ => panic!("All receivers should receive EffectStarted"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_returns_error() {
        let event_bus = EventBus::new();

        // Publishing without any subscribers should return an error
        let result = event_bus.publish(Event::LinkUp);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn sequential_events_received_in_order() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();

        event_bus
            .publish(Event::EffectStarted("fire".to_string()))
            .unwrap();
        event_bus
            .publish(Event::EffectStopped("fire".to_string()))
            .unwrap();
        event_bus.publish(Event::SystemShutdown).unwrap();

        let event1 = receiver.recv().await.unwrap();
        let event2 = receiver.recv().await.unwrap();
        let event3 = receiver.recv().await.unwrap();

        match (event1, event2, event3) {
            (Event::EffectStarted(_), Event::EffectStopped(_), Event::SystemShutdown) => {}
            _ => panic!("Events should be received in publication order"),
        }
    }

    #[tokio::test]
    async fn event_bus_works_across_async_tasks() {
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();
        let publisher_bus = event_bus.clone();

        let publisher_handle = tokio::spawn(async move {
            sleep(Duration::from_millis(10)).await;
            publisher_bus.publish(Event::SystemShutdown).unwrap();
        });

        let receiver_handle = tokio::spawn(async move { receiver.recv().await.unwrap() });

        publisher_handle.await.unwrap();
        let received_event = receiver_handle.await.unwrap();

        match received_event {
            Event::SystemShutdown => {}
            _ => panic!("Expected SystemShutdown event from async task"),
        }
    }
}
