//! Change notifications.
//!
//! Every mutation made through [`App`](crate::app::App) publishes a
//! [`ChangeEvent`]. Stores and other observers subscribe and re-fetch what
//! they hold instead of being pushed new data.

use tokio::sync::broadcast;
use tracing::trace;

/// Default channel capacity used by the binary.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// A saving was created, edited or deleted
    SavingsChanged,
    /// A goal was created, edited or deleted
    GoalsChanged,
    /// A category was created, deleted or synced
    CategoriesChanged,
    /// The entitlement state was refreshed
    EntitlementsChanged,
    /// The store was changed by something outside this process; refresh everything
    RemoteChange,
}

/// Broadcast bus fanning change events out to every subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Creates a bus keeping at most `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscriber is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        trace!("Publishing {event:?}");
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(ChangeEvent::GoalsChanged);

        assert_eq!(first.recv().await.unwrap(), ChangeEvent::GoalsChanged);
        assert_eq!(second.recv().await.unwrap(), ChangeEvent::GoalsChanged);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(ChangeEvent::SavingsChanged);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(1);
        let mut rx = bus.subscribe();

        bus.publish(ChangeEvent::SavingsChanged);
        bus.publish(ChangeEvent::GoalsChanged);

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap(), ChangeEvent::GoalsChanged);
    }
}
