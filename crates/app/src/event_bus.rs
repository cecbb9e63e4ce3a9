//! In-process notification bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use omnihub_domain::error::DeviceError;
use omnihub_domain::event::StateChangeNotification;

use crate::ports::EventPublisher;

/// Default number of buffered notifications per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// In-process notification bus using a tokio [`broadcast`] channel.
///
/// Delivery is at-most-once: publishing succeeds even when there are no
/// active subscribers (the notification is simply dropped), and a lagging
/// subscriber loses the oldest notifications.
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<StateChangeNotification>,
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl InProcessEventBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to notifications on this bus.
    ///
    /// Returns a receiver that will get all notifications published *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateChangeNotification> {
        self.sender.subscribe()
    }

    /// Synchronous publish for background tasks that are not async-aware.
    pub fn send(&self, notification: StateChangeNotification) {
        // Fails only when there are zero receivers.
        let _ = self.sender.send(notification);
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(
        &self,
        notification: StateChangeNotification,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        self.send(notification);
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use omnihub_domain::id::UniversalDeviceId;
    use omnihub_domain::platform::Platform;
    use omnihub_domain::state::StateDiff;

    use super::*;

    fn notification() -> StateChangeNotification {
        StateChangeNotification::pushed(
            UniversalDeviceId::new(Platform::Lutron, "5"),
            StateDiff::default(),
        )
    }

    #[tokio::test]
    async fn should_deliver_notification_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = notification();
        let id = event.id;
        bus.publish(event).await.unwrap();

        assert_eq!(rx1.recv().await.unwrap().id, id);
        assert_eq!(rx2.recv().await.unwrap().id, id);
    }

    #[tokio::test]
    async fn should_succeed_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        assert!(bus.publish(notification()).await.is_ok());
    }

    #[tokio::test]
    async fn should_not_deliver_notifications_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.send(notification());

        let mut rx = bus.subscribe();
        let later = notification();
        let later_id = later.id;
        bus.send(later);

        assert_eq!(rx.recv().await.unwrap().id, later_id);
    }
}
