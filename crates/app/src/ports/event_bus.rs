//! Event bus port — publish state-change notifications.

use std::future::Future;

use omnihub_domain::error::DeviceError;
use omnihub_domain::event::StateChangeNotification;

/// Publishes state-change notifications to interested subscribers.
pub trait EventPublisher {
    /// Publish a notification to all current subscribers.
    fn publish(
        &self,
        notification: StateChangeNotification,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(
        &self,
        notification: StateChangeNotification,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        (**self).publish(notification)
    }
}
