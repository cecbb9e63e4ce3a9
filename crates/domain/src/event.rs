//! State-change notifications published by adapters.
//!
//! Delivery is at-most-once and nothing is persisted; a consumer that misses
//! a notification re-reads the device state.

use serde::{Deserialize, Serialize};

use crate::id::{CorrelationId, NotificationId, UniversalDeviceId};
use crate::state::{DeviceState, StateDiff};
use crate::time::{Timestamp, now};

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSource {
    /// Completion of a command issued through the adapter.
    Command,
    /// An event pushed by the platform.
    Push,
}

/// A device's state changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeNotification {
    pub id: NotificationId,
    pub device_id: UniversalDeviceId,
    pub timestamp: Timestamp,
    pub source: NotificationSource,
    /// Set when the change was caused by a command; matches
    /// [`CommandResult::correlation_id`](crate::command::CommandResult::correlation_id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    /// Best-effort changed-attribute diff.
    pub diff: StateDiff,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
}

impl StateChangeNotification {
    #[must_use]
    pub fn pushed(device_id: UniversalDeviceId, diff: StateDiff) -> Self {
        Self {
            id: NotificationId::new(),
            device_id,
            timestamp: now(),
            source: NotificationSource::Push,
            correlation_id: None,
            diff,
            state: None,
        }
    }

    #[must_use]
    pub fn from_command(
        device_id: UniversalDeviceId,
        correlation_id: CorrelationId,
        diff: StateDiff,
    ) -> Self {
        Self {
            source: NotificationSource::Command,
            correlation_id: Some(correlation_id),
            ..Self::pushed(device_id, diff)
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: DeviceState) -> Self {
        self.state = Some(state);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    #[test]
    fn should_tag_command_notifications_with_correlation_id() {
        let correlation = CorrelationId::new();
        let event = StateChangeNotification::from_command(
            UniversalDeviceId::new(Platform::Lutron, "2"),
            correlation,
            StateDiff::default(),
        );
        assert_eq!(event.source, NotificationSource::Command);
        assert_eq!(event.correlation_id, Some(correlation));
    }

    #[test]
    fn should_leave_push_notifications_uncorrelated() {
        let event = StateChangeNotification::pushed(
            UniversalDeviceId::new(Platform::Lutron, "2"),
            StateDiff::default(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "push");
        assert!(json.get("correlation_id").is_none());
    }
}
