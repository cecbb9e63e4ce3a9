//! Adapter health records.

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::time::{Timestamp, now};

/// Result of a lightweight round-trip check against a platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub platform: Platform,
    pub healthy: bool,
    pub reachable: bool,
    pub authenticated: bool,
    /// Consecutive failed operations since the last success.
    pub error_count: u32,
    pub last_success: Option<Timestamp>,
    pub checked_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HealthStatus {
    /// A status for an adapter that answered and accepted its credentials.
    #[must_use]
    pub fn healthy(platform: Platform) -> Self {
        Self {
            platform,
            healthy: true,
            reachable: true,
            authenticated: true,
            error_count: 0,
            last_success: None,
            checked_at: now(),
            message: None,
        }
    }

    #[must_use]
    pub fn unhealthy(platform: Platform, reachable: bool, authenticated: bool) -> Self {
        Self {
            healthy: false,
            reachable,
            authenticated,
            ..Self::healthy(platform)
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, error_count: u32, last_success: Option<Timestamp>) -> Self {
        self.error_count = error_count;
        self.last_success = last_success;
        self
    }
}
