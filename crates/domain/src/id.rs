//! Identifiers: the composite universal device id and UUID-backed newtypes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::platform::Platform;

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Ties a [`CommandResult`](crate::command::CommandResult) to the
    /// state-change notification emitted for it.
    CorrelationId
);

define_id!(
    /// Unique identifier for a [`StateChangeNotification`](crate::event::StateChangeNotification).
    NotificationId
);

/// Composite identity of a device across every platform:
/// `"{platform}:{platform_device_id}"`.
///
/// Only the first colon separates the two segments; colons inside the
/// platform-specific segment are preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UniversalDeviceId {
    platform: Platform,
    platform_device_id: String,
}

impl UniversalDeviceId {
    /// Compose an id from its two segments.
    #[must_use]
    pub fn new(platform: Platform, platform_device_id: impl Into<String>) -> Self {
        Self {
            platform,
            platform_device_id: platform_device_id.into(),
        }
    }

    /// Parse `"{platform}:{platform_device_id}"`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::MalformedDeviceId`] when there is no colon or
    /// either segment is empty, and [`ValidationError::UnknownPlatform`] when
    /// the platform segment is not registered.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let (platform, device) = value
            .split_once(':')
            .ok_or_else(|| ValidationError::MalformedDeviceId(value.to_string()))?;
        if platform.is_empty() || device.is_empty() {
            return Err(ValidationError::MalformedDeviceId(value.to_string()));
        }
        Ok(Self {
            platform: platform.parse()?,
            platform_device_id: device.to_string(),
        })
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn platform_device_id(&self) -> &str {
        &self.platform_device_id
    }
}

impl fmt::Display for UniversalDeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.platform_device_id)
    }
}

impl FromStr for UniversalDeviceId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UniversalDeviceId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UniversalDeviceId> for String {
    fn from(id: UniversalDeviceId) -> Self {
        id.to_string()
    }
}
