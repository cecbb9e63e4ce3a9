//! Locations, rooms and scenes — the spatial and grouping structure a
//! platform exposes around its devices.

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, ValidationError};
use crate::platform::Platform;
use crate::time::{Timestamp, now};

/// A site (home, office) on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

/// A room inside a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    pub location_id: Option<String>,
}

impl Room {
    /// Create a builder for constructing a [`Room`].
    #[must_use]
    pub fn builder(platform: Platform) -> RoomBuilder {
        RoomBuilder {
            platform,
            id: None,
            name: None,
            location_id: None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when `name` is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Room`].
#[derive(Debug)]
pub struct RoomBuilder {
    platform: Platform,
    id: Option<String>,
    name: Option<String>,
    location_id: Option<String>,
}

impl RoomBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn location_id(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Consume the builder, validate, and return a [`Room`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] if `name` is missing or empty.
    pub fn build(self) -> Result<Room, ValidationError> {
        let room = Room {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            platform: self.platform,
            location_id: self.location_id,
        };
        room.validate()?;
        Ok(room)
    }
}

/// A platform-defined group of device settings that can be applied at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub platform: Platform,
    pub location_id: Option<String>,
}

/// Outcome of executing a scene.
#[derive(Debug, Clone, Serialize)]
pub struct SceneResult {
    pub scene_id: String,
    pub success: bool,
    pub executed_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceError>,
}

impl SceneResult {
    #[must_use]
    pub fn succeeded(scene_id: impl Into<String>) -> Self {
        Self {
            scene_id: scene_id.into(),
            success: true,
            executed_at: now(),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(scene_id: impl Into<String>, error: DeviceError) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::succeeded(scene_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_build_valid_room_when_name_provided() {
        let room = Room::builder(Platform::Lutron)
            .id("4")
            .name("Living Room")
            .location_id("bridge")
            .build()
            .unwrap();
        assert_eq!(room.name, "Living Room");
        assert_eq!(room.location_id.as_deref(), Some("bridge"));
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Room::builder(Platform::SmartThings).id("1").build();
        assert_eq!(result, Err(ValidationError::EmptyName));
    }

    #[test]
    fn should_roundtrip_room_through_serde_json() {
        let room = Room::builder(Platform::SmartThings)
            .id("r")
            .name("Kitchen")
            .build()
            .unwrap();
        let json = serde_json::to_string(&room).unwrap();
        let parsed: Room = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, room);
    }

    #[test]
    fn should_record_error_on_failed_scene() {
        let result = SceneResult::failed("s1", DeviceError::not_supported("no scenes"));
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
