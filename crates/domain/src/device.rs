//! Unified device — a platform-agnostic snapshot of one physical device.
//!
//! Devices are rebuilt on every discovery call from live or cached platform
//! data. Identity and capability set are fixed per snapshot; everything else
//! is display metadata.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::error::ValidationError;
use crate::id::UniversalDeviceId;
use crate::platform::Platform;
use crate::time::Timestamp;

/// Coarse classification used for filtering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Light,
    Switch,
    Dimmer,
    Thermostat,
    Lock,
    Shade,
    Fan,
    Sensor,
    Remote,
    #[default]
    Other,
}

impl DeviceType {
    /// Derive a type from a capability set when the platform gives none.
    #[must_use]
    pub fn infer(capabilities: &BTreeSet<Capability>) -> Self {
        let has = |cap| capabilities.contains(&cap);
        if has(Capability::Thermostat) {
            Self::Thermostat
        } else if has(Capability::Lock) {
            Self::Lock
        } else if has(Capability::Shade) {
            Self::Shade
        } else if has(Capability::Fan) {
            Self::Fan
        } else if has(Capability::Color) || has(Capability::ColorTemperature) {
            Self::Light
        } else if has(Capability::Dimmer) {
            Self::Dimmer
        } else if has(Capability::Switch) {
            Self::Switch
        } else if has(Capability::Button) {
            Self::Remote
        } else if !capabilities.is_empty() && capabilities.iter().all(|c| c.is_sensor()) {
            Self::Sensor
        } else {
            Self::Other
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Dimmer => "dimmer",
            Self::Thermostat => "thermostat",
            Self::Lock => "lock",
            Self::Shade => "shade",
            Self::Fan => "fan",
            Self::Sensor => "sensor",
            Self::Remote => "remote",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical or logical device as seen through the unified model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedDevice {
    id: UniversalDeviceId,
    capabilities: BTreeSet<Capability>,
    pub name: String,
    pub label: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub device_type: DeviceType,
    pub room_id: Option<String>,
    pub room_name: Option<String>,
    pub location_id: Option<String>,
    pub online: bool,
    pub last_seen: Option<Timestamp>,
    /// Opaque platform payload, never merged into the unified fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_specific: Option<serde_json::Value>,
}

impl UnifiedDevice {
    /// Start building a device snapshot for `id`.
    #[must_use]
    pub fn builder(id: UniversalDeviceId) -> UnifiedDeviceBuilder {
        UnifiedDeviceBuilder::new(id)
    }

    #[must_use]
    pub fn id(&self) -> &UniversalDeviceId {
        &self.id
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.id.platform()
    }

    #[must_use]
    pub fn platform_device_id(&self) -> &str {
        self.id.platform_device_id()
    }

    #[must_use]
    pub fn capabilities(&self) -> &BTreeSet<Capability> {
        &self.capabilities
    }

    #[must_use]
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Whether at least one capability accepts commands.
    #[must_use]
    pub fn is_controllable(&self) -> bool {
        self.capabilities.iter().any(|cap| !cap.is_sensor())
    }

    /// Label if set, otherwise name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

/// Step-by-step builder for [`UnifiedDevice`].
#[derive(Debug)]
pub struct UnifiedDeviceBuilder {
    id: UniversalDeviceId,
    name: Option<String>,
    label: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    firmware_version: Option<String>,
    device_type: Option<DeviceType>,
    room_id: Option<String>,
    room_name: Option<String>,
    location_id: Option<String>,
    capabilities: BTreeSet<Capability>,
    online: bool,
    last_seen: Option<Timestamp>,
    platform_specific: Option<serde_json::Value>,
}

impl UnifiedDeviceBuilder {
    fn new(id: UniversalDeviceId) -> Self {
        Self {
            id,
            name: None,
            label: None,
            manufacturer: None,
            model: None,
            firmware_version: None,
            device_type: None,
            room_id: None,
            room_name: None,
            location_id: None,
            capabilities: BTreeSet::new(),
            online: true,
            last_seen: None,
            platform_specific: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn firmware_version(mut self, version: impl Into<String>) -> Self {
        self.firmware_version = Some(version.into());
        self
    }

    /// Explicit type; when unset it is inferred from the capabilities.
    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    #[must_use]
    pub fn room(mut self, id: impl Into<String>, name: Option<String>) -> Self {
        self.room_id = Some(id.into());
        self.room_name = name;
        self
    }

    #[must_use]
    pub fn location_id(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.capabilities.extend(capabilities);
        self
    }

    #[must_use]
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    #[must_use]
    pub fn last_seen(mut self, last_seen: Timestamp) -> Self {
        self.last_seen = Some(last_seen);
        self
    }

    #[must_use]
    pub fn platform_specific(mut self, payload: serde_json::Value) -> Self {
        self.platform_specific = Some(payload);
        self
    }

    /// Consume the builder, validate, and return a [`UnifiedDevice`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] if `name` is missing or blank.
    pub fn build(self) -> Result<UnifiedDevice, ValidationError> {
        let name = self.name.unwrap_or_default();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let device_type = self
            .device_type
            .unwrap_or_else(|| DeviceType::infer(&self.capabilities));
        Ok(UnifiedDevice {
            id: self.id,
            capabilities: self.capabilities,
            name,
            label: self.label,
            manufacturer: self.manufacturer,
            model: self.model,
            firmware_version: self.firmware_version,
            device_type,
            room_id: self.room_id,
            room_name: self.room_name,
            location_id: self.location_id,
            online: self.online,
            last_seen: self.last_seen,
            platform_specific: self.platform_specific,
        })
    }
}
