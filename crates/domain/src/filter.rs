//! Device discovery filters.

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::device::{DeviceType, UnifiedDevice};

/// Predicates for `list_devices`. Every set field must match (logical AND);
/// an empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFilter {
    /// Room id or room name (name comparison is case-insensitive).
    pub room: Option<String>,
    pub location_id: Option<String>,
    pub capability: Option<Capability>,
    pub online: Option<bool>,
    /// Case-insensitive exact manufacturer match.
    pub manufacturer: Option<String>,
    /// Case-insensitive; `*` matches any run of characters. Without a `*`
    /// the pattern matches as a substring.
    pub name_pattern: Option<String>,
    pub device_type: Option<DeviceType>,
}

impl DeviceFilter {
    #[must_use]
    pub fn room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    #[must_use]
    pub fn location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: Capability) -> Self {
        self.capability = Some(capability);
        self
    }

    #[must_use]
    pub fn online(mut self, online: bool) -> Self {
        self.online = Some(online);
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = Some(device_type);
        self
    }

    #[must_use]
    pub fn matches(&self, device: &UnifiedDevice) -> bool {
        if let Some(room) = &self.room {
            let by_id = device.room_id.as_deref() == Some(room.as_str());
            let by_name = device
                .room_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(room));
            if !by_id && !by_name {
                return false;
            }
        }
        if let Some(location) = &self.location_id
            && device.location_id.as_deref() != Some(location.as_str())
        {
            return false;
        }
        if let Some(capability) = self.capability
            && !device.has_capability(capability)
        {
            return false;
        }
        if let Some(online) = self.online
            && device.online != online
        {
            return false;
        }
        if let Some(manufacturer) = &self.manufacturer
            && !device
                .manufacturer
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case(manufacturer))
        {
            return false;
        }
        if let Some(pattern) = &self.name_pattern
            && !name_matches(pattern, device)
        {
            return false;
        }
        if let Some(device_type) = self.device_type
            && device.device_type != device_type
        {
            return false;
        }
        true
    }

    /// Keep only matching devices, preserving order.
    #[must_use]
    pub fn apply(&self, devices: Vec<UnifiedDevice>) -> Vec<UnifiedDevice> {
        devices.into_iter().filter(|d| self.matches(d)).collect()
    }
}

fn name_matches(pattern: &str, device: &UnifiedDevice) -> bool {
    let pattern = pattern.to_lowercase();
    std::iter::once(device.name.as_str())
        .chain(device.label.as_deref())
        .any(|candidate| glob_match(&pattern, &candidate.to_lowercase()))
}

fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return text.contains(pattern);
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut rest = text;
    for (index, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if index == 0 {
            let Some(stripped) = rest.strip_prefix(part) else {
                return false;
            };
            rest = stripped;
        } else if index == last {
            return rest.ends_with(part);
        } else {
            let Some(position) = rest.find(part) else {
                return false;
            };
            rest = &rest[position + part.len()..];
        }
    }
    true
}
