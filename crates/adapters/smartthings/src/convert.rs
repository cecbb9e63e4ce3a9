//! Conversion from SmartThings payloads to unified devices and states.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use omnihub_domain::device::UnifiedDevice;
use omnihub_domain::error::ValidationError;
use omnihub_domain::id::UniversalDeviceId;
use omnihub_domain::platform::Platform;
use omnihub_domain::state::DeviceState;
use omnihub_domain::time::Timestamp;

use crate::capabilities::{MAIN_COMPONENT, TABLE, translate_attribute};
use crate::types::{StDevice, StDeviceStatus, StHealth};

#[must_use]
pub fn device_id(platform_device_id: &str) -> UniversalDeviceId {
    UniversalDeviceId::new(Platform::SmartThings, platform_device_id)
}

/// Build a [`UnifiedDevice`] from a device payload.
///
/// Capabilities are the union across all components, with unmapped ids
/// dropped. `health` overrides the payload's embedded health; without either
/// the device is reported offline. `rooms` maps room id to name.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyName`] when the payload has no usable name.
pub fn to_unified(
    device: &StDevice,
    health: Option<&StHealth>,
    rooms: &HashMap<String, String>,
) -> Result<UnifiedDevice, ValidationError> {
    let health = health.or(device.health_state.as_ref());
    let name = device
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .or(device.label.as_deref())
        .unwrap_or(&device.device_id);

    let mut builder = UnifiedDevice::builder(device_id(&device.device_id))
        .name(name)
        .capabilities(TABLE.normalize(device.capability_ids()))
        .online(health.is_some_and(StHealth::is_online))
        .platform_specific(json!({
            "type": device.kind,
            "presentationId": device.presentation_id,
            "components": device.components,
        }));

    if let Some(label) = device.label.as_deref().filter(|label| !label.is_empty()) {
        builder = builder.label(label);
    }
    let ocf = device.ocf.as_ref();
    if let Some(manufacturer) = ocf
        .and_then(|ocf| ocf.manufacturer_name.as_deref())
        .or(device.manufacturer_name.as_deref())
    {
        builder = builder.manufacturer(manufacturer);
    }
    if let Some(model) = ocf.and_then(|ocf| ocf.model_number.as_deref()) {
        builder = builder.model(model);
    }
    if let Some(firmware) = ocf.and_then(|ocf| ocf.firmware_version.as_deref()) {
        builder = builder.firmware_version(firmware);
    }
    if let Some(room_id) = &device.room_id {
        builder = builder.room(room_id, rooms.get(room_id).cloned());
    }
    if let Some(location_id) = &device.location_id {
        builder = builder.location_id(location_id);
    }
    if let Some(last_seen) = health
        .and_then(|health| health.last_updated_date.as_deref())
        .and_then(parse_timestamp)
    {
        builder = builder.last_seen(last_seen);
    }
    builder.build()
}

/// Flatten a status payload into a [`DeviceState`].
///
/// Only mapped capabilities contribute. When several components report the
/// same attribute, the `main` component wins. The raw payload is kept as
/// `platform_specific`.
#[must_use]
pub fn to_state(id: UniversalDeviceId, status: &StDeviceStatus) -> DeviceState {
    let mut state = DeviceState::new(id);
    let ordered = status
        .components
        .iter()
        .filter(|(name, _)| name.as_str() != MAIN_COMPONENT)
        .chain(status.components.get_key_value(MAIN_COMPONENT));

    for (_, capabilities) in ordered {
        for (native_capability, attributes) in capabilities {
            for (native_attribute, reading) in attributes {
                if let Some((capability, attribute, value)) =
                    translate_attribute(native_capability, native_attribute, &reading.value)
                {
                    state.values.insert(capability.state_key(attribute), value);
                }
            }
        }
    }

    match serde_json::to_value(status) {
        Ok(raw) => state.with_platform_specific(raw),
        Err(_) => state,
    }
}

fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use omnihub_domain::capability::Capability;
    use omnihub_domain::device::DeviceType;
    use omnihub_domain::state::StateValue;

    use super::*;

    fn device(json: serde_json::Value) -> StDevice {
        serde_json::from_value(json).unwrap()
    }

    fn fan_device() -> StDevice {
        device(json!({
            "deviceId": "fan-1",
            "name": "ceiling-fan",
            "label": "Bedroom Fan",
            "roomId": "r-bed",
            "locationId": "home",
            "components": [
                {"id": "main", "capabilities": [{"id": "switch"}, {"id": "fanSpeed"}, {"id": "refresh"}]},
                {"id": "light", "capabilities": [{"id": "switchLevel"}]}
            ],
            "ocf": {"manufacturerName": "Acme", "modelNumber": "F-9"},
            "healthState": {"state": "ONLINE", "lastUpdatedDate": "2026-03-01T10:00:00Z"}
        }))
    }

    #[test]
    fn should_union_capabilities_across_components() {
        let unified = to_unified(&fan_device(), None, &HashMap::new()).unwrap();
        let caps: Vec<_> = unified.capabilities().iter().copied().collect();
        assert_eq!(caps, [Capability::Switch, Capability::Dimmer, Capability::Fan]);
        assert_eq!(unified.device_type, DeviceType::Fan);
    }

    #[test]
    fn should_fill_metadata_and_room_name() {
        let rooms = HashMap::from([("r-bed".to_string(), "Bedroom".to_string())]);
        let unified = to_unified(&fan_device(), None, &rooms).unwrap();
        assert_eq!(unified.id().to_string(), "smartthings:fan-1");
        assert_eq!(unified.display_name(), "Bedroom Fan");
        assert_eq!(unified.manufacturer.as_deref(), Some("Acme"));
        assert_eq!(unified.model.as_deref(), Some("F-9"));
        assert_eq!(unified.room_name.as_deref(), Some("Bedroom"));
        assert_eq!(unified.location_id.as_deref(), Some("home"));
        assert!(unified.online);
        assert!(unified.last_seen.is_some());
    }

    #[test]
    fn should_report_offline_without_health() {
        let mut payload = fan_device();
        payload.health_state = None;
        let unified = to_unified(&payload, None, &HashMap::new()).unwrap();
        assert!(!unified.online);
    }

    #[test]
    fn should_prefer_explicit_health_over_embedded() {
        let offline = StHealth {
            state: "OFFLINE".to_string(),
            last_updated_date: None,
        };
        let unified = to_unified(&fan_device(), Some(&offline), &HashMap::new()).unwrap();
        assert!(!unified.online);
    }

    #[test]
    fn should_fall_back_to_device_id_as_name() {
        let payload = device(json!({"deviceId": "bare", "components": []}));
        let unified = to_unified(&payload, None, &HashMap::new()).unwrap();
        assert_eq!(unified.name, "bare");
        assert_eq!(unified.device_type, DeviceType::Other);
    }

    #[test]
    fn should_flatten_status_with_main_component_winning() {
        let status: StDeviceStatus = serde_json::from_value(json!({
            "components": {
                "main": {
                    "switch": {"switch": {"value": "on"}},
                    "fanSpeed": {"fanSpeed": {"value": 3}},
                    "switchLevel": {"level": {"value": 80, "unit": "%"}}
                },
                "light": {
                    "switchLevel": {"level": {"value": 20}},
                    "refresh": {}
                }
            }
        }))
        .unwrap();
        let state = to_state(device_id("fan-1"), &status);
        assert_eq!(state.get("switch.switch"), Some(&StateValue::String("on".to_string())));
        assert_eq!(state.get("fan.speed"), Some(&StateValue::Int(75)));
        assert_eq!(state.get("dimmer.level"), Some(&StateValue::Int(80)));
        assert_eq!(state.values.len(), 3);
        assert!(state.platform_specific.is_some());
    }
}
