//! Device state — a point-in-time, flat `capability.attribute → value` reading.
//!
//! Snapshots are never mutated once published; callers needing deltas use
//! [`DeviceState::diff`].

mod diff;
mod value;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use self::diff::{StateDiff, ValueChange};
pub use self::value::StateValue;
use crate::capability::Capability;
use crate::id::UniversalDeviceId;
use crate::time::{Timestamp, now};

/// A point-in-time reading of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: UniversalDeviceId,
    pub timestamp: Timestamp,
    /// Keyed `"{capability}.{attribute}"`, e.g. `"dimmer.level"`.
    pub values: BTreeMap<String, StateValue>,
    /// Opaque platform payload, never merged into `values`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_specific: Option<serde_json::Value>,
}

impl DeviceState {
    /// An empty snapshot stamped with the current time.
    #[must_use]
    pub fn new(device_id: UniversalDeviceId) -> Self {
        Self {
            device_id,
            timestamp: now(),
            values: BTreeMap::new(),
            platform_specific: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Add one reading under `capability.attribute`.
    #[must_use]
    pub fn with(
        mut self,
        capability: Capability,
        attribute: &str,
        value: impl Into<StateValue>,
    ) -> Self {
        self.values
            .insert(capability.state_key(attribute), value.into());
        self
    }

    #[must_use]
    pub fn with_platform_specific(mut self, payload: serde_json::Value) -> Self {
        self.platform_specific = Some(payload);
        self
    }

    /// Look up a value by its flat key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn attribute(&self, capability: Capability, attribute: &str) -> Option<&StateValue> {
        self.values.get(&capability.state_key(attribute))
    }

    /// Readings of one capability, keyed by bare attribute name.
    #[must_use]
    pub fn capability_values(&self, capability: Capability) -> BTreeMap<&str, &StateValue> {
        let prefix = capability.as_str();
        self.values
            .iter()
            .filter_map(|(key, value)| {
                let (cap, attribute) = key.split_once('.')?;
                (cap == prefix).then_some((attribute, value))
            })
            .collect()
    }

    /// A copy restricted to the given keys. The timestamp is preserved.
    #[must_use]
    pub fn filter<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let values = keys
            .into_iter()
            .filter_map(|key| {
                self.values
                    .get_key_value(key)
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect();
        Self {
            device_id: self.device_id.clone(),
            timestamp: self.timestamp,
            values,
            platform_specific: None,
        }
    }

    /// Changes from `previous` to `self`.
    #[must_use]
    pub fn diff(&self, previous: &Self) -> StateDiff {
        StateDiff::between(&previous.values, &self.values)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    fn device() -> UniversalDeviceId {
        UniversalDeviceId::new(Platform::SmartThings, "abc")
    }

    #[test]
    fn should_key_values_by_capability_and_attribute() {
        let state = DeviceState::new(device())
            .with(Capability::Switch, "switch", "on")
            .with(Capability::Dimmer, "level", 40_i64);

        assert_eq!(state.get("switch.switch"), Some(&StateValue::from("on")));
        assert_eq!(
            state.attribute(Capability::Dimmer, "level"),
            Some(&StateValue::Int(40))
        );
    }

    #[test]
    fn should_group_values_of_one_capability() {
        let state = DeviceState::new(device())
            .with(Capability::Thermostat, "mode", "heat")
            .with(Capability::Thermostat, "heatingSetpoint", 20.5)
            .with(Capability::TemperatureSensor, "temperature", 19.0);

        let values = state.capability_values(Capability::Thermostat);
        assert_eq!(values.len(), 2);
        assert_eq!(values["mode"], &StateValue::from("heat"));
    }

    #[test]
    fn should_filter_to_requested_keys() {
        let state = DeviceState::new(device())
            .with(Capability::Switch, "switch", "on")
            .with(Capability::Battery, "battery", 80_i64);

        let filtered = state.filter(["battery.battery", "missing.key"]);
        assert_eq!(filtered.values.len(), 1);
        assert_eq!(filtered.timestamp, state.timestamp);
    }

    #[test]
    fn should_diff_against_previous_snapshot() {
        let before = DeviceState::new(device()).with(Capability::Switch, "switch", "off");
        let after = DeviceState::new(device())
            .with(Capability::Switch, "switch", "on")
            .with(Capability::Dimmer, "level", 100_i64);

        let diff = after.diff(&before);
        assert!(diff.changed.contains_key("switch.switch"));
        assert!(diff.added.contains_key("dimmer.level"));
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn should_skip_missing_platform_payload_when_serializing() {
        let state = DeviceState::new(device()).with(Capability::Lock, "lock", "locked");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["device_id"], "smartthings:abc");
        assert_eq!(json["values"]["lock.lock"], "locked");
        assert!(json.get("platform_specific").is_none());
    }
}
