//! The bridge's device/zone/area tree and the live state cache built on it.
//!
//! A [`BridgeTree`] is assembled from the read responses at connect time and
//! then kept current by push events. [`BridgeCache`] shares it between the
//! session task and the adapter; every update replaces a device's state
//! snapshot wholesale, so readers never observe a half-applied event.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock};

use omnihub_domain::capability::Capability;
use omnihub_domain::device::UnifiedDevice;
use omnihub_domain::id::UniversalDeviceId;
use omnihub_domain::location::Room;
use omnihub_domain::platform::Platform;
use omnihub_domain::state::{DeviceState, StateDiff, StateValue};
use omnihub_domain::time::now;
use serde_json::json;

use crate::capabilities::{self, TABLE};
use crate::leap::{
    AreaDefinition, ButtonDefinition, ButtonStatus, DeviceDefinition, FanSpeed,
    OccupancyGroupDefinition, OccupancyGroupStatus, PushEvent, ZoneDefinition, ZoneStatus, id_after,
};

const PLATFORM: Platform = Platform::Lutron;

/// The single location every Lutron device belongs to.
pub const BRIDGE_LOCATION_ID: &str = "bridge";

/// The zone a device controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRef {
    pub id: String,
    pub control_type: String,
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    device: UnifiedDevice,
    zone: Option<ZoneRef>,
    area_id: Option<String>,
    state: DeviceState,
}

/// One device's state after an event touched it.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub device_id: UniversalDeviceId,
    pub diff: StateDiff,
    pub state: DeviceState,
}

/// Everything read from the bridge at connect time.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub devices: Vec<DeviceDefinition>,
    pub areas: Vec<AreaDefinition>,
    pub zones: Vec<ZoneDefinition>,
    pub occupancy_groups: Vec<OccupancyGroupDefinition>,
    pub buttons: Vec<ButtonDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct BridgeTree {
    /// Keyed by the device id segment of `/device/{id}`.
    devices: BTreeMap<String, DeviceEntry>,
    areas: BTreeMap<String, String>,
    zone_devices: HashMap<String, String>,
    /// Button id → (device id, button number).
    button_devices: HashMap<String, (String, Option<u32>)>,
    occupancy_areas: HashMap<String, Vec<String>>,
}

fn is_bridge(device_type: &str) -> bool {
    device_type.starts_with("SmartBridge") || device_type.ends_with("MainRepeater")
}

impl BridgeTree {
    #[must_use]
    pub fn build(snapshot: Snapshot) -> Self {
        let areas: BTreeMap<String, String> = snapshot
            .areas
            .into_iter()
            .filter_map(|area| Some((id_after(&area.href, "area")?.to_string(), area.name)))
            .collect();
        let zone_types: HashMap<String, String> = snapshot
            .zones
            .into_iter()
            .filter_map(|zone| Some((id_after(&zone.href, "zone")?.to_string(), zone.control_type)))
            .collect();

        let mut group_devices = HashMap::new();
        for device in &snapshot.devices {
            if let Some(id) = id_after(&device.href, "device") {
                for group in &device.button_groups {
                    if let Some(group_id) = group.id("buttongroup") {
                        group_devices.insert(group_id.to_string(), id.to_string());
                    }
                }
            }
        }
        let button_devices: HashMap<String, (String, Option<u32>)> = snapshot
            .buttons
            .iter()
            .filter_map(|button| {
                let id = id_after(&button.href, "button")?;
                let group = button.parent.as_ref()?.id("buttongroup")?;
                let device = group_devices.get(group)?;
                Some((id.to_string(), (device.clone(), button.button_number)))
            })
            .collect();

        let mut tree = Self {
            areas,
            button_devices,
            occupancy_areas: snapshot
                .occupancy_groups
                .into_iter()
                .filter_map(|group| {
                    let id = id_after(&group.href, "occupancygroup")?.to_string();
                    let areas = group
                        .associated_areas
                        .iter()
                        .filter_map(|associated| associated.area.id("area").map(str::to_string))
                        .collect();
                    Some((id, areas))
                })
                .collect(),
            ..Self::default()
        };

        for definition in snapshot.devices {
            if is_bridge(&definition.device_type) {
                continue;
            }
            let Some(id) = id_after(&definition.href, "device").map(str::to_string) else {
                continue;
            };
            let zone = definition.local_zones.first().and_then(|zone| {
                let zone_id = zone.id("zone")?;
                Some(ZoneRef {
                    id: zone_id.to_string(),
                    control_type: zone_types.get(zone_id)?.clone(),
                })
            });
            let buttons = tree
                .button_devices
                .values()
                .filter(|(device, _)| *device == id)
                .count();
            match tree.entry(&id, &definition, zone, buttons) {
                Some(entry) => {
                    if let Some(zone) = &entry.zone {
                        tree.zone_devices.insert(zone.id.clone(), id.clone());
                    }
                    tree.devices.insert(id, entry);
                }
                None => tracing::warn!(href = %definition.href, "skipping unnamed Lutron device"),
            }
        }
        tree
    }

    fn entry(
        &self,
        id: &str,
        definition: &DeviceDefinition,
        zone: Option<ZoneRef>,
        buttons: usize,
    ) -> Option<DeviceEntry> {
        let device_type = definition.device_type.as_str();
        let capabilities = if device_type.starts_with("Pico") {
            vec![Capability::Button]
        } else if device_type.ends_with("OccupancySensor") {
            vec![Capability::OccupancySensor]
        } else if let Some(zone) = &zone {
            capabilities::zone_capabilities(&zone.control_type)
        } else {
            tracing::debug!(device_type, "device has no zone and no known type");
            Vec::new()
        };

        let universal_id = UniversalDeviceId::new(PLATFORM, id);
        let area_id = definition
            .associated_area
            .as_ref()
            .and_then(|area| area.id("area"))
            .map(str::to_string);

        let mut builder = UnifiedDevice::builder(universal_id.clone())
            .name(definition.name.clone())
            .manufacturer("Lutron")
            .capabilities(capabilities.iter().copied())
            .location_id(BRIDGE_LOCATION_ID)
            .platform_specific(json!({
                "href": definition.href,
                "deviceType": definition.device_type,
                "serialNumber": definition.serial_number,
                "zone": zone.as_ref().map(|zone| json!({"id": zone.id, "controlType": zone.control_type})),
            }));
        if let Some(model) = &definition.model_number {
            builder = builder.model(model.clone());
        }
        if let Some(area) = &area_id {
            builder = builder.room(area.clone(), self.areas.get(area).cloned());
        }
        let device = builder.build().ok()?;

        let mut state = DeviceState::new(universal_id);
        if capabilities.contains(&Capability::Button) && buttons > 0 {
            state = state.with(
                Capability::Button,
                "numberOfButtons",
                i64::try_from(buttons).unwrap_or(i64::MAX),
            );
        }
        Some(DeviceEntry {
            device,
            zone,
            area_id,
            state,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    #[must_use]
    pub fn button_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.button_devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Apply a pushed or subscribed event, returning the devices it changed.
    pub fn apply(&mut self, event: &PushEvent) -> Vec<StateChange> {
        match event {
            PushEvent::Zones(statuses) => statuses
                .iter()
                .filter_map(|status| self.apply_zone(status))
                .collect(),
            PushEvent::Occupancy(statuses) => statuses
                .iter()
                .flat_map(|status| self.apply_occupancy(status))
                .collect(),
            PushEvent::Button(status) => self.apply_button(status).into_iter().collect(),
        }
    }

    fn apply_zone(&mut self, status: &ZoneStatus) -> Option<StateChange> {
        let zone_id = status.zone.id("zone")?;
        let device_id = self.zone_devices.get(zone_id)?.clone();
        let entry = self.devices.get(&device_id)?;
        let control_type = entry.zone.as_ref()?.control_type.as_str();
        let capability = TABLE.to_universal(control_type)?;

        let mut values = Vec::new();
        match capability {
            Capability::Fan => {
                let speed = status
                    .fan_speed
                    .or_else(|| status.level.map(FanSpeed::nearest))?;
                values.push((Capability::Fan, "speed", StateValue::Int(speed.percent().into())));
            }
            Capability::Shade => {
                let position = level(status)?;
                let label = match position {
                    0 => "closed",
                    100 => "open",
                    _ => "partially open",
                };
                values.push((Capability::Shade, "position", StateValue::Int(position)));
                values.push((Capability::Shade, "state", StateValue::from(label)));
            }
            Capability::Dimmer | Capability::Switch => {
                let level = level(status)?;
                if capability == Capability::Dimmer {
                    values.push((Capability::Dimmer, "level", StateValue::Int(level)));
                }
                let switch = if level > 0 { "on" } else { "off" };
                values.push((Capability::Switch, "switch", StateValue::from(switch)));
            }
            _ => return None,
        }
        self.update(&device_id, values)
    }

    fn apply_occupancy(&mut self, status: &OccupancyGroupStatus) -> Vec<StateChange> {
        let Some(group_id) = status.occupancy_group.id("occupancygroup") else {
            return Vec::new();
        };
        let Some(areas) = self.occupancy_areas.get(group_id).cloned() else {
            return Vec::new();
        };
        let occupancy = status.occupancy_status.to_lowercase();
        let sensors: Vec<String> = self
            .devices
            .iter()
            .filter(|(_, entry)| {
                entry.device.has_capability(Capability::OccupancySensor)
                    && entry.area_id.as_ref().is_some_and(|area| areas.contains(area))
            })
            .map(|(id, _)| id.clone())
            .collect();
        sensors
            .iter()
            .filter_map(|id| {
                self.update(
                    id,
                    vec![(
                        Capability::OccupancySensor,
                        "occupancy",
                        StateValue::from(occupancy.as_str()),
                    )],
                )
            })
            .collect()
    }

    fn apply_button(&mut self, status: &ButtonStatus) -> Option<StateChange> {
        let button_id = status.button.id("button")?;
        let (device_id, _) = self.button_devices.get(button_id)?.clone();
        let event = match status.button_event.event_type.as_str() {
            "Press" => "pushed".to_string(),
            "Release" => "released".to_string(),
            "Hold" | "LongHold" => "held".to_string(),
            other => other.to_lowercase(),
        };
        self.update(&device_id, vec![(Capability::Button, "button", StateValue::from(event))])
    }

    fn update(
        &mut self,
        device_id: &str,
        values: Vec<(Capability, &str, StateValue)>,
    ) -> Option<StateChange> {
        let entry = self.devices.get_mut(device_id)?;
        let mut next = entry.state.clone();
        next.timestamp = now();
        for (capability, attribute, value) in values {
            next.values.insert(capability.state_key(attribute), value);
        }
        let diff = next.diff(&entry.state);
        entry.state = next.clone();
        Some(StateChange {
            device_id: next.device_id.clone(),
            diff,
            state: next,
        })
    }

    /// Rooms derived from areas that hold at least one device.
    #[must_use]
    pub fn rooms(&self) -> Vec<Room> {
        let occupied: BTreeSet<&str> = self
            .devices
            .values()
            .filter_map(|entry| entry.area_id.as_deref())
            .collect();
        self.areas
            .iter()
            .filter(|(id, _)| occupied.contains(id.as_str()))
            .filter_map(|(id, name)| {
                Room::builder(PLATFORM)
                    .id(id.clone())
                    .name(name.clone())
                    .location_id(BRIDGE_LOCATION_ID)
                    .build()
                    .ok()
            })
            .collect()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn level(status: &ZoneStatus) -> Option<i64> {
    status
        .level
        .filter(|level| level.is_finite())
        .map(|level| level.round().clamp(0.0, 100.0) as i64)
}

/// Shared, replace-only view of the current [`BridgeTree`].
#[derive(Debug, Default)]
pub struct BridgeCache {
    tree: RwLock<BridgeTree>,
}

impl BridgeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly loaded tree. Returns what changed for devices known
    /// before, e.g. zones moved while the connection was down.
    pub fn replace(&self, tree: BridgeTree) -> Vec<StateChange> {
        let mut current = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let changes = tree
            .devices
            .iter()
            .filter_map(|(id, entry)| {
                let previous = current.devices.get(id)?;
                let diff = entry.state.diff(&previous.state);
                (!diff.is_empty()).then(|| StateChange {
                    device_id: entry.state.device_id.clone(),
                    diff,
                    state: entry.state.clone(),
                })
            })
            .collect();
        *current = tree;
        changes
    }

    pub fn apply(&self, event: &PushEvent) -> Vec<StateChange> {
        self.tree
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event)
    }

    pub fn clear(&self) {
        *self.tree.write().unwrap_or_else(PoisonError::into_inner) = BridgeTree::default();
    }

    fn read<T>(&self, f: impl FnOnce(&BridgeTree) -> T) -> T {
        f(&self.tree.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[must_use]
    pub fn devices(&self) -> Vec<UnifiedDevice> {
        self.read(|tree| tree.devices.values().map(|entry| entry.device.clone()).collect())
    }

    #[must_use]
    pub fn device(&self, id: &str) -> Option<UnifiedDevice> {
        self.read(|tree| tree.devices.get(id).map(|entry| entry.device.clone()))
    }

    #[must_use]
    pub fn state(&self, id: &str) -> Option<DeviceState> {
        self.read(|tree| tree.devices.get(id).map(|entry| entry.state.clone()))
    }

    #[must_use]
    pub fn zone(&self, id: &str) -> Option<ZoneRef> {
        self.read(|tree| tree.devices.get(id).and_then(|entry| entry.zone.clone()))
    }

    #[must_use]
    pub fn rooms(&self) -> Vec<Room> {
        self.read(BridgeTree::rooms)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read(BridgeTree::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(BridgeTree::is_empty)
    }
}
