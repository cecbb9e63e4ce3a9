//! Universal capabilities and their attribute/command contracts.
//!
//! A [`Capability`] is a vendor-independent device function. Each one fixes
//! the attributes it reports (and their value kind) and the commands it
//! accepts, so the same `capability.attribute` key always carries the same
//! value type regardless of which platform produced it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A named device function independent of vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Switch,
    Dimmer,
    Color,
    ColorTemperature,
    Thermostat,
    Lock,
    Shade,
    Fan,
    TemperatureSensor,
    HumiditySensor,
    MotionSensor,
    ContactSensor,
    OccupancySensor,
    IlluminanceSensor,
    WaterSensor,
    SmokeDetector,
    Battery,
    PowerMeter,
    EnergyMeter,
    Button,
}

/// The value type an attribute always carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Integer,
    Number,
    Text,
}

/// One attribute reported by a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: ValueKind,
}

/// One command accepted by a capability, with its required parameters in
/// positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub parameters: &'static [&'static str],
}

const fn attr(name: &'static str, kind: ValueKind) -> AttributeSpec {
    AttributeSpec { name, kind }
}

const fn cmd(name: &'static str, parameters: &'static [&'static str]) -> CommandSpec {
    CommandSpec { name, parameters }
}

use ValueKind::{Integer, Number, Text};

const SWITCH_ATTRS: &[AttributeSpec] = &[attr("switch", Text)];
const DIMMER_ATTRS: &[AttributeSpec] = &[attr("level", Integer)];
const COLOR_ATTRS: &[AttributeSpec] = &[attr("hue", Number), attr("saturation", Number)];
const COLOR_TEMPERATURE_ATTRS: &[AttributeSpec] = &[attr("colorTemperature", Integer)];
const THERMOSTAT_ATTRS: &[AttributeSpec] = &[
    attr("temperature", Number),
    attr("heatingSetpoint", Number),
    attr("coolingSetpoint", Number),
    attr("mode", Text),
    attr("operatingState", Text),
];
const LOCK_ATTRS: &[AttributeSpec] = &[attr("lock", Text)];
const SHADE_ATTRS: &[AttributeSpec] = &[attr("position", Integer), attr("state", Text)];
const FAN_ATTRS: &[AttributeSpec] = &[attr("speed", Integer)];
const TEMPERATURE_ATTRS: &[AttributeSpec] = &[attr("temperature", Number)];
const HUMIDITY_ATTRS: &[AttributeSpec] = &[attr("humidity", Number)];
const MOTION_ATTRS: &[AttributeSpec] = &[attr("motion", Text)];
const CONTACT_ATTRS: &[AttributeSpec] = &[attr("contact", Text)];
const OCCUPANCY_ATTRS: &[AttributeSpec] = &[attr("occupancy", Text)];
const ILLUMINANCE_ATTRS: &[AttributeSpec] = &[attr("illuminance", Number)];
const WATER_ATTRS: &[AttributeSpec] = &[attr("water", Text)];
const SMOKE_ATTRS: &[AttributeSpec] = &[attr("smoke", Text)];
const BATTERY_ATTRS: &[AttributeSpec] = &[attr("battery", Integer)];
const POWER_ATTRS: &[AttributeSpec] = &[attr("power", Number)];
const ENERGY_ATTRS: &[AttributeSpec] = &[attr("energy", Number)];
const BUTTON_ATTRS: &[AttributeSpec] = &[attr("button", Text), attr("numberOfButtons", Integer)];

const SWITCH_CMDS: &[CommandSpec] = &[cmd("on", &[]), cmd("off", &[])];
const DIMMER_CMDS: &[CommandSpec] = &[cmd("setLevel", &["level"])];
const COLOR_CMDS: &[CommandSpec] = &[
    cmd("setColor", &["hue", "saturation"]),
    cmd("setHue", &["hue"]),
    cmd("setSaturation", &["saturation"]),
];
const COLOR_TEMPERATURE_CMDS: &[CommandSpec] = &[cmd("setColorTemperature", &["temperature"])];
const THERMOSTAT_CMDS: &[CommandSpec] = &[
    cmd("setHeatingSetpoint", &["setpoint"]),
    cmd("setCoolingSetpoint", &["setpoint"]),
    cmd("setThermostatMode", &["mode"]),
];
const LOCK_CMDS: &[CommandSpec] = &[cmd("lock", &[]), cmd("unlock", &[])];
const SHADE_CMDS: &[CommandSpec] = &[
    cmd("open", &[]),
    cmd("close", &[]),
    cmd("pause", &[]),
    cmd("setPosition", &["position"]),
];
const FAN_CMDS: &[CommandSpec] = &[cmd("setSpeed", &["speed"])];
const NO_CMDS: &[CommandSpec] = &[];

impl Capability {
    pub const ALL: [Self; 20] = [
        Self::Switch,
        Self::Dimmer,
        Self::Color,
        Self::ColorTemperature,
        Self::Thermostat,
        Self::Lock,
        Self::Shade,
        Self::Fan,
        Self::TemperatureSensor,
        Self::HumiditySensor,
        Self::MotionSensor,
        Self::ContactSensor,
        Self::OccupancySensor,
        Self::IlluminanceSensor,
        Self::WaterSensor,
        Self::SmokeDetector,
        Self::Battery,
        Self::PowerMeter,
        Self::EnergyMeter,
        Self::Button,
    ];

    /// Identifier used as the prefix of state keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Dimmer => "dimmer",
            Self::Color => "color",
            Self::ColorTemperature => "colorTemperature",
            Self::Thermostat => "thermostat",
            Self::Lock => "lock",
            Self::Shade => "shade",
            Self::Fan => "fan",
            Self::TemperatureSensor => "temperatureSensor",
            Self::HumiditySensor => "humiditySensor",
            Self::MotionSensor => "motionSensor",
            Self::ContactSensor => "contactSensor",
            Self::OccupancySensor => "occupancySensor",
            Self::IlluminanceSensor => "illuminanceSensor",
            Self::WaterSensor => "waterSensor",
            Self::SmokeDetector => "smokeDetector",
            Self::Battery => "battery",
            Self::PowerMeter => "powerMeter",
            Self::EnergyMeter => "energyMeter",
            Self::Button => "button",
        }
    }

    /// Attributes this capability reports.
    #[must_use]
    pub fn attributes(self) -> &'static [AttributeSpec] {
        match self {
            Self::Switch => SWITCH_ATTRS,
            Self::Dimmer => DIMMER_ATTRS,
            Self::Color => COLOR_ATTRS,
            Self::ColorTemperature => COLOR_TEMPERATURE_ATTRS,
            Self::Thermostat => THERMOSTAT_ATTRS,
            Self::Lock => LOCK_ATTRS,
            Self::Shade => SHADE_ATTRS,
            Self::Fan => FAN_ATTRS,
            Self::TemperatureSensor => TEMPERATURE_ATTRS,
            Self::HumiditySensor => HUMIDITY_ATTRS,
            Self::MotionSensor => MOTION_ATTRS,
            Self::ContactSensor => CONTACT_ATTRS,
            Self::OccupancySensor => OCCUPANCY_ATTRS,
            Self::IlluminanceSensor => ILLUMINANCE_ATTRS,
            Self::WaterSensor => WATER_ATTRS,
            Self::SmokeDetector => SMOKE_ATTRS,
            Self::Battery => BATTERY_ATTRS,
            Self::PowerMeter => POWER_ATTRS,
            Self::EnergyMeter => ENERGY_ATTRS,
            Self::Button => BUTTON_ATTRS,
        }
    }

    /// Commands this capability accepts. Empty for read-only capabilities.
    #[must_use]
    pub fn commands(self) -> &'static [CommandSpec] {
        match self {
            Self::Switch => SWITCH_CMDS,
            Self::Dimmer => DIMMER_CMDS,
            Self::Color => COLOR_CMDS,
            Self::ColorTemperature => COLOR_TEMPERATURE_CMDS,
            Self::Thermostat => THERMOSTAT_CMDS,
            Self::Lock => LOCK_CMDS,
            Self::Shade => SHADE_CMDS,
            Self::Fan => FAN_CMDS,
            Self::TemperatureSensor
            | Self::HumiditySensor
            | Self::MotionSensor
            | Self::ContactSensor
            | Self::OccupancySensor
            | Self::IlluminanceSensor
            | Self::WaterSensor
            | Self::SmokeDetector
            | Self::Battery
            | Self::PowerMeter
            | Self::EnergyMeter
            | Self::Button => NO_CMDS,
        }
    }

    /// Read-only capabilities (sensors, meters, remotes) accept no commands.
    #[must_use]
    pub fn is_sensor(self) -> bool {
        self.commands().is_empty()
    }

    #[must_use]
    pub fn command(self, name: &str) -> Option<&'static CommandSpec> {
        self.commands().iter().find(|spec| spec.name == name)
    }

    #[must_use]
    pub fn attribute(self, name: &str) -> Option<&'static AttributeSpec> {
        self.attributes().iter().find(|spec| spec.name == name)
    }

    /// Flat state key for one of this capability's attributes.
    #[must_use]
    pub fn state_key(self, attribute: &str) -> String {
        format!("{}.{attribute}", self.as_str())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCapability(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_every_identifier() {
        for cap in Capability::ALL {
            assert_eq!(cap.as_str().parse::<Capability>().unwrap(), cap);
        }
    }

    #[test]
    fn should_serialize_with_same_identifier_as_display() {
        for cap in Capability::ALL {
            let json = serde_json::to_string(&cap).unwrap();
            assert_eq!(json, format!("\"{cap}\""));
        }
    }

    #[test]
    fn should_reject_unknown_identifier() {
        assert_eq!(
            "toaster".parse::<Capability>(),
            Err(ValidationError::UnknownCapability("toaster".to_string()))
        );
    }

    #[test]
    fn should_classify_read_only_capabilities_as_sensors() {
        assert!(Capability::MotionSensor.is_sensor());
        assert!(Capability::Battery.is_sensor());
        assert!(Capability::Button.is_sensor());
        assert!(!Capability::Switch.is_sensor());
        assert!(!Capability::Fan.is_sensor());
    }

    #[test]
    fn should_declare_at_least_one_attribute_per_capability() {
        for cap in Capability::ALL {
            assert!(!cap.attributes().is_empty(), "{cap}");
        }
    }

    #[test]
    fn should_look_up_command_parameters() {
        let spec = Capability::Color.command("setColor").unwrap();
        assert_eq!(spec.parameters, &["hue", "saturation"]);
        assert!(Capability::Switch.command("setLevel").is_none());
    }

    #[test]
    fn should_build_flat_state_key() {
        assert_eq!(Capability::Dimmer.state_key("level"), "dimmer.level");
        assert_eq!(
            Capability::ColorTemperature.state_key("colorTemperature"),
            "colorTemperature.colorTemperature"
        );
    }
}
