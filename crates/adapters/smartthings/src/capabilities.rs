//! SmartThings capability vocabulary and its translation to the unified
//! model: capability ids, attribute names and command shapes.

use serde_json::{Value, json};

use omnihub_app::capability_map::CapabilityTable;
use omnihub_domain::capability::Capability;
use omnihub_domain::command::DeviceCommand;
use omnihub_domain::error::DeviceError;
use omnihub_domain::state::StateValue;

/// Component commands are addressed to unless the device says otherwise.
pub const MAIN_COMPONENT: &str = "main";

pub const TABLE: CapabilityTable = CapabilityTable::new(
    &[
        ("switch", Capability::Switch),
        ("switchLevel", Capability::Dimmer),
        ("colorControl", Capability::Color),
        ("colorTemperature", Capability::ColorTemperature),
        ("thermostatMode", Capability::Thermostat),
        ("lock", Capability::Lock),
        ("windowShade", Capability::Shade),
        ("fanSpeed", Capability::Fan),
        ("temperatureMeasurement", Capability::TemperatureSensor),
        ("relativeHumidityMeasurement", Capability::HumiditySensor),
        ("motionSensor", Capability::MotionSensor),
        ("contactSensor", Capability::ContactSensor),
        ("occupancySensor", Capability::OccupancySensor),
        ("illuminanceMeasurement", Capability::IlluminanceSensor),
        ("waterSensor", Capability::WaterSensor),
        ("smokeDetector", Capability::SmokeDetector),
        ("battery", Capability::Battery),
        ("powerMeter", Capability::PowerMeter),
        ("energyMeter", Capability::EnergyMeter),
        ("button", Capability::Button),
    ],
    &[
        ("thermostat", Capability::Thermostat),
        ("thermostatHeatingSetpoint", Capability::Thermostat),
        ("thermostatCoolingSetpoint", Capability::Thermostat),
        ("thermostatOperatingState", Capability::Thermostat),
        ("windowShadeLevel", Capability::Shade),
        ("holdableButton", Capability::Button),
    ],
);

/// `(native capability, native attribute) → unified attribute` where the
/// names differ.
const ATTRIBUTE_RENAMES: &[(&str, &str, &str)] = &[
    ("thermostatMode", "thermostatMode", "mode"),
    ("thermostat", "thermostatMode", "mode"),
    ("thermostatOperatingState", "thermostatOperatingState", "operatingState"),
    ("thermostat", "thermostatOperatingState", "operatingState"),
    ("windowShade", "windowShade", "state"),
    ("windowShadeLevel", "shadeLevel", "position"),
    ("fanSpeed", "fanSpeed", "speed"),
    ("relativeHumidityMeasurement", "humidity", "humidity"),
];

/// SmartThings fan speeds are discrete steps 0 (off) to 4 (max).
const FAN_STEPS: f64 = 4.0;

/// Translate one attribute reading into a unified `(capability, attribute,
/// value)` triple. Returns `None` for unmapped capabilities or attributes
/// and for values that cannot take the attribute's declared kind.
pub fn translate_attribute(
    native_capability: &str,
    native_attribute: &str,
    value: &Value,
) -> Option<(Capability, &'static str, StateValue)> {
    let capability = TABLE.to_universal(native_capability)?;
    let name = ATTRIBUTE_RENAMES
        .iter()
        .find(|(cap, attr, _)| *cap == native_capability && *attr == native_attribute)
        .map_or(native_attribute, |(_, _, unified)| *unified);
    let spec = capability.attribute(name)?;
    let value = if capability == Capability::Fan && spec.name == "speed" {
        fan_step_to_percent(value)?
    } else {
        StateValue::coerce(value, spec.kind)?
    };
    Some((capability, spec.name, value))
}

fn fan_step_to_percent(value: &Value) -> Option<StateValue> {
    let step = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    #[allow(clippy::cast_possible_truncation)]
    let percent = (step.clamp(0.0, FAN_STEPS) * 100.0 / FAN_STEPS).round() as i64;
    Some(StateValue::Int(percent))
}

/// A command in SmartThings' wire vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeCommand {
    pub capability: &'static str,
    pub command: String,
    pub arguments: Vec<Value>,
}

/// Translate a validated unified command. `native` is the canonical native
/// capability; a few commands live on a sibling capability instead.
///
/// # Errors
///
/// Returns an `InvalidCommand` error when a numeric parameter is not a
/// number.
pub fn translate_command(
    native: &'static str,
    command: &DeviceCommand,
) -> Result<NativeCommand, DeviceError> {
    let number = |name: &str| {
        command.number_parameter(name).ok_or_else(|| {
            DeviceError::invalid_command(format!(
                "parameter `{name}` of `{}.{}` must be numeric",
                command.capability, command.command
            ))
        })
    };
    let native_command = |capability: &'static str, name: &str, arguments: Vec<Value>| {
        NativeCommand {
            capability,
            command: name.to_string(),
            arguments,
        }
    };

    let translated = match (command.capability, command.command.as_str()) {
        (Capability::Shade, "setPosition") => native_command(
            "windowShadeLevel",
            "setShadeLevel",
            vec![json!(percent(number("position")?))],
        ),
        (Capability::Thermostat, "setHeatingSetpoint") => native_command(
            "thermostatHeatingSetpoint",
            "setHeatingSetpoint",
            vec![json!(number("setpoint")?)],
        ),
        (Capability::Thermostat, "setCoolingSetpoint") => native_command(
            "thermostatCoolingSetpoint",
            "setCoolingSetpoint",
            vec![json!(number("setpoint")?)],
        ),
        (Capability::Fan, "setSpeed") => {
            #[allow(clippy::cast_possible_truncation)]
            let step = (f64::from(percent(number("speed")?)) * FAN_STEPS / 100.0).round() as i64;
            native_command(native, "setFanSpeed", vec![json!(step)])
        }
        (Capability::Dimmer, "setLevel") => {
            native_command(native, "setLevel", vec![json!(percent(number("level")?))])
        }
        (Capability::Color, "setColor") => native_command(
            native,
            "setColor",
            vec![json!({ "hue": number("hue")?, "saturation": number("saturation")? })],
        ),
        (capability, name) => {
            let arguments = capability
                .command(name)
                .map(|spec| {
                    spec.parameters
                        .iter()
                        .filter_map(|param| command.parameter(param).cloned())
                        .collect()
                })
                .unwrap_or_default();
            native_command(native, name, arguments)
        }
    };
    Ok(translated)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}
