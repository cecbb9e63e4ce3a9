//! Zone control types ⇄ universal capabilities, and command translation.

use omnihub_app::capability_map::CapabilityTable;
use omnihub_domain::capability::Capability;
use omnihub_domain::command::DeviceCommand;
use omnihub_domain::error::DeviceError;

use crate::leap::{FanSpeed, ZoneCommand};

/// Zone `ControlType`s plus the device types that have no zone.
pub const TABLE: CapabilityTable = CapabilityTable::new(
    &[
        ("Switched", Capability::Switch),
        ("Dimmed", Capability::Dimmer),
        ("FanSpeed", Capability::Fan),
        ("Shade", Capability::Shade),
        ("OccupancySensor", Capability::OccupancySensor),
        ("Pico", Capability::Button),
    ],
    &[
        ("CCO", Capability::Switch),
        ("WhiteTune", Capability::Dimmer),
        ("SpectrumTune", Capability::Dimmer),
        ("ColorTune", Capability::Dimmer),
    ],
);

/// Capabilities exposed by a zone of the given control type. Dimmable zones
/// also answer on/off.
#[must_use]
pub fn zone_capabilities(control_type: &str) -> Vec<Capability> {
    match TABLE.to_universal(control_type) {
        Some(Capability::Dimmer) => vec![Capability::Switch, Capability::Dimmer],
        Some(capability) => vec![capability],
        None => {
            tracing::debug!(control_type, "dropping unmapped zone control type");
            Vec::new()
        }
    }
}

/// Translate a validated unified command for the zone's native capability.
///
/// # Errors
///
/// Returns an `InvalidCommand` error for commands the zone cannot express or
/// non-numeric parameters.
pub fn translate_command(native: &str, command: &DeviceCommand) -> Result<ZoneCommand, DeviceError> {
    let zone_command = match (native, command.command.as_str()) {
        ("Switched" | "Dimmed", "on") => ZoneCommand::GoToLevel(100),
        ("Switched" | "Dimmed", "off") => ZoneCommand::GoToLevel(0),
        ("Dimmed", "setLevel") => ZoneCommand::GoToLevel(percent(command, "level")?),
        ("FanSpeed", "setSpeed") => {
            ZoneCommand::GoToFanSpeed(FanSpeed::nearest(f64::from(percent(command, "speed")?)))
        }
        ("Shade", "open") => ZoneCommand::Raise,
        ("Shade", "close") => ZoneCommand::Lower,
        ("Shade", "pause") => ZoneCommand::Stop,
        ("Shade", "setPosition") => ZoneCommand::GoToLevel(percent(command, "position")?),
        (_, name) => {
            return Err(DeviceError::invalid_command(format!(
                "`{}.{name}` has no Lutron equivalent",
                command.capability
            )));
        }
    };
    Ok(zone_command)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(command: &DeviceCommand, name: &str) -> Result<u8, DeviceError> {
    command
        .number_parameter(name)
        .filter(|value| value.is_finite())
        .map(|value| value.round().clamp(0.0, 100.0) as u8)
        .ok_or_else(|| DeviceError::invalid_command(format!("parameter `{name}` must be a number")))
}
