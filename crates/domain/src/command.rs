//! Commands and their terminal results.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::{Capability, CommandSpec};
use crate::error::DeviceError;
use crate::id::{CorrelationId, UniversalDeviceId};
use crate::state::DeviceState;
use crate::time::{Timestamp, now};

/// A capability-scoped instruction. Pure data, no identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    pub capability: Capability,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
}

impl DeviceCommand {
    #[must_use]
    pub fn new(capability: Capability, command: impl Into<String>) -> Self {
        Self {
            capability,
            command: command.into(),
            parameters: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn switch_on() -> Self {
        Self::new(Capability::Switch, "on")
    }

    #[must_use]
    pub fn switch_off() -> Self {
        Self::new(Capability::Switch, "off")
    }

    #[must_use]
    pub fn set_level(level: u8) -> Self {
        Self::new(Capability::Dimmer, "setLevel").with_parameter("level", level)
    }

    #[must_use]
    pub fn set_fan_speed(speed: u8) -> Self {
        Self::new(Capability::Fan, "setSpeed").with_parameter("speed", speed)
    }

    #[must_use]
    pub fn set_shade_position(position: u8) -> Self {
        Self::new(Capability::Shade, "setPosition").with_parameter("position", position)
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Numeric parameter, accepting numbers or numeric strings.
    #[must_use]
    pub fn number_parameter(&self, name: &str) -> Option<f64> {
        match self.parameters.get(name)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Check the command name and required parameters against the
    /// capability's command contract.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidCommand` error when the capability does not define
    /// the command or a required parameter is missing.
    pub fn validate(&self) -> Result<&'static CommandSpec, DeviceError> {
        let spec = self.capability.command(&self.command).ok_or_else(|| {
            DeviceError::invalid_command(format!(
                "capability `{}` has no command `{}`",
                self.capability, self.command
            ))
        })?;
        if let Some(missing) = spec
            .parameters
            .iter()
            .find(|name| self.parameters.get(**name).is_none_or(Value::is_null))
        {
            return Err(DeviceError::invalid_command(format!(
                "command `{}.{}` requires parameter `{missing}`",
                self.capability, self.command
            )));
        }
        Ok(spec)
    }
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCommand {
    pub device_id: UniversalDeviceId,
    pub command: DeviceCommand,
}

impl BatchCommand {
    #[must_use]
    pub fn new(device_id: UniversalDeviceId, command: DeviceCommand) -> Self {
        Self { device_id, command }
    }
}

/// Terminal outcome of one command. Never updated after it is returned.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub device_id: UniversalDeviceId,
    pub command: DeviceCommand,
    pub executed_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceError>,
    /// Confirmed state read back after success, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_state: Option<DeviceState>,
    pub retry_count: u32,
    pub duration: Duration,
    pub correlation_id: CorrelationId,
}

impl CommandResult {
    #[must_use]
    pub fn succeeded(device_id: UniversalDeviceId, command: DeviceCommand) -> Self {
        Self {
            success: true,
            device_id,
            command,
            executed_at: now(),
            error: None,
            new_state: None,
            retry_count: 0,
            duration: Duration::ZERO,
            correlation_id: CorrelationId::new(),
        }
    }

    #[must_use]
    pub fn failed(device_id: UniversalDeviceId, command: DeviceCommand, error: DeviceError) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::succeeded(device_id, command)
        }
    }

    #[must_use]
    pub fn with_new_state(mut self, state: DeviceState) -> Self {
        self.new_state = Some(state);
        self
    }

    #[must_use]
    pub fn with_timing(mut self, executed_at: Timestamp, duration: Duration) -> Self {
        self.executed_at = executed_at;
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}
