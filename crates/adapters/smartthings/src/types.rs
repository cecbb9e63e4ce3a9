//! Wire types for the SmartThings REST API.
//!
//! Only the fields the adapter reads are modelled; everything else is
//! ignored on deserialization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A page of a paginated collection.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub next: Option<Href>,
}

#[derive(Debug, Deserialize)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StDevice {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub presentation_id: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub components: Vec<StComponent>,
    #[serde(default)]
    pub ocf: Option<Ocf>,
    #[serde(default)]
    pub health_state: Option<StHealth>,
}

impl StDevice {
    /// Capability ids across every component.
    pub fn capability_ids(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .flat_map(|component| component.capabilities.iter())
            .map(|capability| capability.id.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StComponent {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityRef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapabilityRef {
    pub id: String,
    #[serde(default)]
    pub version: Option<u32>,
}

/// OCF metadata reported by Wi-Fi and hub-connected devices.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ocf {
    #[serde(default)]
    pub manufacturer_name: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StHealth {
    pub state: String,
    #[serde(default)]
    pub last_updated_date: Option<String>,
}

impl StHealth {
    pub fn is_online(&self) -> bool {
        self.state.eq_ignore_ascii_case("ONLINE")
    }
}

/// `component → capability → attribute → reading`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StDeviceStatus {
    #[serde(default)]
    pub components: BTreeMap<String, BTreeMap<String, BTreeMap<String, AttributeReading>>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttributeReading {
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StLocation {
    pub location_id: String,
    pub name: String,
    #[serde(default)]
    pub time_zone_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StRoom {
    pub room_id: String,
    pub name: String,
    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StScene {
    pub scene_id: String,
    #[serde(default)]
    pub scene_name: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommandsRequest {
    pub commands: Vec<StCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StCommand {
    pub component: String,
    pub capability: String,
    pub command: String,
    pub arguments: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommandsResponse {
    #[serde(default)]
    pub results: Vec<CommandOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct CommandOutcome {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
}

impl CommandOutcome {
    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case("FAILED")
    }
}

/// Error envelope returned with non-success statuses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub request_id: Option<String>,
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_device_with_components_and_ocf() {
        let json = serde_json::json!({
            "deviceId": "d-1",
            "label": "Kitchen Lamp",
            "name": "c2c-dimmer",
            "locationId": "loc",
            "roomId": "r-1",
            "type": "VIPER",
            "components": [
                {"id": "main", "capabilities": [{"id": "switch", "version": 1}, {"id": "switchLevel"}]},
                {"id": "extra", "capabilities": [{"id": "refresh"}]}
            ],
            "ocf": {"manufacturerName": "Acme", "modelNumber": "L-1", "firmwareVersion": "2.0"},
            "healthState": {"state": "ONLINE"}
        });
        let device: StDevice = serde_json::from_value(json).unwrap();
        let ids: Vec<_> = device.capability_ids().collect();
        assert_eq!(ids, ["switch", "switchLevel", "refresh"]);
        assert_eq!(device.ocf.unwrap().model_number.as_deref(), Some("L-1"));
        assert!(device.health_state.unwrap().is_online());
    }

    #[test]
    fn should_parse_page_without_next_link() {
        let json = r#"{"items": [], "_links": {"next": null}}"#;
        let page: Page<StDevice> = serde_json::from_str(json).unwrap();
        assert!(page.links.unwrap().next.is_none());
    }

    #[test]
    fn should_parse_nested_status() {
        let json = r#"{"components": {"main": {"switch": {"switch": {"value": "on", "timestamp": "2026-01-01T00:00:00Z"}}}}}"#;
        let status: StDeviceStatus = serde_json::from_str(json).unwrap();
        assert_eq!(status.components["main"]["switch"]["switch"].value, "on");
    }

    #[test]
    fn should_detect_failed_command_outcome() {
        let json = r#"{"results": [{"id": "x", "status": "ACCEPTED"}, {"id": "y", "status": "FAILED"}]}"#;
        let response: CommandsResponse = serde_json::from_str(json).unwrap();
        assert!(!response.results[0].is_failed());
        assert!(response.results[1].is_failed());
    }
}
