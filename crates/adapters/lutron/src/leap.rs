//! LEAP wire format: one JSON communiqué per line.
//!
//! Only the subset used by the adapter is modelled. Unknown fields are
//! ignored so firmware updates that add fields do not break decoding.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::LutronError;

/// Endpoint answering pings on every bridge generation.
pub const PING_URL: &str = "/server/1/status/ping";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommuniqueType {
    ReadRequest,
    ReadResponse,
    CreateRequest,
    CreateResponse,
    UpdateRequest,
    UpdateResponse,
    SubscribeRequest,
    SubscribeResponse,
    ExceptionResponse,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_tag: Option<String>,
    /// e.g. `"200 OK"`, `"404 NotFound"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_body_type: Option<String>,
}

/// One LEAP message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Communique {
    pub communique_type: CommuniqueType,
    #[serde(default)]
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl Communique {
    fn request(communique_type: CommuniqueType, url: impl Into<String>) -> Self {
        Self {
            communique_type,
            header: Header {
                url: Some(url.into()),
                ..Header::default()
            },
            body: None,
        }
    }

    #[must_use]
    pub fn read(url: impl Into<String>) -> Self {
        Self::request(CommuniqueType::ReadRequest, url)
    }

    #[must_use]
    pub fn subscribe(url: impl Into<String>) -> Self {
        Self::request(CommuniqueType::SubscribeRequest, url)
    }

    #[must_use]
    pub fn create(url: impl Into<String>, body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::request(CommuniqueType::CreateRequest, url)
        }
    }

    #[must_use]
    pub fn ping() -> Self {
        Self::read(PING_URL)
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.header.client_tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        self.header.url.as_deref().unwrap_or_default()
    }

    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.header.client_tag.as_deref()
    }

    /// Numeric status and reason phrase, when the header carries one.
    #[must_use]
    pub fn status(&self) -> Option<(u16, &str)> {
        let raw = self.header.status_code.as_deref()?.trim();
        let (code, reason) = raw.split_once(' ').unwrap_or((raw, ""));
        Some((code.parse().ok()?, reason.trim()))
    }

    /// Turn exception responses and non-2xx statuses into errors.
    ///
    /// # Errors
    ///
    /// Returns [`LutronError::Status`] carrying the status and the bridge's
    /// message, if any.
    pub fn into_result(self) -> Result<Self, LutronError> {
        let status = self.status();
        let failed = self.communique_type == CommuniqueType::ExceptionResponse
            || status.is_some_and(|(code, _)| !(200..300).contains(&code));
        if !failed {
            return Ok(self);
        }
        let (code, reason) = status.unwrap_or((500, "ExceptionResponse"));
        let message = self
            .body
            .as_ref()
            .and_then(|body| body.get("Message"))
            .and_then(Value::as_str)
            .unwrap_or(reason)
            .to_string();
        Err(LutronError::Status {
            url: self.url().to_string(),
            code,
            message,
        })
    }

    /// Decode `Body.<key>`.
    ///
    /// # Errors
    ///
    /// Returns [`LutronError::UnexpectedResponse`] when the key is absent and
    /// [`LutronError::Json`] when it has the wrong shape.
    pub fn body_field<T: DeserializeOwned>(&self, key: &str) -> Result<T, LutronError> {
        let value = self
            .body
            .as_ref()
            .and_then(|body| body.get(key))
            .ok_or_else(|| {
                LutronError::UnexpectedResponse(format!("{} has no `{key}` body", self.url()))
            })?;
        Ok(T::deserialize(value)?)
    }
}

/// Reference to another resource, e.g. `{"href": "/area/3"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Href {
    pub href: String,
}

impl Href {
    /// Id segment following `kind`, e.g. `"3"` for `/area/3` and `"area"`.
    #[must_use]
    pub fn id(&self, kind: &str) -> Option<&str> {
        id_after(&self.href, kind)
    }
}

/// Id segment following `/{kind}/` in an href.
#[must_use]
pub fn id_after<'a>(href: &'a str, kind: &str) -> Option<&'a str> {
    let mut segments = href.split('/').filter(|segment| !segment.is_empty());
    segments.find(|segment| *segment == kind)?;
    segments.next()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceDefinition {
    #[serde(rename = "href")]
    pub href: String,
    pub name: String,
    pub device_type: String,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default)]
    pub serial_number: Option<Value>,
    #[serde(default)]
    pub local_zones: Vec<Href>,
    #[serde(default)]
    pub associated_area: Option<Href>,
    #[serde(default)]
    pub button_groups: Vec<Href>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AreaDefinition {
    #[serde(rename = "href")]
    pub href: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<Href>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ZoneDefinition {
    #[serde(rename = "href")]
    pub href: String,
    #[serde(default)]
    pub name: Option<String>,
    pub control_type: String,
    #[serde(default)]
    pub device: Option<Href>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ZoneStatus {
    pub zone: Href,
    #[serde(default)]
    pub level: Option<f64>,
    #[serde(default)]
    pub fan_speed: Option<FanSpeed>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OccupancyGroupDefinition {
    #[serde(rename = "href")]
    pub href: String,
    #[serde(default)]
    pub associated_areas: Vec<AssociatedArea>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssociatedArea {
    pub area: Href,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OccupancyGroupStatus {
    pub occupancy_group: Href,
    pub occupancy_status: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ButtonDefinition {
    #[serde(rename = "href")]
    pub href: String,
    /// The button group the button belongs to.
    #[serde(default)]
    pub parent: Option<Href>,
    #[serde(default)]
    pub button_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ButtonStatus {
    pub button: Href,
    pub button_event: ButtonEvent,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ButtonEvent {
    pub event_type: String,
}

/// Discrete fan speeds of the Caséta fan controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FanSpeed {
    Off,
    Low,
    Medium,
    MediumHigh,
    High,
}

impl FanSpeed {
    pub const ALL: [Self; 5] = [
        Self::Off,
        Self::Low,
        Self::Medium,
        Self::MediumHigh,
        Self::High,
    ];

    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 25,
            Self::Medium => 50,
            Self::MediumHigh => 75,
            Self::High => 100,
        }
    }

    /// Nearest discrete speed to a percentage. Ties resolve to the slower
    /// speed.
    #[must_use]
    pub fn nearest(percent: f64) -> Self {
        let target = percent.clamp(0.0, 100.0);
        Self::ALL
            .into_iter()
            .min_by(|a, b| {
                let da = (f64::from(a.percent()) - target).abs();
                let db = (f64::from(b.percent()) - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(Self::Off)
    }
}

/// A `commandprocessor` instruction for one zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoneCommand {
    GoToLevel(u8),
    GoToFanSpeed(FanSpeed),
    Raise,
    Lower,
    Stop,
}

impl ZoneCommand {
    /// `CreateRequest` on `/zone/{zone_id}/commandprocessor`.
    #[must_use]
    pub fn to_communique(self, zone_id: &str) -> Communique {
        let command = match self {
            Self::GoToLevel(level) => json!({
                "CommandType": "GoToLevel",
                "Parameter": [{"Type": "Level", "Value": level}],
            }),
            Self::GoToFanSpeed(speed) => json!({
                "CommandType": "GoToFanSpeed",
                "FanSpeedParameters": {"FanSpeed": speed},
            }),
            Self::Raise => json!({"CommandType": "Raise"}),
            Self::Lower => json!({"CommandType": "Lower"}),
            Self::Stop => json!({"CommandType": "Stop"}),
        };
        Communique::create(
            format!("/zone/{zone_id}/commandprocessor"),
            json!({ "Command": command }),
        )
    }
}

/// Unsolicited update delivered on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    Zones(Vec<ZoneStatus>),
    Occupancy(Vec<OccupancyGroupStatus>),
    Button(ButtonStatus),
}

impl PushEvent {
    /// Classify a message body. `Ok(None)` for bodies that are not events.
    ///
    /// # Errors
    ///
    /// Returns [`LutronError::Json`] when a recognised event is malformed.
    pub fn parse(message: &Communique) -> Result<Option<Self>, LutronError> {
        let Some(body) = message.body.as_ref() else {
            return Ok(None);
        };
        if let Some(status) = body.get("ZoneStatus") {
            return Ok(Some(Self::Zones(vec![ZoneStatus::deserialize(status)?])));
        }
        if let Some(statuses) = body.get("ZoneStatuses") {
            return Ok(Some(Self::Zones(Vec::deserialize(statuses)?)));
        }
        if let Some(status) = body.get("OccupancyGroupStatus") {
            return Ok(Some(Self::Occupancy(vec![OccupancyGroupStatus::deserialize(status)?])));
        }
        if let Some(statuses) = body.get("OccupancyGroupStatuses") {
            return Ok(Some(Self::Occupancy(Vec::deserialize(statuses)?)));
        }
        if let Some(status) = body.get("ButtonStatus") {
            return Ok(Some(Self::Button(ButtonStatus::deserialize(status)?)));
        }
        Ok(None)
    }
}
