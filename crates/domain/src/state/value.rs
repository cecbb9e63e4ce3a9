//! Typed values stored under a state key.

use serde::{Deserialize, Serialize};

use crate::capability::ValueKind;

/// A single typed attribute reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl StateValue {
    /// Convert a loosely-typed platform value into the kind the attribute
    /// contract declares. Returns `None` when the value cannot represent that
    /// kind (e.g. a non-numeric string for an integer attribute).
    #[must_use]
    pub fn coerce(value: &serde_json::Value, kind: ValueKind) -> Option<Self> {
        use serde_json::Value;

        match (kind, value) {
            (_, Value::Null) => None,
            (ValueKind::Bool, Value::Bool(b)) => Some(Self::Bool(*b)),
            (ValueKind::Bool, Value::String(s)) => s.parse().ok().map(Self::Bool),
            (ValueKind::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(round_to_i64))
                .map(Self::Int),
            (ValueKind::Integer, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .map(|f| Self::Int(round_to_i64(f))),
            (ValueKind::Number, Value::Number(n)) => n.as_f64().map(Self::Float),
            (ValueKind::Number, Value::String(s)) => s.trim().parse().ok().map(Self::Float),
            (ValueKind::Text, Value::String(s)) => Some(Self::String(s.clone())),
            (ValueKind::Text, Value::Bool(b)) => Some(Self::String(b.to_string())),
            (ValueKind::Text, Value::Number(n)) => Some(Self::String(n.to_string())),
            _ => None,
        }
    }

    /// Wrap a JSON value without a target kind, keeping scalars typed.
    #[must_use]
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map_or(Self::Json(Value::Number(n)), Self::Float),
            },
            Value::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integer and float values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_to_i64(value: f64) -> i64 {
    value.round() as i64
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
