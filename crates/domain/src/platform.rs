//! Registered platform identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A smart-home ecosystem that omnihub can talk to.
///
/// This is the closed set of values accepted as the platform segment of a
/// [`UniversalDeviceId`](crate::id::UniversalDeviceId).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Cloud-hosted device-control API (bearer token, REST).
    SmartThings,
    /// Local certificate-secured bridge (mutual TLS, push events).
    Lutron,
}

impl Platform {
    /// Every registered platform.
    pub const ALL: [Self; 2] = [Self::SmartThings, Self::Lutron];

    /// Stable identifier used in universal device ids and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartThings => "smartthings",
            Self::Lutron => "lutron",
        }
    }

    /// Human-readable platform name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::SmartThings => "SmartThings",
            Self::Lutron => "Lutron Caséta",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|platform| platform.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownPlatform(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_every_registered_identifier() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.as_str().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn should_reject_unknown_identifier() {
        let result = Platform::from_str("hue");
        assert_eq!(
            result,
            Err(ValidationError::UnknownPlatform("hue".to_string()))
        );
    }

    #[test]
    fn should_be_case_sensitive() {
        assert!(Platform::from_str("SmartThings").is_err());
    }

    #[test]
    fn should_serialize_as_lowercase_identifier() {
        let json = serde_json::to_string(&Platform::SmartThings).unwrap();
        assert_eq!(json, "\"smartthings\"");
    }
}
