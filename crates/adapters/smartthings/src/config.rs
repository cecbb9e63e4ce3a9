//! SmartThings adapter configuration.

use std::time::Duration;

use omnihub_app::retry::RetryPolicy;
use omnihub_domain::error::DeviceError;
use omnihub_domain::platform::Platform;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// Configuration for the SmartThings adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmartThingsConfig {
    /// Personal access token or OAuth bearer token. Required.
    pub token: Option<SecretString>,
    /// API root; every endpoint path is joined onto it.
    pub base_url: String,
    /// Restrict discovery to one location.
    pub location_id: Option<String>,
    /// Per-request HTTP timeout, in seconds.
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for SmartThingsConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: "https://api.smartthings.com/v1/".to_string(),
            location_id: None,
            request_timeout_secs: 15,
            retry: RetryPolicy::default(),
        }
    }
}

impl SmartThingsConfig {
    /// Config with a token and defaults for everything else.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(SecretString::from(token.into())),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the token is missing or blank,
    /// the base URL does not parse, or the request timeout is zero.
    pub fn validate(&self) -> Result<Url, DeviceError> {
        let invalid = |message: String| {
            DeviceError::configuration(message)
                .with_platform(Platform::SmartThings)
                .with_operation("initialize")
        };
        if self
            .token
            .as_ref()
            .is_none_or(|token| token.expose_secret().trim().is_empty())
        {
            return Err(invalid("smartthings.token is required".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid(
                "smartthings.request_timeout_secs must be positive".to_string(),
            ));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| invalid(format!("smartthings.base_url is invalid: {err}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use omnihub_domain::error::ErrorKind;

    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = SmartThingsConfig::default();
        assert!(config.token.is_none());
        assert_eq!(config.base_url, "https://api.smartthings.com/v1/");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            token = "abc"
            location_id = "home"
            request_timeout_secs = 5

            [retry]
            max_retries = 1
        "#;
        let config: SmartThingsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.token.unwrap().expose_secret(), "abc");
        assert_eq!(config.location_id.as_deref(), Some("home"));
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn should_reject_missing_token() {
        let err = SmartThingsConfig::default().validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn should_reject_blank_token_and_bad_url() {
        assert!(SmartThingsConfig::with_token("  ").validate().is_err());

        let config = SmartThingsConfig {
            base_url: "not a url".to_string(),
            ..SmartThingsConfig::with_token("abc")
        };
        assert_eq!(
            config.validate().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn should_normalize_base_url_with_trailing_slash() {
        let config = SmartThingsConfig {
            base_url: "http://localhost:8080/v1".to_string(),
            ..SmartThingsConfig::with_token("abc")
        };
        assert_eq!(config.validate().unwrap().as_str(), "http://localhost:8080/v1/");
    }

    #[test]
    fn should_not_leak_token_in_debug_output() {
        let config = SmartThingsConfig::with_token("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
