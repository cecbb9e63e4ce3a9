//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `omnihub.toml` in the working directory. Every field has a
//! default so the file is optional. An adapter runs only when its section
//! (`[smartthings]`, `[lutron]`) is present or an environment variable
//! supplies its required setting. Environment variables take precedence
//! over file values.

use secrecy::SecretString;
use serde::Deserialize;

use omnihub_adapter_lutron::LutronConfig;
use omnihub_adapter_smartthings::SmartThingsConfig;

/// Default location of the configuration file.
pub const CONFIG_FILE: &str = "omnihub.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SmartThings cloud adapter; absent means disabled.
    pub smartthings: Option<SmartThingsConfig>,
    /// Lutron bridge adapter; absent means disabled.
    pub lutron: Option<LutronConfig>,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "omnihubd=info,omnihub=info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `omnihub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or the
    /// merged configuration fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file(CONFIG_FILE)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("OMNIHUB_SMARTTHINGS_TOKEN") {
            self.smartthings.get_or_insert_with(SmartThingsConfig::default).token =
                Some(SecretString::from(token));
        }
        if let Some(host) = var("OMNIHUB_LUTRON_HOST") {
            self.lutron.get_or_insert_with(LutronConfig::default).host = Some(host);
        }
        if let Some(filter) = var("OMNIHUB_LOG") {
            self.logging.filter = filter;
        }
        if let Some(filter) = var("RUST_LOG") {
            self.logging.filter = filter;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.filter must not be empty".to_string(),
            ));
        }
        if let Some(lutron) = &self.lutron
            && lutron.port == 0
        {
            return Err(ConfigError::Validation(
                "lutron.port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether at least one adapter section is configured.
    #[must_use]
    pub fn has_adapters(&self) -> bool {
        self.smartthings.is_some() || self.lutron.is_some()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert!(config.smartthings.is_none());
        assert!(config.lutron.is_none());
        assert!(!config.has_adapters());
        assert_eq!(config.logging.filter, "omnihubd=info,omnihub=info");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert!(!config.has_adapters());
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [smartthings]
            token = 'pat-123'
            location_id = 'home'

            [lutron]
            host = '192.168.1.20'
            ca_cert_path = '/etc/omnihub/lutron-ca.crt'
            client_cert_path = '/etc/omnihub/lutron.crt'
            client_key_path = '/etc/omnihub/lutron.key'

            [lutron.reconnect]
            max_attempts = 8

            [logging]
            filter = 'debug'
        ";
        let config: Config = toml::from_str(toml).unwrap();

        let smartthings = config.smartthings.unwrap();
        assert_eq!(smartthings.token.unwrap().expose_secret(), "pat-123");
        assert_eq!(smartthings.location_id.as_deref(), Some("home"));

        let lutron = config.lutron.unwrap();
        assert_eq!(lutron.host.as_deref(), Some("192.168.1.20"));
        assert_eq!(lutron.port, 8081);
        assert_eq!(lutron.reconnect.max_attempts, 8);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert!(!config.has_adapters());
    }

    #[test]
    fn should_enable_adapters_from_environment() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("OMNIHUB_SMARTTHINGS_TOKEN", "env-token"),
            ("OMNIHUB_LUTRON_HOST", "10.0.0.5"),
        ]));

        let token = config.smartthings.as_ref().unwrap().token.as_ref().unwrap();
        assert_eq!(token.expose_secret(), "env-token");
        assert_eq!(
            config.lutron.as_ref().unwrap().host.as_deref(),
            Some("10.0.0.5")
        );
    }

    #[test]
    fn should_keep_file_settings_when_overriding_host() {
        let mut config: Config = toml::from_str("[lutron]\nport = 9443").unwrap();
        config.apply_overrides(env(&[("OMNIHUB_LUTRON_HOST", "bridge.local")]));

        let lutron = config.lutron.unwrap();
        assert_eq!(lutron.port, 9443);
        assert_eq!(lutron.host.as_deref(), Some("bridge.local"));
    }

    #[test]
    fn should_prefer_rust_log_over_omnihub_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("OMNIHUB_LOG", "warn"), ("RUST_LOG", "trace")]));
        assert_eq!(config.logging.filter, "trace");

        let mut config = Config::default();
        config.apply_overrides(env(&[("OMNIHUB_LOG", "warn")]));
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn should_reject_empty_filter() {
        let mut config = Config::default();
        config.logging.filter = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_zero_lutron_port() {
        let config: Config = toml::from_str("[lutron]\nport = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
