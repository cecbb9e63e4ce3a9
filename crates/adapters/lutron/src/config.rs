//! Lutron adapter configuration.

use std::path::PathBuf;
use std::time::Duration;

use omnihub_app::retry::RetryPolicy;
use omnihub_domain::error::DeviceError;
use omnihub_domain::platform::Platform;
use serde::Deserialize;

/// LEAP port on Caséta and RA2 Select bridges.
pub const DEFAULT_PORT: u16 = 8081;

/// Configuration for the Lutron bridge adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LutronConfig {
    /// Bridge hostname or IP address. Required.
    pub host: Option<String>,
    pub port: u16,
    /// CA certificate that signed the bridge certificate (PEM).
    pub ca_cert_path: Option<PathBuf>,
    /// Client certificate obtained during pairing (PEM).
    pub client_cert_path: Option<PathBuf>,
    /// Private key of the client certificate (PEM).
    pub client_key_path: Option<PathBuf>,
    /// Bound on connect and on every request/response round trip.
    pub request_timeout_secs: u64,
    pub reconnect: ReconnectPolicy,
    pub retry: RetryPolicy,
}

impl Default for LutronConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            ca_cert_path: None,
            client_cert_path: None,
            client_key_path: None,
            request_timeout_secs: 10,
            reconnect: ReconnectPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Automatic reconnection after an unexpected disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts before the connection is declared failed.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect `attempt` (1-based): doubles each time, capped.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Certificate bundle locations, once validated as present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub ca: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

impl LutronConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check the fields every connection mode needs.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error for a zero timeout or a zero
    /// reconnect ceiling.
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.request_timeout_secs == 0 {
            return Err(invalid("lutron.request_timeout_secs must be positive"));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(invalid("lutron.reconnect.max_attempts must be positive"));
        }
        Ok(())
    }

    /// Host and certificate paths needed for a TLS connection.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error naming the first missing field.
    pub fn tls_target(&self) -> Result<(&str, CertificatePaths), DeviceError> {
        let host = self
            .host
            .as_deref()
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| invalid("lutron.host is required"))?;
        let require = |path: &Option<PathBuf>, field: &str| {
            path.clone()
                .ok_or_else(|| invalid(&format!("lutron.{field} is required")))
        };
        Ok((
            host,
            CertificatePaths {
                ca: require(&self.ca_cert_path, "ca_cert_path")?,
                client_cert: require(&self.client_cert_path, "client_cert_path")?,
                client_key: require(&self.client_key_path, "client_key_path")?,
            },
        ))
    }
}

fn invalid(message: &str) -> DeviceError {
    DeviceError::configuration(message)
        .with_platform(Platform::Lutron)
        .with_operation("initialize")
}
