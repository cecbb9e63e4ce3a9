//! Lutron adapter errors.

use std::path::PathBuf;
use std::time::Duration;

use omnihub_domain::error::{DeviceError, ErrorKind};
use omnihub_domain::platform::Platform;

/// Errors raised while talking to a Lutron bridge.
#[derive(Debug, thiserror::Error)]
pub enum LutronError {
    /// A certificate or key file is missing or not structurally valid PEM.
    #[error("invalid certificate {path}: {reason}")]
    Certificate { path: PathBuf, reason: String },

    /// Building the TLS client configuration or the handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Socket-level failure.
    #[error("bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be encoded or decoded as a LEAP communiqué.
    #[error("malformed LEAP message: {0}")]
    Json(#[from] serde_json::Error),

    /// The bridge answered with a non-success status.
    #[error("bridge returned {code} for {url}: {message}")]
    Status {
        url: String,
        code: u16,
        message: String,
    },

    /// A response arrived without the body the request implies.
    #[error("unexpected bridge response: {0}")]
    UnexpectedResponse(String),

    /// No response within the request timeout.
    #[error("bridge did not answer within {0:?}")]
    Timeout(Duration),

    /// The session is closed or currently reconnecting.
    #[error("bridge connection is not available")]
    Disconnected,
}

impl LutronError {
    pub(crate) fn certificate(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Certificate {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Convert into the platform-independent [`DeviceError`].
    #[must_use]
    pub fn into_domain(self) -> DeviceError {
        let error = match &self {
            Self::Certificate { .. } => DeviceError::configuration(self.to_string()),
            Self::Tls(_) => DeviceError::authentication(self.to_string()),
            Self::Io(_) | Self::Disconnected => DeviceError::network(self.to_string()),
            Self::Json(_) | Self::UnexpectedResponse(_) => DeviceError::state_sync(self.to_string()),
            Self::Timeout(after) => DeviceError::timeout(*after),
            Self::Status { code, message, .. } => {
                classify_status(*code, message).with_platform_code(code.to_string())
            }
        };
        error.with_platform(Platform::Lutron).with_source(self)
    }
}

fn classify_status(code: u16, message: &str) -> DeviceError {
    match code {
        400 | 405 => DeviceError::invalid_command(message),
        401 | 403 => DeviceError::authentication(message),
        404 => DeviceError::new(ErrorKind::DeviceNotFound, message),
        500.. => DeviceError::command_execution(message, true),
        _ => DeviceError::command_execution(message, false),
    }
}

impl From<LutronError> for DeviceError {
    fn from(err: LutronError) -> Self {
        err.into_domain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> LutronError {
        LutronError::Status {
            url: "/zone/7/commandprocessor".to_string(),
            code,
            message: "Bad Request".to_string(),
        }
    }

    #[test]
    fn should_display_status_error_with_url() {
        assert_eq!(
            status(400).to_string(),
            "bridge returned 400 for /zone/7/commandprocessor: Bad Request"
        );
    }

    #[test]
    fn should_map_statuses_to_error_kinds() {
        let cases = [
            (400, ErrorKind::InvalidCommand),
            (401, ErrorKind::Authentication),
            (404, ErrorKind::DeviceNotFound),
            (500, ErrorKind::CommandExecution),
            (204, ErrorKind::CommandExecution),
        ];
        for (code, kind) in cases {
            let err = status(code).into_domain();
            assert_eq!(err.kind(), kind, "status {code}");
            assert_eq!(err.context().platform_code.as_deref(), Some(code.to_string().as_str()));
        }
    }

    #[test]
    fn should_retry_only_bridge_side_command_failures() {
        assert!(status(503).into_domain().is_retryable());
        assert!(!status(409).into_domain().is_retryable());
    }

    #[test]
    fn should_treat_connection_loss_as_retryable_network_error() {
        let err = LutronError::Disconnected.into_domain();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.is_retryable());
        assert_eq!(err.context().platform, Some(Platform::Lutron));
    }

    #[test]
    fn should_map_bad_certificates_to_configuration() {
        let err = LutronError::certificate("/tmp/ca.pem", "no certificate found").into_domain();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message().contains("/tmp/ca.pem"));
    }

    #[test]
    fn should_map_timeout_to_timeout_kind() {
        let err = LutronError::Timeout(Duration::from_secs(10)).into_domain();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
