//! SmartThings adapter errors.

use std::time::Duration;

use omnihub_domain::error::{DeviceError, ErrorKind};
use omnihub_domain::platform::Platform;

/// Errors raised while talking to the SmartThings REST API.
#[derive(Debug, thiserror::Error)]
pub enum SmartThingsError {
    /// The configured token cannot be sent as a header value.
    #[error("access token contains characters not allowed in a header")]
    InvalidToken,

    /// Building a request URL failed.
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Transport-level failure: connect, TLS, timeout, body read.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("SmartThings API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// The body did not match the expected shape.
    #[error("failed to decode SmartThings response: {message}")]
    Decode { message: String, body: String },

    /// The API accepted the request but reported a failed command.
    #[error("command rejected by device: {0}")]
    CommandFailed(String),
}

impl SmartThingsError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Api { status, .. } => matches!(*status, 408 | 425 | 429 | 500..),
            Self::InvalidToken | Self::InvalidUrl(_) | Self::Decode { .. } | Self::CommandFailed(_) => {
                false
            }
        }
    }

    /// Convert into the platform-independent [`DeviceError`].
    #[must_use]
    pub fn into_domain(self) -> DeviceError {
        let transient = self.is_transient();
        let error = match &self {
            Self::InvalidToken | Self::InvalidUrl(_) => DeviceError::configuration(self.to_string()),
            Self::Transport(err) if err.is_timeout() => {
                DeviceError::new(ErrorKind::Timeout, self.to_string())
            }
            Self::Transport(_) => DeviceError::network(self.to_string()),
            Self::Api {
                status,
                code,
                message,
                retry_after,
            } => {
                let error = classify_status(*status, message, *retry_after, transient);
                error.with_platform_code(code.clone().unwrap_or_else(|| status.to_string()))
            }
            Self::Decode { .. } => DeviceError::state_sync(self.to_string()),
            Self::CommandFailed(message) => {
                DeviceError::command_execution(message.clone(), transient)
            }
        };
        error.with_platform(Platform::SmartThings).with_source(self)
    }
}

fn classify_status(
    status: u16,
    message: &str,
    retry_after: Option<Duration>,
    transient: bool,
) -> DeviceError {
    match status {
        401 | 403 => DeviceError::authentication(message),
        404 => DeviceError::new(ErrorKind::DeviceNotFound, message),
        409 => DeviceError::new(ErrorKind::DeviceOffline, message),
        400 | 422 => DeviceError::invalid_command(message),
        429 => DeviceError::rate_limit(retry_after),
        500.. => DeviceError::network(message),
        _ => DeviceError::command_execution(message, transient),
    }
}

impl From<SmartThingsError> for DeviceError {
    fn from(err: SmartThingsError) -> Self {
        err.into_domain()
    }
}
