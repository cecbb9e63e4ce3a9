//! Error taxonomy shared across the workspace.
//!
//! Failures are categorized rather than typed per failure site: every
//! [`DeviceError`] carries an [`ErrorKind`] whose retryability and
//! [`Severity`] are fixed at construction, so callers can make retry and
//! display decisions generically.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::id::UniversalDeviceId;
use crate::platform::Platform;

/// Violations of domain invariants detected while building or parsing values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("malformed universal device id `{0}`, expected `platform:id`")]
    MalformedDeviceId(String),

    #[error("unknown platform `{0}`")]
    UnknownPlatform(String),

    #[error("unknown capability `{0}`")]
    UnknownCapability(String),
}

/// The closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    DeviceNotFound,
    CapabilityNotSupported,
    InvalidCommand,
    Configuration,
    Network,
    Timeout,
    RateLimit,
    DeviceOffline,
    StateSync,
    CommandExecution,
    NotSupported,
    Cancelled,
}

impl ErrorKind {
    /// Whether errors of this kind are worth retrying.
    ///
    /// [`CommandExecution`](Self::CommandExecution) depends on the wrapped
    /// platform error and is decided at construction instead; this returns
    /// `false` for it.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimit | Self::DeviceOffline | Self::StateSync
        )
    }

    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::Authentication | Self::Configuration => Severity::High,
            Self::DeviceNotFound
            | Self::Network
            | Self::Timeout
            | Self::RateLimit
            | Self::DeviceOffline
            | Self::CommandExecution => Severity::Medium,
            Self::CapabilityNotSupported
            | Self::InvalidCommand
            | Self::NotSupported
            | Self::StateSync
            | Self::Cancelled => Severity::Low,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::DeviceNotFound => "device_not_found",
            Self::CapabilityNotSupported => "capability_not_supported",
            Self::InvalidCommand => "invalid_command",
            Self::Configuration => "configuration",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::RateLimit => "rate_limit",
            Self::DeviceOffline => "device_offline",
            Self::StateSync => "state_sync",
            Self::CommandExecution => "command_execution",
            Self::NotSupported => "not_supported",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How badly an error impairs the adapter that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    /// The adapter cannot function until someone intervenes.
    High,
}

/// Structured diagnostics attached to a [`DeviceError`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub platform: Option<Platform>,
    pub operation: Option<String>,
    pub device_id: Option<UniversalDeviceId>,
    /// Platform-native error code, when the platform reported one.
    pub platform_code: Option<String>,
}

type SharedSource = Arc<dyn StdError + Send + Sync>;

/// A categorized failure.
///
/// Retryability and severity are computed once from the kind and never
/// change afterwards; the builder-style `with_*` methods only enrich the
/// diagnostic context.
#[derive(Debug, Clone)]
pub struct DeviceError {
    kind: ErrorKind,
    message: String,
    retryable: bool,
    severity: Severity,
    retry_after: Option<Duration>,
    context: ErrorContext,
    source: Option<SharedSource>,
}

impl DeviceError {
    /// Build an error of the given kind with the kind's default policy.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: kind.is_retryable(),
            severity: kind.severity(),
            retry_after: None,
            context: ErrorContext::default(),
            source: None,
        }
    }

    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    #[must_use]
    pub fn device_not_found(id: &UniversalDeviceId) -> Self {
        Self::new(ErrorKind::DeviceNotFound, format!("device {id} not found"))
            .with_device(id.clone())
    }

    #[must_use]
    pub fn capability_not_supported(capability: Capability, id: &UniversalDeviceId) -> Self {
        Self::new(
            ErrorKind::CapabilityNotSupported,
            format!("device {id} does not support capability `{capability}`"),
        )
        .with_device(id.clone())
    }

    #[must_use]
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCommand, message)
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("operation timed out after {}ms", after.as_millis()),
        )
    }

    /// Rate limited by the platform, optionally with the platform-provided
    /// delay before the next attempt is allowed.
    #[must_use]
    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        let message = match retry_after {
            Some(delay) => format!("rate limited, retry after {}ms", delay.as_millis()),
            None => "rate limited".to_string(),
        };
        let mut err = Self::new(ErrorKind::RateLimit, message);
        err.retry_after = retry_after;
        err
    }

    #[must_use]
    pub fn device_offline(id: &UniversalDeviceId) -> Self {
        Self::new(ErrorKind::DeviceOffline, format!("device {id} is offline"))
            .with_device(id.clone())
    }

    #[must_use]
    pub fn state_sync(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StateSync, message)
    }

    /// A platform rejected or failed a command. `transient` is the platform's
    /// own judgement of whether the same call may succeed later.
    #[must_use]
    pub fn command_execution(message: impl Into<String>, transient: bool) -> Self {
        let mut err = Self::new(ErrorKind::CommandExecution, message);
        err.retryable = transient;
        err
    }

    #[must_use]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, message)
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.context.platform = Some(platform);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn with_device(mut self, id: UniversalDeviceId) -> Self {
        self.context.device_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_platform_code(mut self, code: impl Into<String>) -> Self {
        self.context.platform_code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Fill in context fields that are still unset, keeping anything the
    /// failure site already recorded.
    #[must_use]
    pub fn in_context(mut self, platform: Platform, operation: &str) -> Self {
        self.context.platform.get_or_insert(platform);
        if self.context.operation.is_none() {
            self.context.operation = Some(operation.to_string());
        }
        self
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Platform-provided delay before retrying. Only set on
    /// [`ErrorKind::RateLimit`] errors.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for DeviceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

impl From<ValidationError> for DeviceError {
    fn from(err: ValidationError) -> Self {
        Self::invalid_command(err.to_string()).with_source(err)
    }
}

impl Serialize for DeviceError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Repr<'a> {
            kind: ErrorKind,
            message: &'a str,
            retryable: bool,
            severity: Severity,
            #[serde(skip_serializing_if = "Option::is_none")]
            retry_after_ms: Option<u128>,
            context: &'a ErrorContext,
        }

        Repr {
            kind: self.kind,
            message: &self.message,
            retryable: self.retryable,
            severity: self.severity,
            retry_after_ms: self.retry_after.map(|d| d.as_millis()),
            context: &self.context,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [ErrorKind; 13] = [
        ErrorKind::Authentication,
        ErrorKind::DeviceNotFound,
        ErrorKind::CapabilityNotSupported,
        ErrorKind::InvalidCommand,
        ErrorKind::Configuration,
        ErrorKind::Network,
        ErrorKind::Timeout,
        ErrorKind::RateLimit,
        ErrorKind::DeviceOffline,
        ErrorKind::StateSync,
        ErrorKind::CommandExecution,
        ErrorKind::NotSupported,
        ErrorKind::Cancelled,
    ];

    #[test]
    fn should_mark_permanent_kinds_as_not_retryable() {
        for kind in [
            ErrorKind::Authentication,
            ErrorKind::DeviceNotFound,
            ErrorKind::CapabilityNotSupported,
            ErrorKind::InvalidCommand,
            ErrorKind::Configuration,
            ErrorKind::Cancelled,
        ] {
            assert!(!DeviceError::new(kind, "x").is_retryable(), "{kind}");
        }
    }

    #[test]
    fn should_mark_transient_kinds_as_retryable() {
        for kind in [
            ErrorKind::Network,
            ErrorKind::Timeout,
            ErrorKind::RateLimit,
            ErrorKind::DeviceOffline,
            ErrorKind::StateSync,
        ] {
            assert!(DeviceError::new(kind, "x").is_retryable(), "{kind}");
        }
    }

    #[test]
    fn should_follow_platform_transience_for_command_execution() {
        assert!(DeviceError::command_execution("busy", true).is_retryable());
        assert!(!DeviceError::command_execution("rejected", false).is_retryable());
    }

    #[test]
    fn should_assign_severity_by_kind() {
        assert_eq!(ErrorKind::Authentication.severity(), Severity::High);
        assert_eq!(ErrorKind::Configuration.severity(), Severity::High);
        assert_eq!(ErrorKind::DeviceNotFound.severity(), Severity::Medium);
        assert_eq!(ErrorKind::RateLimit.severity(), Severity::Medium);
        assert_eq!(ErrorKind::CommandExecution.severity(), Severity::Medium);
        assert_eq!(ErrorKind::CapabilityNotSupported.severity(), Severity::Low);
        assert_eq!(ErrorKind::NotSupported.severity(), Severity::Low);
        assert_eq!(ErrorKind::StateSync.severity(), Severity::Low);
    }

    #[test]
    fn should_keep_policy_when_context_is_added() {
        for kind in ALL_KINDS {
            let err = DeviceError::new(kind, "x");
            let enriched = err
                .clone()
                .with_platform(Platform::Lutron)
                .with_operation("get_device")
                .with_platform_code("E42");
            assert_eq!(enriched.kind(), err.kind());
            assert_eq!(enriched.is_retryable(), err.is_retryable());
            assert_eq!(enriched.severity(), err.severity());
        }
    }

    #[test]
    fn should_carry_retry_after_only_for_rate_limit() {
        let err = DeviceError::rate_limit(Some(Duration::from_secs(2)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(DeviceError::network("down").retry_after(), None);
    }

    #[test]
    fn should_not_overwrite_context_set_at_failure_site() {
        let err = DeviceError::network("down")
            .with_operation("list_rooms")
            .in_context(Platform::SmartThings, "list_devices");
        assert_eq!(err.context().operation.as_deref(), Some("list_rooms"));
        assert_eq!(err.context().platform, Some(Platform::SmartThings));
    }

    #[test]
    fn should_expose_source_error() {
        let io = std::io::Error::other("socket closed");
        let err = DeviceError::network("bridge unreachable").with_source(io);
        assert_eq!(err.source().unwrap().to_string(), "socket closed");
    }

    #[test]
    fn should_display_kind_and_message() {
        let err = DeviceError::configuration("missing token");
        assert_eq!(err.to_string(), "configuration: missing token");
    }

    #[test]
    fn should_convert_validation_error_to_invalid_command() {
        let err: DeviceError = ValidationError::UnknownPlatform("hue".into()).into();
        assert_eq!(err.kind(), ErrorKind::InvalidCommand);
    }

    #[test]
    fn should_serialize_policy_and_context() {
        let err = DeviceError::rate_limit(Some(Duration::from_millis(1500)))
            .with_platform(Platform::SmartThings);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "rate_limit");
        assert_eq!(json["retryable"], true);
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["retry_after_ms"], 1500);
        assert_eq!(json["context"]["platform"], "smartthings");
    }
}
