//! Adapter lifecycle bookkeeping and the misuse checks every adapter shares.

use tokio::sync::watch;

use omnihub_domain::error::DeviceError;
use omnihub_domain::id::UniversalDeviceId;
use omnihub_domain::platform::Platform;

/// Coarse lifecycle of a request/response adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
    Disposed,
}

/// Shared, lock-free view of an adapter's [`LifecycleState`].
#[derive(Debug)]
pub struct Lifecycle {
    platform: Platform,
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            state: watch::Sender::new(LifecycleState::Uninitialized),
        }
    }

    #[must_use]
    pub fn current(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn set(&self, state: LifecycleState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(platform = %self.platform, ?previous, ?state, "lifecycle transition");
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.current() == LifecycleState::Ready
    }

    /// # Errors
    ///
    /// Returns a `Configuration` error unless the adapter is ready.
    pub fn ensure_ready(&self) -> Result<(), DeviceError> {
        ensure_initialized(self.platform, self.is_ready())
    }
}

/// # Errors
///
/// Returns a `Configuration` error when `initialized` is false.
pub fn ensure_initialized(platform: Platform, initialized: bool) -> Result<(), DeviceError> {
    if initialized {
        Ok(())
    } else {
        Err(DeviceError::configuration(format!(
            "{} adapter is not initialized",
            platform.display_name()
        ))
        .with_platform(platform))
    }
}

/// # Errors
///
/// Returns a `DeviceNotFound` error when `id` belongs to another platform.
pub fn ensure_owned(platform: Platform, id: &UniversalDeviceId) -> Result<(), DeviceError> {
    if id.platform() == platform {
        Ok(())
    } else {
        Err(DeviceError::device_not_found(id)
            .with_platform(platform)
            .with_operation("ownership check"))
    }
}

#[cfg(test)]
mod tests {
    use omnihub_domain::error::ErrorKind;

    use super::*;

    #[test]
    fn should_reject_use_before_ready_with_configuration_error() {
        let lifecycle = Lifecycle::new(Platform::SmartThings);
        for state in [
            LifecycleState::Uninitialized,
            LifecycleState::Initializing,
            LifecycleState::Disposed,
        ] {
            lifecycle.set(state);
            let err = lifecycle.ensure_ready().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration);
        }
        lifecycle.set(LifecycleState::Ready);
        assert!(lifecycle.ensure_ready().is_ok());
    }

    #[test]
    fn should_reject_device_of_another_platform() {
        let foreign = UniversalDeviceId::new(Platform::Lutron, "1");
        let err = ensure_owned(Platform::SmartThings, &foreign).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
        assert!(ensure_owned(Platform::Lutron, &foreign).is_ok());
    }
}
