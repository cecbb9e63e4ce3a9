//! Adapter port — the contract every platform integration implements.
//!
//! An adapter bridges one smart-home platform into the unified device model.
//! Callers drive it in this order:
//!
//! 1. [`initialize`](DeviceAdapter::initialize) — validate configuration,
//!    authenticate, connect. Idempotent.
//! 2. discovery, state, command, location and scene operations. Every
//!    data-returning method fails with a `Configuration` error until
//!    initialization has succeeded.
//! 3. [`dispose`](DeviceAdapter::dispose) — release the connection and
//!    caches. Idempotent and infallible.

use std::future::Future;

use tokio::sync::broadcast;

use omnihub_domain::capability::Capability;
use omnihub_domain::command::{BatchCommand, CommandResult, DeviceCommand};
use omnihub_domain::device::UnifiedDevice;
use omnihub_domain::error::DeviceError;
use omnihub_domain::event::StateChangeNotification;
use omnihub_domain::filter::DeviceFilter;
use omnihub_domain::health::HealthStatus;
use omnihub_domain::id::UniversalDeviceId;
use omnihub_domain::location::{Location, Room, Scene, SceneResult};
use omnihub_domain::platform::Platform;
use omnihub_domain::state::DeviceState;

use crate::options::{BatchOptions, CommandExecutionOptions};
use crate::pipeline;

/// A platform integration exposing the unified device model.
pub trait DeviceAdapter: Send + Sync {
    /// The platform this adapter serves. Every device id it accepts or
    /// returns carries this platform segment.
    fn platform(&self) -> Platform;

    /// Validate configuration and establish the platform session.
    ///
    /// Fails fast with a `Configuration` error when required secrets or paths
    /// are missing. Calling it again after success is a no-op.
    fn initialize(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Release every held resource. Safe to call repeatedly.
    fn dispose(&self) -> impl Future<Output = ()> + Send;

    fn is_initialized(&self) -> bool;

    /// Lightweight round trip to the platform. Never fails; problems are
    /// reported in the returned status.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;

    /// Discover devices, optionally narrowed by `filter`.
    fn list_devices(
        &self,
        filter: Option<&DeviceFilter>,
    ) -> impl Future<Output = Result<Vec<UnifiedDevice>, DeviceError>> + Send;

    fn get_device(
        &self,
        id: &UniversalDeviceId,
    ) -> impl Future<Output = Result<UnifiedDevice, DeviceError>> + Send;

    fn get_device_capabilities(
        &self,
        id: &UniversalDeviceId,
    ) -> impl Future<Output = Result<Vec<Capability>, DeviceError>> + Send {
        async move {
            let device = self.get_device(id).await?;
            Ok(device.capabilities().iter().copied().collect())
        }
    }

    /// Current state, possibly served from an adapter-local cache.
    fn get_device_state(
        &self,
        id: &UniversalDeviceId,
    ) -> impl Future<Output = Result<DeviceState, DeviceError>> + Send;

    /// State re-read from the platform, bypassing any cache the adapter
    /// would otherwise consult.
    fn refresh_device_state(
        &self,
        id: &UniversalDeviceId,
    ) -> impl Future<Output = Result<DeviceState, DeviceError>> + Send;

    /// Execute one command.
    ///
    /// Per-command failures are captured in the returned [`CommandResult`];
    /// only adapter misuse (not initialized, a device id of another
    /// platform) is returned as `Err`.
    fn execute_command(
        &self,
        id: &UniversalDeviceId,
        command: DeviceCommand,
        options: &CommandExecutionOptions,
    ) -> impl Future<Output = Result<CommandResult, DeviceError>> + Send;

    /// Execute several commands under one scheduling policy.
    fn execute_batch_commands(
        &self,
        commands: Vec<BatchCommand>,
        options: &BatchOptions,
    ) -> impl Future<Output = Result<Vec<CommandResult>, DeviceError>> + Send {
        pipeline::run_batch(self, commands, options)
    }

    /// Native capability id → universal capability.
    fn map_platform_capability(&self, native: &str) -> Option<Capability>;

    /// Universal capability → native capability id.
    fn map_unified_capability(&self, capability: Capability) -> Option<&'static str>;

    fn list_locations(&self) -> impl Future<Output = Result<Vec<Location>, DeviceError>> + Send;

    fn list_rooms(
        &self,
        location_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Room>, DeviceError>> + Send;

    /// Whether [`list_scenes`](Self::list_scenes) can ever return anything.
    fn supports_scenes(&self) -> bool;

    fn list_scenes(
        &self,
        location_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Scene>, DeviceError>> + Send;

    fn execute_scene(
        &self,
        scene_id: &str,
    ) -> impl Future<Output = Result<SceneResult, DeviceError>> + Send;

    /// Receive state-change notifications emitted after subscribing.
    fn subscribe(&self) -> broadcast::Receiver<StateChangeNotification>;
}
