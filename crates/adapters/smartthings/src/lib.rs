//! # omnihub-adapter-smartthings
//!
//! SmartThings adapter — exposes devices from the SmartThings cloud REST API
//! through the unified [`DeviceAdapter`] contract.
//!
//! ## Responsibilities
//! - Authenticate with a bearer token and validate it on `initialize`
//! - Discover devices (following pagination), flatten their component
//!   capabilities and resolve room names
//! - Translate component/capability/attribute status into flat unified state
//! - Translate unified commands into SmartThings command payloads and run
//!   them through the shared command pipeline
//! - List locations, rooms and scenes; execute scenes
//!
//! SmartThings is request/response only: there is no push channel, so the
//! only notifications emitted are those following successful commands.
//!
//! ## Dependency rule
//! Depends on `omnihub-app` (port traits, pipeline) and `omnihub-domain`.

mod capabilities;
mod client;
mod config;
mod convert;
mod error;
pub mod types;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use omnihub_app::event_bus::InProcessEventBus;
use omnihub_app::health::HealthTracker;
use omnihub_app::lifecycle::{self, Lifecycle, LifecycleState};
use omnihub_app::options::CommandExecutionOptions;
use omnihub_app::pipeline::{self, CommandDispatcher};
use omnihub_app::ports::DeviceAdapter;
use omnihub_app::retry::{self, RetryPolicy};
use omnihub_domain::capability::Capability;
use omnihub_domain::command::{CommandResult, DeviceCommand};
use omnihub_domain::device::UnifiedDevice;
use omnihub_domain::error::{DeviceError, ErrorKind};
use omnihub_domain::event::StateChangeNotification;
use omnihub_domain::filter::DeviceFilter;
use omnihub_domain::health::HealthStatus;
use omnihub_domain::id::UniversalDeviceId;
use omnihub_domain::location::{Location, Room, Scene, SceneResult};
use omnihub_domain::platform::Platform;
use omnihub_domain::state::DeviceState;

pub use capabilities::{NativeCommand, TABLE as CAPABILITY_TABLE, translate_command};
pub use client::SmartThingsClient;
pub use config::SmartThingsConfig;
pub use error::SmartThingsError;

use capabilities::MAIN_COMPONENT;
use types::{StCommand, StDevice, StRoom};

const PLATFORM: Platform = Platform::SmartThings;

/// SmartThings implementation of [`DeviceAdapter`].
pub struct SmartThingsAdapter {
    config: SmartThingsConfig,
    lifecycle: Lifecycle,
    client: RwLock<Option<Arc<SmartThingsClient>>>,
    /// Room id → room name, filled lazily during discovery.
    rooms: RwLock<HashMap<String, String>>,
    health: HealthTracker,
    bus: InProcessEventBus,
    init: Mutex<()>,
}

impl SmartThingsAdapter {
    #[must_use]
    pub fn new(config: SmartThingsConfig) -> Self {
        Self {
            config,
            lifecycle: Lifecycle::new(PLATFORM),
            client: RwLock::new(None),
            rooms: RwLock::new(HashMap::new()),
            health: HealthTracker::new(),
            bus: InProcessEventBus::default(),
            init: Mutex::new(()),
        }
    }

    fn client(&self) -> Result<Arc<SmartThingsClient>, DeviceError> {
        self.lifecycle.ensure_ready()?;
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                DeviceError::configuration("SmartThings client is not available")
                    .with_platform(PLATFORM)
            })
    }

    /// Run one API request under the retry policy and record its outcome.
    async fn call<T, F, Fut>(&self, operation: &'static str, request: F) -> Result<T, DeviceError>
    where
        T: Send,
        F: Fn(Arc<SmartThingsClient>) -> Fut + Sync,
        Fut: Future<Output = Result<T, SmartThingsError>> + Send,
    {
        let client = self.client()?;
        let result = retry::retry(&self.config.retry, operation, || {
            let pending = request(Arc::clone(&client));
            async move { pending.await.map_err(SmartThingsError::into_domain) }
        })
        .await;
        self.health
            .observe(result)
            .map_err(|err| err.in_context(PLATFORM, operation))
    }

    fn room_names(&self) -> HashMap<String, String> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember_rooms(&self, rooms: &[StRoom]) {
        let mut cache = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        for room in rooms {
            cache.insert(room.room_id.clone(), room.name.clone());
        }
    }

    /// Fetch the rooms of every location that has a device in an unknown
    /// room. Failures only cost the room names.
    async fn resolve_rooms(&self, devices: &[StDevice]) {
        let locations: BTreeSet<&str> = {
            let known = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
            devices
                .iter()
                .filter(|device| {
                    device
                        .room_id
                        .as_ref()
                        .is_some_and(|room| !known.contains_key(room))
                })
                .filter_map(|device| device.location_id.as_deref())
                .collect()
        };
        let Ok(client) = self.client() else { return };
        for location_id in locations {
            match client.list_rooms(location_id).await {
                Ok(rooms) => self.remember_rooms(&rooms),
                Err(err) => debug!(location_id, error = %err, "could not resolve room names"),
            }
        }
    }

    async fn fetch_state(&self, id: &UniversalDeviceId) -> Result<DeviceState, DeviceError> {
        self.lifecycle.ensure_ready()?;
        lifecycle::ensure_owned(PLATFORM, id)?;
        let device_id = id.platform_device_id();
        let status = self
            .call("get_device_state", |client| async move {
                client.device_status(device_id).await
            })
            .await
            .map_err(|err| err.with_device(id.clone()))?;
        Ok(convert::to_state(id.clone(), &status))
    }

    async fn fetch_rooms(&self, location_id: &str) -> Result<Vec<StRoom>, DeviceError> {
        let rooms = self
            .call("list_rooms", |client| async move {
                client.list_rooms(location_id).await
            })
            .await?;
        self.remember_rooms(&rooms);
        Ok(rooms)
    }
}

/// Component that exposes `capability`, falling back to `main`.
fn component_for(device: &UnifiedDevice, capability: &str) -> String {
    device
        .platform_specific
        .as_ref()
        .and_then(|raw| raw.get("components"))
        .and_then(serde_json::Value::as_array)
        .and_then(|components| {
            components.iter().find(|component| {
                component
                    .get("capabilities")
                    .and_then(serde_json::Value::as_array)
                    .is_some_and(|caps| {
                        caps.iter()
                            .any(|cap| cap.get("id").and_then(serde_json::Value::as_str) == Some(capability))
                    })
            })
        })
        .and_then(|component| component.get("id"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(MAIN_COMPONENT)
        .to_string()
}

impl DeviceAdapter for SmartThingsAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    #[tracing::instrument(skip_all, fields(platform = %PLATFORM))]
    async fn initialize(&self) -> Result<(), DeviceError> {
        let _guard = self.init.lock().await;
        if self.lifecycle.is_ready() {
            return Ok(());
        }
        let base_url = self.config.validate()?;
        let Some(token) = self.config.token.as_ref() else {
            return Err(DeviceError::configuration("smartthings.token is required").with_platform(PLATFORM));
        };
        self.lifecycle.set(LifecycleState::Initializing);

        let client = match SmartThingsClient::new(base_url, token, self.config.request_timeout()) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                self.lifecycle.set(LifecycleState::Uninitialized);
                return Err(err.into_domain().in_context(PLATFORM, "initialize"));
            }
        };

        let outcome = retry::retry(&self.config.retry, "initialize", || {
            let client = Arc::clone(&client);
            async move {
                client
                    .list_locations()
                    .await
                    .map_err(SmartThingsError::into_domain)
            }
        })
        .await;

        match self.health.observe(outcome) {
            Ok(locations) => {
                *self.client.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
                self.lifecycle.set(LifecycleState::Ready);
                info!(locations = locations.len(), "SmartThings adapter initialized");
                Ok(())
            }
            Err(err) => {
                self.lifecycle.set(LifecycleState::Uninitialized);
                warn!(error = %err, "SmartThings initialization failed");
                Err(err.in_context(PLATFORM, "initialize"))
            }
        }
    }

    async fn dispose(&self) {
        let _guard = self.init.lock().await;
        self.client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.health.reset();
        if self.lifecycle.current() != LifecycleState::Disposed {
            self.lifecycle.set(LifecycleState::Disposed);
            info!("SmartThings adapter disposed");
        }
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle.is_ready()
    }

    async fn health_check(&self) -> HealthStatus {
        let Ok(client) = self.client() else {
            return self.health.annotate(
                HealthStatus::unhealthy(PLATFORM, false, false)
                    .with_message("adapter is not initialized"),
            );
        };
        let status = match client.list_locations().await {
            Ok(_) => {
                self.health.record_success();
                HealthStatus::healthy(PLATFORM)
            }
            Err(err) => {
                self.health.record_failure();
                let err = err.into_domain();
                let authenticated = err.kind() != ErrorKind::Authentication;
                let reachable = !matches!(err.kind(), ErrorKind::Network | ErrorKind::Timeout);
                HealthStatus::unhealthy(PLATFORM, reachable, authenticated).with_message(err.to_string())
            }
        };
        self.health.annotate(status)
    }

    #[tracing::instrument(skip_all, fields(platform = %PLATFORM))]
    async fn list_devices(
        &self,
        filter: Option<&DeviceFilter>,
    ) -> Result<Vec<UnifiedDevice>, DeviceError> {
        let location = self.config.location_id.as_deref();
        let payloads = self
            .call("list_devices", |client| async move {
                client.list_devices(location).await
            })
            .await?;
        self.resolve_rooms(&payloads).await;

        let rooms = self.room_names();
        let devices: Vec<UnifiedDevice> = payloads
            .iter()
            .filter_map(|payload| match convert::to_unified(payload, None, &rooms) {
                Ok(device) => Some(device),
                Err(err) => {
                    warn!(device_id = %payload.device_id, error = %err, "skipping malformed device");
                    None
                }
            })
            .collect();
        debug!(count = devices.len(), "discovered SmartThings devices");

        Ok(match filter {
            Some(filter) => filter.apply(devices),
            None => devices,
        })
    }

    async fn get_device(&self, id: &UniversalDeviceId) -> Result<UnifiedDevice, DeviceError> {
        self.lifecycle.ensure_ready()?;
        lifecycle::ensure_owned(PLATFORM, id)?;
        let device_id = id.platform_device_id();
        let payload = self
            .call("get_device", |client| async move {
                client.get_device(device_id).await
            })
            .await
            .map_err(|err| err.with_device(id.clone()))?;

        let health = if payload.health_state.is_some() {
            None
        } else {
            match self.client()?.device_health(device_id).await {
                Ok(health) => Some(health),
                Err(err) => {
                    debug!(device_id = %id, error = %err, "health lookup failed, reporting offline");
                    None
                }
            }
        };
        self.resolve_rooms(std::slice::from_ref(&payload)).await;

        convert::to_unified(&payload, health.as_ref(), &self.room_names()).map_err(|err| {
            DeviceError::state_sync(format!("device payload is unusable: {err}"))
                .with_platform(PLATFORM)
                .with_device(id.clone())
        })
    }

    async fn get_device_state(&self, id: &UniversalDeviceId) -> Result<DeviceState, DeviceError> {
        self.fetch_state(id).await
    }

    async fn refresh_device_state(
        &self,
        id: &UniversalDeviceId,
    ) -> Result<DeviceState, DeviceError> {
        self.fetch_state(id).await
    }

    async fn execute_command(
        &self,
        id: &UniversalDeviceId,
        command: DeviceCommand,
        options: &CommandExecutionOptions,
    ) -> Result<CommandResult, DeviceError> {
        pipeline::run_command(self, id, command, options).await
    }

    fn map_platform_capability(&self, native: &str) -> Option<Capability> {
        CAPABILITY_TABLE.to_universal(native)
    }

    fn map_unified_capability(&self, capability: Capability) -> Option<&'static str> {
        CAPABILITY_TABLE.to_native(capability)
    }

    async fn list_locations(&self) -> Result<Vec<Location>, DeviceError> {
        let locations = self
            .call("list_locations", |client| async move { client.list_locations().await })
            .await?;
        Ok(locations
            .into_iter()
            .map(|location| Location {
                id: location.location_id,
                name: location.name,
                platform: PLATFORM,
                time_zone: location.time_zone_id,
            })
            .collect())
    }

    async fn list_rooms(&self, location_id: Option<&str>) -> Result<Vec<Room>, DeviceError> {
        let raw = match location_id {
            Some(location_id) => self.fetch_rooms(location_id).await?,
            None => {
                let mut all = Vec::new();
                for location in self.list_locations().await? {
                    all.extend(self.fetch_rooms(&location.id).await?);
                }
                all
            }
        };
        Ok(raw
            .into_iter()
            .filter_map(|room| {
                let mut builder = Room::builder(PLATFORM).id(room.room_id).name(room.name);
                if let Some(location_id) = room.location_id {
                    builder = builder.location_id(location_id);
                }
                builder
                    .build()
                    .inspect_err(|err| debug!(error = %err, "skipping unnamed room"))
                    .ok()
            })
            .collect())
    }

    fn supports_scenes(&self) -> bool {
        true
    }

    async fn list_scenes(&self, location_id: Option<&str>) -> Result<Vec<Scene>, DeviceError> {
        let location = location_id.or(self.config.location_id.as_deref());
        let scenes = self
            .call("list_scenes", |client| async move {
                client.list_scenes(location).await
            })
            .await?;
        Ok(scenes
            .into_iter()
            .map(|scene| Scene {
                name: scene.scene_name.unwrap_or_else(|| scene.scene_id.clone()),
                id: scene.scene_id,
                platform: PLATFORM,
                location_id: scene.location_id,
            })
            .collect())
    }

    #[tracing::instrument(skip(self), fields(platform = %PLATFORM))]
    async fn execute_scene(&self, scene_id: &str) -> Result<SceneResult, DeviceError> {
        self.lifecycle.ensure_ready()?;
        match self
            .call("execute_scene", |client| async move {
                client.execute_scene(scene_id).await
            })
            .await
        {
            Ok(()) => Ok(SceneResult::succeeded(scene_id)),
            Err(err) => {
                warn!(error = %err, "scene execution failed");
                Ok(SceneResult::failed(scene_id, err))
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChangeNotification> {
        self.bus.subscribe()
    }
}

impl CommandDispatcher for SmartThingsAdapter {
    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    fn event_bus(&self) -> &InProcessEventBus {
        &self.bus
    }

    async fn dispatch(
        &self,
        device: &UnifiedDevice,
        native: &'static str,
        command: &DeviceCommand,
    ) -> Result<(), DeviceError> {
        let NativeCommand {
            capability,
            command,
            arguments,
        } = translate_command(native, command)?;
        let wire = StCommand {
            component: component_for(device, capability),
            capability: capability.to_string(),
            command,
            arguments,
        };
        debug!(device_id = %device.id(), capability, command = %wire.command, "sending SmartThings command");

        let client = self.client()?;
        let response = client
            .execute_commands(device.platform_device_id(), vec![wire])
            .await
            .map_err(SmartThingsError::into_domain);
        let response = self.health.observe(response)?;

        if let Some(failed) = response.results.iter().find(|outcome| outcome.is_failed()) {
            return Err(SmartThingsError::CommandFailed(format!(
                "command {} reported {}",
                failed.id.as_deref().unwrap_or("<unknown>"),
                failed.status
            ))
            .into_domain());
        }
        Ok(())
    }
}
