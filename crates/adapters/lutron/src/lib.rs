//! # omnihub-adapter-lutron
//!
//! Lutron adapter — exposes the zones of a Caséta / RA2 Select bridge through
//! the unified [`DeviceAdapter`] contract.
//!
//! ## Responsibilities
//! - Load and check the paired certificate bundle, then open a mutual-TLS
//!   LEAP session to the bridge
//! - Load the device/zone/area tree and subscribe to zone, occupancy and
//!   button events
//! - Serve device and state reads from the push-maintained cache
//! - Translate unified commands into zone `commandprocessor` requests and
//!   run them through the shared command pipeline
//! - Reconnect with doubling backoff after an unexpected disconnect
//!
//! ## Connection states
//!
//! `Disconnected → Connecting → Ready → Reconnecting{n} → Ready | Failed`,
//! observable through [`LutronAdapter::connection_state`]. While the
//! connection is down, reads keep returning the last known state and
//! devices are reported offline; commands fail with a `Network` error.
//!
//! ## Dependency rule
//! Depends on `omnihub-app` (port traits, pipeline) and `omnihub-domain`.

mod capabilities;
mod certs;
mod config;
mod connection;
mod error;
pub mod leap;
mod supervisor;
mod transport;
mod tree;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, broadcast, watch};
use tracing::{info, warn};

use omnihub_app::event_bus::InProcessEventBus;
use omnihub_app::health::HealthTracker;
use omnihub_app::lifecycle::{self, Lifecycle, LifecycleState};
use omnihub_app::options::CommandExecutionOptions;
use omnihub_app::pipeline::{self, CommandDispatcher};
use omnihub_app::ports::DeviceAdapter;
use omnihub_app::retry::RetryPolicy;
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

pub use capabilities::{TABLE as CAPABILITY_TABLE, translate_command};
pub use config::{DEFAULT_PORT, LutronConfig, ReconnectPolicy};
pub use error::LutronError;
pub use supervisor::ConnectionState;
pub use transport::{BoxStream, BridgeStream, Connector, TlsConnector};
pub use tree::BRIDGE_LOCATION_ID;

use leap::Communique;
use supervisor::{Session, Supervisor};
use tree::BridgeCache;

const PLATFORM: Platform = Platform::Lutron;

/// Lutron implementation of [`DeviceAdapter`].
pub struct LutronAdapter {
    config: LutronConfig,
    /// Injected transport; when `None` a TLS connector is built from the
    /// certificate bundle during `initialize`.
    connector: Option<Arc<dyn Connector>>,
    lifecycle: Lifecycle,
    cache: Arc<BridgeCache>,
    connection: Arc<watch::Sender<ConnectionState>>,
    session: RwLock<Option<Arc<Session>>>,
    health: HealthTracker,
    bus: InProcessEventBus,
    init: Mutex<()>,
}

impl LutronAdapter {
    #[must_use]
    pub fn new(config: LutronConfig) -> Self {
        Self {
            config,
            connector: None,
            lifecycle: Lifecycle::new(PLATFORM),
            cache: Arc::new(BridgeCache::new()),
            connection: Arc::new(watch::Sender::new(ConnectionState::Disconnected)),
            session: RwLock::new(None),
            health: HealthTracker::new(),
            bus: InProcessEventBus::default(),
            init: Mutex::new(()),
        }
    }

    /// Use `connector` instead of a TLS socket. No certificates are loaded.
    #[must_use]
    pub fn with_connector(config: LutronConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            connector: Some(connector),
            ..Self::new(config)
        }
    }

    /// Watch the bridge connection state.
    #[must_use]
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    fn is_connected(&self) -> bool {
        *self.connection.borrow() == ConnectionState::Ready
    }

    async fn tls_connector(&self) -> Result<Arc<dyn Connector>, DeviceError> {
        let (host, paths) = self.config.tls_target()?;
        let bundle = certs::load(&paths)
            .await
            .map_err(|err| err.into_domain().in_context(PLATFORM, "initialize"))?;
        let connector = TlsConnector::new(host, self.config.port, self.config.request_timeout(), bundle)
            .map_err(|err| err.into_domain().in_context(PLATFORM, "initialize"))?;
        Ok(Arc::new(connector))
    }

    /// The live session, only while the connection is ready.
    fn session(&self) -> Result<Arc<Session>, DeviceError> {
        self.lifecycle.ensure_ready()?;
        if !self.is_connected() {
            return Err(LutronError::Disconnected.into_domain());
        }
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| LutronError::Disconnected.into_domain())
    }

    fn with_online(&self, mut device: UnifiedDevice) -> UnifiedDevice {
        device.online = self.is_connected();
        device
    }

    fn cached_device(&self, id: &UniversalDeviceId) -> Result<UnifiedDevice, DeviceError> {
        self.lifecycle.ensure_ready()?;
        lifecycle::ensure_owned(PLATFORM, id)?;
        self.cache
            .device(id.platform_device_id())
            .map(|device| self.with_online(device))
            .ok_or_else(|| {
                DeviceError::device_not_found(id)
                    .with_platform(PLATFORM)
                    .with_operation("get_device")
            })
    }

    fn cached_device_state(&self, id: &UniversalDeviceId) -> Result<DeviceState, DeviceError> {
        self.lifecycle.ensure_ready()?;
        lifecycle::ensure_owned(PLATFORM, id)?;
        self.cache.state(id.platform_device_id()).ok_or_else(|| {
            DeviceError::device_not_found(id)
                .with_platform(PLATFORM)
                .with_operation("get_device_state")
        })
    }
}

impl DeviceAdapter for LutronAdapter {
    fn platform(&self) -> Platform {
        PLATFORM
    }

    #[tracing::instrument(skip_all, fields(platform = %PLATFORM))]
    async fn initialize(&self) -> Result<(), DeviceError> {
        let _guard = self.init.lock().await;
        if self.lifecycle.is_ready() {
            return Ok(());
        }
        self.config.validate()?;
        let connector = match &self.connector {
            Some(connector) => Arc::clone(connector),
            None => self.tls_connector().await?,
        };
        self.lifecycle.set(LifecycleState::Initializing);

        let supervisor = Supervisor {
            connector,
            cache: Arc::clone(&self.cache),
            bus: self.bus.clone(),
            state: Arc::clone(&self.connection),
            reconnect: self.config.reconnect,
            timeout: self.config.request_timeout(),
        };
        supervisor.set_state(ConnectionState::Connecting);

        match supervisor.connect().await {
            Ok(stream) => {
                let session = supervisor.spawn(stream);
                *self.session.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::new(session));
                self.health.record_success();
                self.lifecycle.set(LifecycleState::Ready);
                info!(devices = self.cache.len(), "Lutron adapter initialized");
                Ok(())
            }
            Err(err) => {
                supervisor.set_state(ConnectionState::Disconnected);
                self.health.record_failure();
                self.lifecycle.set(LifecycleState::Uninitialized);
                warn!(error = %err, "Lutron initialization failed");
                Err(err.into_domain().in_context(PLATFORM, "initialize"))
            }
        }
    }

    async fn dispose(&self) {
        let _guard = self.init.lock().await;
        let session = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(session) = session {
            session.close().await;
        }
        self.cache.clear();
        self.health.reset();
        self.connection.send_replace(ConnectionState::Disconnected);
        if self.lifecycle.current() != LifecycleState::Disposed {
            self.lifecycle.set(LifecycleState::Disposed);
            info!("Lutron adapter disposed");
        }
    }

    fn is_initialized(&self) -> bool {
        self.lifecycle.is_ready()
    }

    async fn health_check(&self) -> HealthStatus {
        if !self.lifecycle.is_ready() {
            return self.health.annotate(
                HealthStatus::unhealthy(PLATFORM, false, false)
                    .with_message("adapter is not initialized"),
            );
        }
        let Ok(session) = self.session() else {
            let state = *self.connection.borrow();
            return self.health.annotate(
                HealthStatus::unhealthy(PLATFORM, false, true)
                    .with_message(format!("bridge connection is {state}")),
            );
        };
        let status = match session
            .request(Communique::ping(), self.config.request_timeout())
            .await
        {
            Ok(_) => {
                self.health.record_success();
                HealthStatus::healthy(PLATFORM)
            }
            Err(err) => {
                self.health.record_failure();
                let err = err.into_domain();
                let authenticated = err.kind() != ErrorKind::Authentication;
                HealthStatus::unhealthy(PLATFORM, false, authenticated).with_message(err.to_string())
            }
        };
        self.health.annotate(status)
    }

    #[tracing::instrument(skip_all, fields(platform = %PLATFORM))]
    async fn list_devices(
        &self,
        filter: Option<&DeviceFilter>,
    ) -> Result<Vec<UnifiedDevice>, DeviceError> {
        self.lifecycle.ensure_ready()?;
        let devices: Vec<UnifiedDevice> = self
            .cache
            .devices()
            .into_iter()
            .map(|device| self.with_online(device))
            .collect();
        Ok(match filter {
            Some(filter) => filter.apply(devices),
            None => devices,
        })
    }

    async fn get_device(&self, id: &UniversalDeviceId) -> Result<UnifiedDevice, DeviceError> {
        self.cached_device(id)
    }

    async fn get_device_state(&self, id: &UniversalDeviceId) -> Result<DeviceState, DeviceError> {
        self.cached_device_state(id)
    }

    /// Identical to [`get_device_state`](Self::get_device_state): the cache
    /// is kept current by subscriptions.
    async fn refresh_device_state(
        &self,
        id: &UniversalDeviceId,
    ) -> Result<DeviceState, DeviceError> {
        self.cached_device_state(id)
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
        self.lifecycle.ensure_ready()?;
        let name = match self.config.host.as_deref() {
            Some(host) => format!("Lutron bridge ({host})"),
            None => "Lutron bridge".to_string(),
        };
        Ok(vec![Location {
            id: BRIDGE_LOCATION_ID.to_string(),
            name,
            platform: PLATFORM,
            time_zone: None,
        }])
    }

    async fn list_rooms(&self, location_id: Option<&str>) -> Result<Vec<Room>, DeviceError> {
        self.lifecycle.ensure_ready()?;
        if location_id.is_some_and(|id| id != BRIDGE_LOCATION_ID) {
            return Ok(Vec::new());
        }
        Ok(self.cache.rooms())
    }

    fn supports_scenes(&self) -> bool {
        false
    }

    async fn list_scenes(&self, _location_id: Option<&str>) -> Result<Vec<Scene>, DeviceError> {
        self.lifecycle.ensure_ready()?;
        Ok(Vec::new())
    }

    async fn execute_scene(&self, scene_id: &str) -> Result<SceneResult, DeviceError> {
        self.lifecycle.ensure_ready()?;
        Err(
            DeviceError::not_supported(format!("Lutron bridges have no scenes (requested `{scene_id}`)"))
                .with_platform(PLATFORM)
                .with_operation("execute_scene"),
        )
    }

    fn subscribe(&self) -> broadcast::Receiver<StateChangeNotification> {
        self.bus.subscribe()
    }
}

impl CommandDispatcher for LutronAdapter {
    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry
    }

    fn event_bus(&self) -> &InProcessEventBus {
        &self.bus
    }

    fn cached_state(&self, id: &UniversalDeviceId) -> Option<DeviceState> {
        self.cache.state(id.platform_device_id())
    }

    async fn dispatch(
        &self,
        device: &UnifiedDevice,
        native: &'static str,
        command: &DeviceCommand,
    ) -> Result<(), DeviceError> {
        let zone = self.cache.zone(device.platform_device_id()).ok_or_else(|| {
            DeviceError::not_supported(format!("device {} has no controllable zone", device.id()))
        })?;
        let zone_command = translate_command(native, command)?;
        tracing::debug!(
            device_id = %device.id(),
            zone = %zone.id,
            command = ?zone_command,
            "sending zone command"
        );

        let session = self.session()?;
        let response = session
            .request(zone_command.to_communique(&zone.id), self.config.request_timeout())
            .await
            .map(drop)
            .map_err(LutronError::into_domain);
        self.health.observe(response)
    }
}
