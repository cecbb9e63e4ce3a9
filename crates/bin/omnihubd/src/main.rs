//! # omnihubd — omnihub daemon
//!
//! Composition root that wires the platform adapters together.
//!
//! ## Responsibilities
//! - Parse configuration (`omnihub.toml`, env vars)
//! - Install the tracing subscriber
//! - Construct and initialize each configured adapter
//! - Log health and discovered devices
//! - Relay state-change notifications to the log until Ctrl-C
//! - Dispose every adapter on shutdown
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use anyhow::Context;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use omnihub_adapter_lutron::LutronAdapter;
use omnihub_adapter_smartthings::SmartThingsAdapter;
use omnihub_app::ports::DeviceAdapter;
use omnihub_domain::event::StateChangeNotification;
use omnihub_domain::platform::Platform;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter `{}`", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if !config.has_adapters() {
        warn!("no adapters configured; add a [smartthings] or [lutron] section to omnihub.toml");
    }

    let smartthings = config.smartthings.map(SmartThingsAdapter::new);
    let lutron = config.lutron.map(LutronAdapter::new);

    let shutdown = CancellationToken::new();
    let mut relays = Vec::new();
    if let Some(adapter) = &smartthings
        && start(adapter).await
    {
        relays.push(relay(adapter.platform(), adapter.subscribe(), shutdown.clone()));
    }
    if let Some(adapter) = &lutron
        && start(adapter).await
    {
        relays.push(relay(adapter.platform(), adapter.subscribe(), shutdown.clone()));
    }

    info!(adapters = relays.len(), "omnihubd running; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    shutdown.cancel();
    for relay in relays {
        if let Err(err) = relay.await {
            warn!(error = %err, "notification relay ended abnormally");
        }
    }
    if let Some(adapter) = &smartthings {
        adapter.dispose().await;
    }
    if let Some(adapter) = &lutron {
        adapter.dispose().await;
    }
    Ok(())
}

/// Initialize one adapter and log what it sees. Returns whether it is usable.
async fn start<A: DeviceAdapter>(adapter: &A) -> bool {
    let platform = adapter.platform();
    if let Err(err) = adapter.initialize().await {
        error!(%platform, error = %err, "adapter failed to initialize");
        return false;
    }

    let health = adapter.health_check().await;
    info!(
        %platform,
        healthy = health.healthy,
        message = health.message.as_deref().unwrap_or_default(),
        "health check"
    );

    match adapter.list_devices(None).await {
        Ok(devices) => {
            info!(%platform, count = devices.len(), "discovered devices");
            for device in &devices {
                info!(
                    device_id = %device.id(),
                    name = %device.name,
                    room = device.room_name.as_deref().unwrap_or_default(),
                    online = device.online,
                    "device"
                );
            }
        }
        Err(err) => warn!(%platform, error = %err, "device discovery failed"),
    }
    true
}

fn relay(
    platform: Platform,
    notifications: broadcast::Receiver<StateChangeNotification>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut notifications = BroadcastStream::new(notifications);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                next = notifications.next() => match next {
                    Some(Ok(notification)) => info!(
                        %platform,
                        device_id = %notification.device_id,
                        source = ?notification.source,
                        added = ?notification.diff.added,
                        changed = notification.diff.changed.len(),
                        removed = notification.diff.removed.len(),
                        "state changed"
                    ),
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(%platform, skipped, "notification relay fell behind");
                    }
                    None => break,
                },
            }
        }
    })
}
