//! The background task that owns the bridge session.
//!
//! One task per adapter holds the stream, matches responses to requests by
//! client tag, feeds push events into the [`BridgeCache`] and reconnects
//! after an unexpected disconnect. Adapter methods talk to it over a
//! channel and never wait on it beyond a single request.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use omnihub_app::event_bus::InProcessEventBus;
use omnihub_domain::event::StateChangeNotification;

use crate::config::ReconnectPolicy;
use crate::connection::LeapStream;
use crate::error::LutronError;
use crate::leap::{Communique, PushEvent};
use crate::transport::Connector;
use crate::tree::{BridgeCache, BridgeTree, Snapshot, StateChange};

const REQUEST_QUEUE: usize = 32;

/// Observable state of the bridge connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Reconnecting { attempt: u32 },
    /// The reconnect ceiling was exceeded; the adapter must be recreated.
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Ready => f.write_str("ready"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

type Reply = oneshot::Sender<Result<Communique, LutronError>>;

struct Request {
    message: Communique,
    reply: Reply,
}

/// Handle to a running session task.
pub struct Session {
    requests: mpsc::Sender<Request>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Send one request through the session and wait for its response.
    pub async fn request(
        &self,
        message: Communique,
        timeout: Duration,
    ) -> Result<Communique, LutronError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { message, reply })
            .await
            .map_err(|_| LutronError::Disconnected)?;
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LutronError::Disconnected),
            Err(_) => Err(LutronError::Timeout(timeout)),
        }
    }

    /// Stop the task and wait for it to release the connection.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            debug!(error = %err, "session task ended abnormally");
        }
    }
}

enum Exit {
    Shutdown,
    Lost(String),
}

pub struct Supervisor {
    pub connector: Arc<dyn Connector>,
    pub cache: Arc<BridgeCache>,
    pub bus: InProcessEventBus,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub reconnect: ReconnectPolicy,
    pub timeout: Duration,
}

impl Supervisor {
    pub fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(%previous, %state, "bridge connection state changed");
        }
    }

    /// Open a stream, load the tree and attach subscriptions.
    pub async fn connect(&self) -> Result<LeapStream, LutronError> {
        let stream = tokio::time::timeout(self.timeout, self.connector.connect())
            .await
            .map_err(|_| LutronError::Timeout(self.timeout))??;
        let mut leap = LeapStream::new(stream);
        let tree = bootstrap(&mut leap, self.timeout).await?;
        let devices = tree.len();
        for change in self.cache.replace(tree) {
            self.publish(change);
        }
        debug!(devices, "bridge tree loaded");
        Ok(leap)
    }

    /// Hand an established stream to a new background task.
    pub fn spawn(self, stream: LeapStream) -> Session {
        let (requests, queue) = mpsc::channel(REQUEST_QUEUE);
        let shutdown = CancellationToken::new();
        self.set_state(ConnectionState::Ready);
        let task = tokio::spawn(self.run(stream, queue, shutdown.clone()));
        Session {
            requests,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    fn publish(&self, change: StateChange) {
        self.bus.send(
            StateChangeNotification::pushed(change.device_id, change.diff).with_state(change.state),
        );
    }

    async fn run(
        self,
        mut stream: LeapStream,
        mut queue: mpsc::Receiver<Request>,
        shutdown: CancellationToken,
    ) {
        loop {
            match self.serve(&mut stream, &mut queue, &shutdown).await {
                Exit::Shutdown => {
                    self.set_state(ConnectionState::Disconnected);
                    debug!("bridge session closed");
                    return;
                }
                Exit::Lost(reason) => {
                    warn!(%reason, "bridge connection lost");
                    self.set_state(ConnectionState::Disconnected);
                }
            }
            match self.reestablish(&mut queue, &shutdown).await {
                Some(next) => stream = next,
                None => return,
            }
        }
    }

    async fn serve(
        &self,
        stream: &mut LeapStream,
        queue: &mut mpsc::Receiver<Request>,
        shutdown: &CancellationToken,
    ) -> Exit {
        let mut pending: HashMap<String, Reply> = HashMap::new();
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return Exit::Shutdown,
                request = queue.recv() => {
                    let Some(Request { message, reply }) = request else {
                        return Exit::Shutdown;
                    };
                    let tag = stream.next_tag();
                    if let Err(err) = stream.send(&message.with_tag(tag.clone())).await {
                        let reason = err.to_string();
                        let _ = reply.send(Err(err));
                        return Exit::Lost(reason);
                    }
                    pending.retain(|_, reply| !reply.is_closed());
                    pending.insert(tag, reply);
                }
                incoming = stream.recv() => match incoming {
                    Ok(Some(message)) => self.handle(message, &mut pending),
                    Ok(None) => return Exit::Lost("bridge closed the stream".to_string()),
                    Err(err) => return Exit::Lost(err.to_string()),
                },
            }
        }
    }

    fn handle(&self, message: Communique, pending: &mut HashMap<String, Reply>) {
        if let Some(reply) = message.tag().and_then(|tag| pending.remove(tag)) {
            let _ = reply.send(message.into_result());
            return;
        }
        match PushEvent::parse(&message) {
            Ok(Some(event)) => {
                for change in self.cache.apply(&event) {
                    if !change.diff.is_empty() {
                        trace!(device_id = %change.device_id, "applied push event");
                        self.publish(change);
                    }
                }
            }
            Ok(None) => trace!(url = message.url(), "ignoring unsolicited message"),
            Err(err) => warn!(error = %err, url = message.url(), "malformed push event"),
        }
    }

    /// Reconnect with doubling backoff. `None` after shutdown or once the
    /// attempt ceiling is exceeded.
    async fn reestablish(
        &self,
        queue: &mut mpsc::Receiver<Request>,
        shutdown: &CancellationToken,
    ) -> Option<LeapStream> {
        for attempt in 1..=self.reconnect.max_attempts {
            self.set_state(ConnectionState::Reconnecting { attempt });
            let delay = self.reconnect.delay(attempt);
            info!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "reconnecting to bridge"
            );
            if !idle(delay, queue, shutdown).await {
                self.set_state(ConnectionState::Disconnected);
                return None;
            }
            let outcome = tokio::select! {
                () = shutdown.cancelled() => {
                    self.set_state(ConnectionState::Disconnected);
                    return None;
                }
                outcome = self.connect() => outcome,
            };
            match outcome {
                Ok(stream) => {
                    self.set_state(ConnectionState::Ready);
                    info!(attempt, "bridge connection restored");
                    return Some(stream);
                }
                Err(err) => warn!(attempt, error = %err, "reconnect attempt failed"),
            }
        }
        error!(
            attempts = self.reconnect.max_attempts,
            "bridge reconnection ceiling exceeded, adapter must be restarted"
        );
        self.set_state(ConnectionState::Failed);
        None
    }
}

/// Wait out a backoff delay, answering queued requests with `Disconnected`.
/// Returns `false` on shutdown.
async fn idle(
    delay: Duration,
    queue: &mut mpsc::Receiver<Request>,
    shutdown: &CancellationToken,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = shutdown.cancelled() => return false,
            () = &mut sleep => return true,
            Some(request) = queue.recv() => {
                let _ = request.reply.send(Err(LutronError::Disconnected));
            }
        }
    }
}

async fn bootstrap(leap: &mut LeapStream, timeout: Duration) -> Result<BridgeTree, LutronError> {
    let devices = leap
        .request(Communique::read("/device"), timeout)
        .await?
        .body_field("Devices")?;
    let areas = leap
        .request(Communique::read("/area"), timeout)
        .await?
        .body_field("Areas")?;
    let zones = leap
        .request(Communique::read("/zone"), timeout)
        .await?
        .body_field("Zones")?;
    let occupancy_groups = optional(leap, Communique::read("/occupancygroup"), timeout)
        .await?
        .and_then(|response| response.body_field("OccupancyGroups").ok())
        .unwrap_or_default();
    let buttons = optional(leap, Communique::read("/button"), timeout)
        .await?
        .and_then(|response| response.body_field("Buttons").ok())
        .unwrap_or_default();

    let mut tree = BridgeTree::build(Snapshot {
        devices,
        areas,
        zones,
        occupancy_groups,
        buttons,
    });

    let zone_statuses = leap
        .request(Communique::subscribe("/zone/status"), timeout)
        .await?;
    if let Some(event) = PushEvent::parse(&zone_statuses)? {
        tree.apply(&event);
    }
    if let Some(occupancy) =
        optional(leap, Communique::subscribe("/occupancygroup/status"), timeout).await?
        && let Some(event) = PushEvent::parse(&occupancy)?
    {
        tree.apply(&event);
    }
    for button in tree.button_ids() {
        optional(
            leap,
            Communique::subscribe(format!("/button/{button}/status/event")),
            timeout,
        )
        .await?;
    }
    Ok(tree)
}

/// A request whose rejection by the bridge is tolerated. Transport failures
/// still propagate.
async fn optional(
    leap: &mut LeapStream,
    message: Communique,
    timeout: Duration,
) -> Result<Option<Communique>, LutronError> {
    let url = message.url().to_string();
    match leap.request(message, timeout).await {
        Ok(response) => Ok(Some(response)),
        Err(err @ (LutronError::Status { .. } | LutronError::UnexpectedResponse(_))) => {
            debug!(url, error = %err, "optional bridge resource unavailable");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
