//! The command-execution pipeline shared by every adapter.
//!
//! `run_command` performs, in order: misuse checks (raised), device lookup,
//! capability and contract checks, native capability resolution, retried
//! dispatch with a per-attempt timeout, the optional confirmation read, and
//! publication of a state-change notification. Every failure after the
//! misuse checks is captured in the returned [`CommandResult`].

use std::future::Future;

use futures::future::join_all;
use tokio::time::Instant;

use omnihub_domain::command::{BatchCommand, CommandResult, DeviceCommand};
use omnihub_domain::device::UnifiedDevice;
use omnihub_domain::error::DeviceError;
use omnihub_domain::event::StateChangeNotification;
use omnihub_domain::id::{CorrelationId, UniversalDeviceId};
use omnihub_domain::state::{DeviceState, StateDiff};
use omnihub_domain::time::now;

use crate::event_bus::InProcessEventBus;
use crate::lifecycle;
use crate::options::{BatchMode, BatchOptions, CommandExecutionOptions};
use crate::ports::{DeviceAdapter, EventPublisher};
use crate::retry::{self, RetryPolicy};

/// The platform-specific half of command execution.
pub trait CommandDispatcher: DeviceAdapter {
    /// Retry policy applied to dispatch attempts.
    fn retry_policy(&self) -> RetryPolicy;

    /// Bus that command notifications are published on.
    fn event_bus(&self) -> &InProcessEventBus;

    /// Last state the adapter already holds for `id`, used as the baseline
    /// of the notification diff. Adapters without a state cache return
    /// `None`.
    fn cached_state(&self, id: &UniversalDeviceId) -> Option<DeviceState> {
        let _ = id;
        None
    }

    /// Send one already-validated command to the platform.
    ///
    /// `native` is the platform capability id resolved from
    /// `command.capability`.
    fn dispatch(
        &self,
        device: &UnifiedDevice,
        native: &'static str,
        command: &DeviceCommand,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

/// Execute one command through the shared pipeline.
///
/// # Errors
///
/// Only for adapter misuse: a `Configuration` error when the adapter is not
/// initialized, a `DeviceNotFound` error when `device_id` belongs to another
/// platform.
#[tracing::instrument(
    skip_all,
    fields(device_id = %device_id, capability = %command.capability, command = %command.command)
)]
pub async fn run_command<A>(
    adapter: &A,
    device_id: &UniversalDeviceId,
    command: DeviceCommand,
    options: &CommandExecutionOptions,
) -> Result<CommandResult, DeviceError>
where
    A: CommandDispatcher + ?Sized,
{
    let platform = adapter.platform();
    lifecycle::ensure_initialized(platform, adapter.is_initialized())?;
    lifecycle::ensure_owned(platform, device_id)?;

    let executed_at = now();
    let started = Instant::now();
    let correlation_id = CorrelationId::new();
    let previous = adapter.cached_state(device_id);

    let (outcome, retries) = match prepare(adapter, device_id, &command).await {
        Err(err) => (Err(err), 0),
        Ok((device, native)) => dispatch_with_retry(adapter, &device, native, &command, options).await,
    };

    let mut result = match outcome {
        Ok(()) => CommandResult::succeeded(device_id.clone(), command),
        Err(err) => {
            let err = err
                .in_context(platform, "execute_command")
                .with_device(device_id.clone());
            tracing::warn!(kind = %err.kind(), error = %err, retries, "command failed");
            CommandResult::failed(device_id.clone(), command, err)
        }
    }
    .with_retry_count(retries)
    .with_correlation_id(correlation_id);

    if result.success {
        let new_state = if options.wait_for_confirmation {
            confirm(adapter, device_id).await
        } else {
            None
        };
        publish(adapter, device_id, correlation_id, previous, new_state.as_ref()).await;
        if let Some(state) = new_state {
            result = result.with_new_state(state);
        }
    }

    Ok(result.with_timing(executed_at, started.elapsed()))
}

async fn prepare<A>(
    adapter: &A,
    id: &UniversalDeviceId,
    command: &DeviceCommand,
) -> Result<(UnifiedDevice, &'static str), DeviceError>
where
    A: CommandDispatcher + ?Sized,
{
    let device = adapter.get_device(id).await?;
    let capability = command.capability;
    if !device.has_capability(capability) {
        return Err(DeviceError::capability_not_supported(capability, id));
    }
    if capability.is_sensor() || !device.is_controllable() {
        return Err(
            DeviceError::not_supported(format!("device {id} is read-only for `{capability}`"))
                .with_device(id.clone()),
        );
    }
    command.validate()?;
    let native = adapter.map_unified_capability(capability).ok_or_else(|| {
        DeviceError::not_supported(format!(
            "{} has no native capability for `{capability}`",
            adapter.platform().display_name()
        ))
    })?;
    Ok((device, native))
}

async fn dispatch_with_retry<A>(
    adapter: &A,
    device: &UnifiedDevice,
    native: &'static str,
    command: &DeviceCommand,
    options: &CommandExecutionOptions,
) -> (Result<(), DeviceError>, u32)
where
    A: CommandDispatcher + ?Sized,
{
    let mut policy = adapter.retry_policy();
    if let Some(max_retries) = options.max_retries {
        policy = policy.with_max_retries(max_retries);
    }
    let timeout = options.timeout;

    let attempted = retry::with_retry(
        &policy,
        options.cancellation.as_ref(),
        "execute_command",
        move || async move {
            match tokio::time::timeout(timeout, adapter.dispatch(device, native, command)).await {
                Ok(result) => result,
                Err(_) => Err(DeviceError::timeout(timeout)),
            }
        },
    )
    .await;
    (attempted.result, attempted.retries)
}

async fn confirm<A>(adapter: &A, id: &UniversalDeviceId) -> Option<DeviceState>
where
    A: CommandDispatcher + ?Sized,
{
    match adapter.refresh_device_state(id).await {
        Ok(state) => Some(state),
        Err(err) => {
            tracing::warn!(error = %err, "confirmation read failed, returning result without new state");
            None
        }
    }
}

async fn publish<A>(
    adapter: &A,
    id: &UniversalDeviceId,
    correlation_id: CorrelationId,
    previous: Option<DeviceState>,
    current: Option<&DeviceState>,
) where
    A: CommandDispatcher + ?Sized,
{
    let diff = match (current, previous) {
        (Some(state), Some(previous)) => state.diff(&previous),
        (Some(state), None) => StateDiff::all_added(&state.values),
        (None, _) => StateDiff::default(),
    };
    let mut notification = StateChangeNotification::from_command(id.clone(), correlation_id, diff);
    if let Some(state) = current {
        notification = notification.with_state(state.clone());
    }
    if let Err(err) = adapter.event_bus().publish(notification).await {
        tracing::warn!(error = %err, "failed to publish command notification");
    }
}

/// Execute a batch under the sequential or parallel policy.
///
/// Sequential batches issue command N only after command N-1 returned and,
/// without `continue_on_error`, stop after the first failure. Parallel
/// batches dispatch everything at once and always let every command finish;
/// results keep input order, so [`first_failure`] on the returned slice
/// names the earliest failing entry in either mode.
///
/// # Errors
///
/// Returns a `Configuration` error when the adapter is not initialized.
/// Every per-command problem, including misuse of a single entry, becomes a
/// failed [`CommandResult`].
pub async fn run_batch<A>(
    adapter: &A,
    commands: Vec<BatchCommand>,
    options: &BatchOptions,
) -> Result<Vec<CommandResult>, DeviceError>
where
    A: DeviceAdapter + ?Sized,
{
    lifecycle::ensure_initialized(adapter.platform(), adapter.is_initialized())?;

    match options.mode {
        BatchMode::Sequential => {
            let mut results = Vec::with_capacity(commands.len());
            for entry in commands {
                let result = execute_entry(adapter, entry, &options.execution).await;
                let failed = !result.success;
                results.push(result);
                if failed && !options.continue_on_error {
                    tracing::debug!(completed = results.len(), "stopping batch at first failure");
                    break;
                }
            }
            Ok(results)
        }
        BatchMode::Parallel => {
            let results = join_all(
                commands
                    .into_iter()
                    .map(|entry| execute_entry(adapter, entry, &options.execution)),
            )
            .await;
            if !options.continue_on_error
                && let Some(first) = first_failure(&results)
            {
                tracing::warn!(
                    device_id = %first.device_id,
                    error = ?first.error.as_ref().map(ToString::to_string),
                    "parallel batch had failures"
                );
            }
            Ok(results)
        }
    }
}

/// The earliest failed result of a batch, in input order.
#[must_use]
pub fn first_failure(results: &[CommandResult]) -> Option<&CommandResult> {
    results.iter().find(|result| !result.success)
}

async fn execute_entry<A>(
    adapter: &A,
    entry: BatchCommand,
    options: &CommandExecutionOptions,
) -> CommandResult
where
    A: DeviceAdapter + ?Sized,
{
    let BatchCommand { device_id, command } = entry;
    match adapter
        .execute_command(&device_id, command.clone(), options)
        .await
    {
        Ok(result) => result,
        Err(err) => CommandResult::failed(device_id, command, err),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::sync::broadcast;
    use tokio_util::sync::CancellationToken;

    use omnihub_domain::capability::Capability;
    use omnihub_domain::error::ErrorKind;
    use omnihub_domain::filter::DeviceFilter;
    use omnihub_domain::health::HealthStatus;
    use omnihub_domain::location::{Location, Room, Scene, SceneResult};
    use omnihub_domain::platform::Platform;

    use super::*;
    use crate::capability_map::CapabilityTable;
    use crate::event_bus::InProcessEventBus;

    const TABLE: CapabilityTable = CapabilityTable::new(
        &[
            ("switch", Capability::Switch),
            ("switchLevel", Capability::Dimmer),
            ("motionSensor", Capability::MotionSensor),
        ],
        &[],
    );

    struct FakeAdapter {
        initialized: AtomicBool,
        devices: Vec<UnifiedDevice>,
        outcomes: Mutex<VecDeque<Result<(), DeviceError>>>,
        dispatched: Mutex<Vec<String>>,
        state_fails: AtomicBool,
        dispatch_delay: Duration,
        bus: InProcessEventBus,
    }

    impl FakeAdapter {
        fn new() -> Self {
            let id = |raw: &str| UniversalDeviceId::new(Platform::SmartThings, raw);
            Self {
                initialized: AtomicBool::new(true),
                devices: vec![
                    UnifiedDevice::builder(id("lamp"))
                        .name("Lamp")
                        .capabilities([Capability::Switch, Capability::Dimmer])
                        .build()
                        .unwrap(),
                    UnifiedDevice::builder(id("hall"))
                        .name("Hall Motion")
                        .capability(Capability::MotionSensor)
                        .build()
                        .unwrap(),
                    UnifiedDevice::builder(id("plug"))
                        .name("Plug")
                        .capability(Capability::Switch)
                        .build()
                        .unwrap(),
                ],
                outcomes: Mutex::new(VecDeque::new()),
                dispatched: Mutex::new(Vec::new()),
                state_fails: AtomicBool::new(false),
                dispatch_delay: Duration::ZERO,
                bus: InProcessEventBus::new(16),
            }
        }

        fn script(&self, outcomes: impl IntoIterator<Item = Result<(), DeviceError>>) {
            self.outcomes.lock().unwrap().extend(outcomes);
        }

        fn dispatched(&self) -> Vec<String> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    impl DeviceAdapter for FakeAdapter {
        fn platform(&self) -> Platform {
            Platform::SmartThings
        }

        async fn initialize(&self) -> Result<(), DeviceError> {
            self.initialized.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn dispose(&self) {
            self.initialized.store(false, Ordering::SeqCst);
        }

        fn is_initialized(&self) -> bool {
            self.initialized.load(Ordering::SeqCst)
        }

        async fn health_check(&self) -> HealthStatus {
            HealthStatus::healthy(Platform::SmartThings)
        }

        async fn list_devices(
            &self,
            filter: Option<&DeviceFilter>,
        ) -> Result<Vec<UnifiedDevice>, DeviceError> {
            let devices = self.devices.clone();
            Ok(filter.map_or(devices.clone(), |f| f.apply(devices)))
        }

        async fn get_device(&self, id: &UniversalDeviceId) -> Result<UnifiedDevice, DeviceError> {
            self.devices
                .iter()
                .find(|d| d.id() == id)
                .cloned()
                .ok_or_else(|| DeviceError::device_not_found(id))
        }

        async fn get_device_state(&self, id: &UniversalDeviceId) -> Result<DeviceState, DeviceError> {
            self.refresh_device_state(id).await
        }

        async fn refresh_device_state(
            &self,
            id: &UniversalDeviceId,
        ) -> Result<DeviceState, DeviceError> {
            if self.state_fails.load(Ordering::SeqCst) {
                return Err(DeviceError::network("status endpoint down"));
            }
            Ok(DeviceState::new(id.clone()).with(Capability::Switch, "switch", "on"))
        }

        async fn execute_command(
            &self,
            id: &UniversalDeviceId,
            command: DeviceCommand,
            options: &CommandExecutionOptions,
        ) -> Result<CommandResult, DeviceError> {
            run_command(self, id, command, options).await
        }

        fn map_platform_capability(&self, native: &str) -> Option<Capability> {
            TABLE.to_universal(native)
        }

        fn map_unified_capability(&self, capability: Capability) -> Option<&'static str> {
            TABLE.to_native(capability)
        }

        async fn list_locations(&self) -> Result<Vec<Location>, DeviceError> {
            Ok(Vec::new())
        }

        async fn list_rooms(&self, _location_id: Option<&str>) -> Result<Vec<Room>, DeviceError> {
            Ok(Vec::new())
        }

        fn supports_scenes(&self) -> bool {
            false
        }

        async fn list_scenes(&self, _location_id: Option<&str>) -> Result<Vec<Scene>, DeviceError> {
            Ok(Vec::new())
        }

        async fn execute_scene(&self, scene_id: &str) -> Result<SceneResult, DeviceError> {
            Ok(SceneResult::failed(
                scene_id,
                DeviceError::not_supported("no scenes"),
            ))
        }

        fn subscribe(&self) -> broadcast::Receiver<StateChangeNotification> {
            self.bus.subscribe()
        }
    }

    impl CommandDispatcher for FakeAdapter {
        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::default()
        }

        fn event_bus(&self) -> &InProcessEventBus {
            &self.bus
        }

        async fn dispatch(
            &self,
            device: &UnifiedDevice,
            _native: &'static str,
            _command: &DeviceCommand,
        ) -> Result<(), DeviceError> {
            self.dispatched
                .lock()
                .unwrap()
                .push(device.platform_device_id().to_string());
            if !self.dispatch_delay.is_zero() {
                tokio::time::sleep(self.dispatch_delay).await;
            }
            let next = self.outcomes.lock().unwrap().pop_front();
            next.unwrap_or(Ok(()))
        }
    }

    fn id(raw: &str) -> UniversalDeviceId {
        UniversalDeviceId::new(Platform::SmartThings, raw)
    }

    #[tokio::test(start_paused = true)]
    async fn should_succeed_and_attach_confirmed_state() {
        let adapter = FakeAdapter::new();
        let mut events = adapter.subscribe();

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_on(), &CommandExecutionOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.retry_count, 0);
        let state = result.new_state.unwrap();
        assert_eq!(state.get("switch.switch").unwrap().as_str(), Some("on"));

        let event = events.recv().await.unwrap();
        assert_eq!(event.correlation_id, Some(result.correlation_id));
        assert!(event.diff.added.contains_key("switch.switch"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_capture_capability_not_supported_for_sensor_only_device() {
        let adapter = FakeAdapter::new();

        let result = adapter
            .execute_command(&id("hall"), DeviceCommand::switch_on(), &CommandExecutionOptions::default())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(
            result.error.unwrap().kind(),
            ErrorKind::CapabilityNotSupported
        );
        assert!(adapter.dispatched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_commands_on_read_only_capability_as_not_supported() {
        let adapter = FakeAdapter::new();
        let command = DeviceCommand::new(Capability::MotionSensor, "activate");

        let result = adapter
            .execute_command(&id("hall"), command, &CommandExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.error.unwrap().kind(), ErrorKind::NotSupported);
    }

    #[tokio::test(start_paused = true)]
    async fn should_capture_invalid_command_before_dispatch() {
        let adapter = FakeAdapter::new();
        let command = DeviceCommand::new(Capability::Dimmer, "setLevel");

        let result = adapter
            .execute_command(&id("lamp"), command, &CommandExecutionOptions::default())
            .await
            .unwrap();

        assert_eq!(result.error.unwrap().kind(), ErrorKind::InvalidCommand);
        assert!(adapter.dispatched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_raise_when_not_initialized() {
        let adapter = FakeAdapter::new();
        adapter.dispose().await;

        let err = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_on(), &CommandExecutionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test(start_paused = true)]
    async fn should_raise_for_device_of_another_platform() {
        let adapter = FakeAdapter::new();
        let foreign = UniversalDeviceId::new(Platform::Lutron, "lamp");

        let err = adapter
            .execute_command(&foreign, DeviceCommand::switch_on(), &CommandExecutionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::DeviceNotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_configuration_before_ownership_when_not_initialized() {
        let adapter = FakeAdapter::new();
        adapter.dispose().await;
        let foreign = UniversalDeviceId::new(Platform::Lutron, "lamp");

        let err = adapter
            .execute_command(&foreign, DeviceCommand::switch_on(), &CommandExecutionOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test(start_paused = true)]
    async fn should_count_retries_of_transient_failures() {
        let adapter = FakeAdapter::new();
        adapter.script([
            Err(DeviceError::network("reset")),
            Err(DeviceError::rate_limit(Some(Duration::from_secs(1)))),
        ]);

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_off(), &CommandExecutionOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.retry_count, 2);
        assert_eq!(adapter.dispatched().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fail_with_last_error_after_exhausting_retries() {
        let adapter = FakeAdapter::new();
        adapter.script((0..10).map(|_| Err(DeviceError::network("down"))));
        let options = CommandExecutionOptions::default().max_retries(1);

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_on(), &options)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.retry_count, 1);
        assert_eq!(adapter.dispatched().len(), 2);
        let err = result.error.unwrap();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.context().platform, Some(Platform::SmartThings));
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_slow_dispatch() {
        let mut adapter = FakeAdapter::new();
        adapter.dispatch_delay = Duration::from_secs(60);
        let options = CommandExecutionOptions::default()
            .timeout(Duration::from_secs(1))
            .max_retries(0);

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_on(), &options)
            .await
            .unwrap();

        assert_eq!(result.error.unwrap().kind(), ErrorKind::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_cancellation_distinctly() {
        let adapter = FakeAdapter::new();
        let token = CancellationToken::new();
        token.cancel();
        let options = CommandExecutionOptions::default().cancellation(token);

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_on(), &options)
            .await
            .unwrap();

        assert_eq!(result.error.unwrap().kind(), ErrorKind::Cancelled);
        assert!(adapter.dispatched().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_succeed_without_state_when_confirmation_read_fails() {
        let adapter = FakeAdapter::new();
        adapter.state_fails.store(true, Ordering::SeqCst);

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::set_level(30), &CommandExecutionOptions::default())
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.new_state.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_confirmation_when_not_requested() {
        let adapter = FakeAdapter::new();
        let options = CommandExecutionOptions::default().without_confirmation();

        let result = adapter
            .execute_command(&id("lamp"), DeviceCommand::switch_on(), &options)
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.new_state.is_none());
    }

    fn batch(ids: &[&str]) -> Vec<BatchCommand> {
        ids.iter()
            .map(|raw| BatchCommand::new(id(raw), DeviceCommand::switch_on()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_sequential_batch_at_first_failure() {
        let adapter = FakeAdapter::new();
        adapter.script([Ok(()), Err(DeviceError::command_execution("jammed", false))]);
        let options = BatchOptions::sequential().stop_on_error();

        let results = adapter
            .execute_batch_commands(batch(&["lamp", "plug", "lamp", "plug"]), &options)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
        assert_eq!(adapter.dispatched(), ["lamp", "plug"]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_continue_sequential_batch_when_allowed() {
        let adapter = FakeAdapter::new();
        adapter.script([Err(DeviceError::command_execution("jammed", false))]);

        let results = adapter
            .execute_batch_commands(batch(&["lamp", "hall", "plug"]), &BatchOptions::sequential())
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(!results[0].success);
        assert_eq!(
            results[1].error.as_ref().unwrap().kind(),
            ErrorKind::CapabilityNotSupported
        );
        assert!(results[2].success);
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_every_parallel_command_even_after_failure() {
        let adapter = FakeAdapter::new();
        adapter.script([Err(DeviceError::command_execution("jammed", false))]);
        let options = BatchOptions::parallel().stop_on_error();

        let results = adapter
            .execute_batch_commands(batch(&["lamp", "plug", "lamp"]), &options)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| !r.success).count(), 1);
        assert_eq!(adapter.dispatched().len(), 3);

        let index = results.iter().position(|r| !r.success).unwrap();
        let first = first_failure(&results).unwrap();
        assert!(std::ptr::eq(first, &results[index]));
        assert_eq!(first.error.as_ref().unwrap().kind(), ErrorKind::CommandExecution);
    }

    #[test]
    fn should_find_no_failure_in_empty_batch() {
        assert!(first_failure(&[]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_degrade_foreign_batch_entry_to_failed_result() {
        let adapter = FakeAdapter::new();
        let mut commands = batch(&["lamp"]);
        commands.push(BatchCommand::new(
            UniversalDeviceId::new(Platform::Lutron, "9"),
            DeviceCommand::switch_on(),
        ));

        let results = adapter
            .execute_batch_commands(commands, &BatchOptions::parallel())
            .await
            .unwrap();

        assert!(results[0].success);
        assert_eq!(
            results[1].error.as_ref().unwrap().kind(),
            ErrorKind::DeviceNotFound
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_raise_for_batch_before_initialization() {
        let adapter = FakeAdapter::new();
        adapter.dispose().await;

        let err = adapter
            .execute_batch_commands(batch(&["lamp"]), &BatchOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
