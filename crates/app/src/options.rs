//! Per-call execution options for commands and batches.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Default bound on a single platform call.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for one `execute_command` call.
#[derive(Debug, Clone)]
pub struct CommandExecutionOptions {
    /// Bound on each dispatch attempt.
    pub timeout: Duration,
    /// Overrides the adapter's configured retry ceiling.
    pub max_retries: Option<u32>,
    /// Re-read device state after success and attach it to the result.
    pub wait_for_confirmation: bool,
    /// Checked before every attempt and during backoff sleeps.
    pub cancellation: Option<CancellationToken>,
}

impl Default for CommandExecutionOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            max_retries: None,
            wait_for_confirmation: true,
            cancellation: None,
        }
    }
}

impl CommandExecutionOptions {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn without_confirmation(mut self) -> Self {
        self.wait_for_confirmation = false;
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// How a batch schedules its commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// One at a time, in input order.
    #[default]
    Sequential,
    /// All at once; results keep input order, execution order is unspecified.
    Parallel,
}

/// Options for `execute_batch_commands`.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: BatchMode,
    /// In sequential mode, `false` stops at the first failed command.
    /// Parallel batches always run every command to completion.
    pub continue_on_error: bool,
    /// Applied to every command in the batch.
    pub execution: CommandExecutionOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::Sequential,
            continue_on_error: true,
            execution: CommandExecutionOptions::default(),
        }
    }
}

impl BatchOptions {
    #[must_use]
    pub fn sequential() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn parallel() -> Self {
        Self {
            mode: BatchMode::Parallel,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn stop_on_error(mut self) -> Self {
        self.continue_on_error = false;
        self
    }

    #[must_use]
    pub fn execution(mut self, execution: CommandExecutionOptions) -> Self {
        self.execution = execution;
        self
    }
}
