//! Bounded retry with exponential backoff and jitter.
//!
//! Only retryable [`DeviceError`]s are retried. A platform-provided
//! `retry_after` (rate limiting) is honored exactly; otherwise the delay is
//! `min(base * 2^n, max)` spread by ±`jitter`.

use std::future::Future;
use std::time::Duration;

use omnihub_domain::error::DeviceError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Retry configuration shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; at most `max_retries + 1` calls.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Relative spread applied to computed backoff delays (`0.2` = ±20 %).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Un-jittered delay before retry number `retry` (zero-based).
    #[must_use]
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1_u64.checked_shl(retry).unwrap_or(u64::MAX);
        let delay = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Delay before the next attempt after `error`.
    #[must_use]
    pub fn delay_for(&self, error: &DeviceError, retry: u32, rng: &mut impl Rng) -> Duration {
        if let Some(retry_after) = error.retry_after() {
            return retry_after;
        }
        let base = self.backoff_delay(retry);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter <= f64::EPSILON {
            return base;
        }
        base.mul_f64(1.0 + rng.gen_range(-jitter..=jitter))
    }
}

/// The outcome of a retried operation and how many retries it took.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, DeviceError>,
    pub retries: u32,
}

impl<T> Attempted<T> {
    /// Drop the retry count.
    ///
    /// # Errors
    ///
    /// Returns the final error when every attempt failed.
    pub fn into_result(self) -> Result<T, DeviceError> {
        self.result
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or
/// `policy.max_retries` retries are spent.
///
/// `cancel` is checked before every attempt and raced against every backoff
/// sleep; cancellation yields a `Cancelled` error, never a timeout.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
    operation: &str,
    mut attempt: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeviceError>>,
{
    let mut retries = 0;
    loop {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Attempted {
                result: Err(DeviceError::cancelled().with_operation(operation)),
                retries,
            };
        }

        let err = match attempt().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    retries,
                };
            }
            Err(err) => err,
        };

        if !err.is_retryable() || retries >= policy.max_retries {
            return Attempted {
                result: Err(err),
                retries,
            };
        }

        let delay = policy.delay_for(&err, retries, &mut rand::thread_rng());
        retries += 1;
        tracing::warn!(
            operation,
            attempt = retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            kind = %err.kind(),
            error = %err,
            "retrying after failure"
        );

        match cancel {
            Some(token) => {
                tokio::select! {
                    () = token.cancelled() => {
                        return Attempted {
                            result: Err(DeviceError::cancelled().with_operation(operation)),
                            retries,
                        };
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}

/// [`with_retry`] without cancellation, for discovery and state reads.
///
/// # Errors
///
/// Returns the last error once retries are exhausted or a non-retryable
/// error occurs.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    attempt: F,
) -> Result<T, DeviceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeviceError>>,
{
    with_retry(policy, None, operation, attempt)
        .await
        .into_result()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use omnihub_domain::error::ErrorKind;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tokio::time::Instant;

    use super::*;

    fn failing(
        calls: &Arc<AtomicU32>,
        make: fn() -> DeviceError,
    ) -> impl FnMut() -> std::future::Ready<Result<(), DeviceError>> {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(make()))
        }
    }

    #[test]
    fn should_double_backoff_until_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(30));
        assert_eq!(policy.backoff_delay(200), Duration::from_secs(30));
    }

    #[test]
    fn should_keep_jitter_within_twenty_percent() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(7);
        let err = DeviceError::network("down");
        for retry in 0..5 {
            let base = policy.backoff_delay(retry);
            for _ in 0..50 {
                let delay = policy.delay_for(&err, retry, &mut rng);
                assert!(delay >= base.mul_f64(0.8) && delay <= base.mul_f64(1.2));
            }
        }
    }

    #[test]
    fn should_use_retry_after_exactly() {
        let policy = RetryPolicy::default();
        let err = DeviceError::rate_limit(Some(Duration::from_millis(2500)));
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            policy.delay_for(&err, 4, &mut rng),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn should_load_partial_policy_from_toml() {
        let policy: RetryPolicy = toml::from_str("max_retries = 5").unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.base_delay_ms, 500);
    }

    #[tokio::test(start_paused = true)]
    async fn should_attempt_at_most_max_retries_plus_one_times() {
        for make in [
            (|| DeviceError::network("down")) as fn() -> DeviceError,
            || DeviceError::timeout(Duration::from_secs(1)),
            || DeviceError::rate_limit(None),
            || DeviceError::state_sync("stale"),
            || DeviceError::command_execution("busy", true),
        ] {
            let calls = Arc::new(AtomicU32::new(0));
            let policy = RetryPolicy::default();
            let expected_kind = make().kind();

            let outcome = with_retry(&policy, None, "test", failing(&calls, make)).await;

            assert_eq!(calls.load(Ordering::SeqCst), 4);
            assert_eq!(outcome.retries, 3);
            assert_eq!(outcome.result.unwrap_err().kind(), expected_kind);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let outcome = with_retry(
            &RetryPolicy::default(),
            None,
            "test",
            failing(&calls, || DeviceError::authentication("bad token")),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.retries, 0);
        assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::Authentication);
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let outcome = with_retry(&RetryPolicy::default(), None, "test", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DeviceError::network("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(outcome.result.unwrap(), 2);
        assert_eq!(outcome.retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_at_least_retry_after_before_next_attempt() {
        let stamps = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&stamps);
        let policy = RetryPolicy::default().with_max_retries(1);

        let _ = with_retry(&policy, None, "test", move || {
            recorder.lock().unwrap().push(Instant::now());
            std::future::ready(Err::<(), _>(DeviceError::rate_limit(Some(
                Duration::from_secs(7),
            ))))
        })
        .await;

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 2);
        let waited = stamps[1] - stamps[0];
        assert!(waited >= Duration::from_secs(7));
        assert!(waited < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_cancelled_when_token_fired_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let outcome = with_retry(
            &RetryPolicy::default(),
            Some(&token),
            "test",
            failing(&calls, || DeviceError::network("down")),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let err = outcome.result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_retrying_when_cancelled_during_backoff() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let outcome = with_retry(
            &RetryPolicy::default(),
            Some(&token),
            "test",
            failing(&calls, || DeviceError::network("down")),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result.unwrap_err().kind(), ErrorKind::Cancelled);
    }
}
