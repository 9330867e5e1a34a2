//! Retry policy, error classification and the retry loops.
//!
//! A failed attempt is retried when the error is retriable and the retry
//! budget is not exhausted. The delay before retry `k` (0-indexed) is
//! `initial_backoff * 2^k`; there is no jitter and no cap. The classifier
//! is shared by the async and blocking loops, so both retry the same errors.

use crate::config::RetryConfig;
use crate::{HttpClientError, Result, interrupt};
use std::future::Future;
use std::time::Duration;

/// Retry budget for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy with `max_retries` retries after the first attempt.
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Policy from the global retry settings.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_interval_ms),
        )
    }

    /// Resolve the policy of one call.
    ///
    /// - per-call `max_retries == 0`: single attempt
    /// - per-call `max_retries > 0`: that count, with the per-call interval
    ///   or else the global one
    /// - only a per-call interval: global count with that interval
    /// - nothing per-call: the global policy
    pub fn resolve(
        max_retries: Option<u32>,
        retry_interval_ms: Option<u64>,
        global: &RetryConfig,
    ) -> Self {
        let interval = |ms: Option<u64>| Duration::from_millis(ms.unwrap_or(global.retry_interval_ms));
        match (max_retries, retry_interval_ms) {
            (Some(0), _) => Self::none(),
            (Some(max), ms) => Self::new(max, interval(ms)),
            (None, Some(ms)) => Self::new(global.max_retries, Duration::from_millis(ms)),
            (None, None) => Self::from_config(global),
        }
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry `retry` (0-indexed).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Retry strategy trait for custom retry logic.
pub trait RetryStrategy: Send + Sync {
    /// Check if the request should be retried after `retry` earlier retries.
    fn should_retry(&self, retry: u32, error: &HttpClientError) -> bool;

    /// Get the delay before the next retry.
    fn retry_delay(&self, retry: u32) -> Duration;

    /// Retry budget, reported in retry logs.
    fn max_retries(&self) -> u32;
}

impl RetryStrategy for RetryPolicy {
    fn should_retry(&self, retry: u32, error: &HttpClientError) -> bool {
        retry < self.max_retries && is_retriable(error)
    }

    fn retry_delay(&self, retry: u32) -> Duration {
        self.backoff(retry)
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Whether an error is worth another attempt.
///
/// Server errors (5xx), `429 Too Many Requests` and failures that never
/// produced a response are retriable. Everything else, including the total
/// timeout, decoding failures and other 4xx statuses, is not.
pub fn is_retriable(error: &HttpClientError) -> bool {
    match error {
        HttpClientError::Status { status, .. } => {
            status.is_server_error() || status.as_u16() == 429
        }
        HttpClientError::Transport { .. } | HttpClientError::Io(_) => true,
        _ => false,
    }
}

fn log_retry(retry: u32, max_retries: u32, error: &HttpClientError) {
    tracing::warn!(
        attempt = retry + 1,
        max_retries,
        error_kind = error.kind_name(),
        error = %error,
        "Retrying request"
    );
}

/// Run `operation` until it succeeds or the strategy gives up, sleeping on
/// the tokio timer between attempts.
///
/// Dropping the returned future cancels any pending attempt or delay.
pub async fn retry_async<S, T, F, Fut>(strategy: &S, mut operation: F) -> Result<T>
where
    S: RetryStrategy + ?Sized,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retry = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if strategy.should_retry(retry, &err) => {
                log_retry(retry, strategy.max_retries(), &err);
                tokio::time::sleep(strategy.retry_delay(retry)).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Run `operation` on the calling thread until it succeeds or the strategy
/// gives up.
///
/// Delays are interruptible through [`interrupt::current`]; an interrupted
/// delay fails the call with [`HttpClientError::Interrupted`] and leaves the
/// thread's interrupt flag set.
pub fn retry_blocking<S, T, F>(strategy: &S, operation: F) -> Result<T>
where
    S: RetryStrategy + ?Sized,
    F: FnMut() -> Result<T>,
{
    retry_blocking_with(strategy, operation, interrupt::sleep)
}

/// [`retry_blocking`] with a custom delay function.
pub fn retry_blocking_with<S, T, F, D>(strategy: &S, mut operation: F, mut delay: D) -> Result<T>
where
    S: RetryStrategy + ?Sized,
    F: FnMut() -> Result<T>,
    D: FnMut(Duration) -> Result<()>,
{
    let mut retry = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if strategy.should_retry(retry, &err) => {
                if interrupt::is_interrupted() {
                    return Err(HttpClientError::Interrupted);
                }
                log_retry(retry, strategy.max_retries(), &err);
                delay(strategy.retry_delay(retry))?;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
