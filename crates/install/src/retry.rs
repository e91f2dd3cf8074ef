//! Retrying recoverable failures with exponential backoff

use std::future::Future;
use std::time::Duration;

use e14z_config::RetryConfig;
use e14z_errors::{ClassifiedError, Error};
use tokio_util::sync::CancellationToken;

/// Backoff schedule and attempt bound
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomly added or removed
    pub jitter_factor: f64,
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            jitter_factor: config.jitter_factor,
        }
    }

    /// Single attempt, no waiting
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    ///
    /// `initial * multiplier^(attempt - 1)`, capped at `max_delay`, then
    /// jittered.
    #[must_use]
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let base_delay = self.initial_delay.as_millis().min(u128::from(u64::MAX)) as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_delay = self.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = (base_delay * self.backoff_multiplier.powi(exponent)).min(max_delay);

        let jitter = delay * self.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let final_delay = (delay + jitter).clamp(0.0, max_delay).round() as u64;

        Duration::from_millis(final_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// A failed attempt that is about to be retried
#[derive(Debug, Clone)]
pub struct RetryNotice<'a> {
    pub attempt: u32,
    pub delay: Duration,
    pub classified: &'a ClassifiedError,
}

/// Run `op` until it succeeds, fails unrecoverably or runs out of attempts
///
/// `op` receives the 1-based attempt number. The last error is returned
/// unchanged so its classification survives.
///
/// # Errors
///
/// Returns the first unrecoverable error, the last error once attempts
/// are exhausted, or [`Error::Cancelled`] if `cancel` fires while waiting.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    op: F,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    execute_with_retry_notify(policy, cancel, op, |_| {}).await
}

/// [`execute_with_retry`] with a callback before each wait
///
/// # Errors
///
/// See [`execute_with_retry`].
pub async fn execute_with_retry_notify<T, F, Fut, N>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
    mut notify: N,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
    N: FnMut(&RetryNotice<'_>),
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 1;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let classified = err.classify();
        if !classified.recoverable() || attempt >= attempts {
            tracing::debug!(
                attempt,
                category = %classified.category(),
                recoverable = classified.recoverable(),
                "giving up"
            );
            return Err(err);
        }

        let delay = policy.calculate_backoff_delay(attempt);
        tracing::warn!(
            attempt,
            max_attempts = attempts,
            ?delay,
            category = %classified.category(),
            error = %err,
            "recoverable failure, retrying"
        );
        notify(&RetryNotice {
            attempt,
            delay,
            classified: &classified,
        });

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => return Err(Error::Cancelled),
        }
        attempt += 1;
    }
}
