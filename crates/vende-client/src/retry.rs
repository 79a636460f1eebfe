//! Retry with exponential backoff and jitter.
//!
//! A failed attempt is retried unless the server rejected the request itself
//! (4xx other than 408 and 429). The delay before retry `n` (0-based) is
//! `base * 2^n` plus up to 10% random jitter, capped at [`MAX_RETRY_DELAY`].

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::normalize::Failure;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay.
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Jitter is drawn from `[0, JITTER_RATIO * exponential_delay)`.
pub const JITTER_RATIO: f64 = 0.1;

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, before jitter.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            max_delay: MAX_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with custom retry count and base delay.
    #[must_use]
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt` (0-based), with jitter from `rng`.
    #[must_use]
    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let factor = 2f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let exponential = self.base_delay.as_secs_f64() * factor;
        let max_jitter = exponential * JITTER_RATIO;
        let jitter = if max_jitter > 0.0 && max_jitter.is_finite() {
            rng.gen_range(0.0..max_jitter)
        } else {
            0.0
        };
        let cap = self.max_delay.as_secs_f64();
        Duration::from_secs_f64((exponential + jitter).min(cap))
    }

    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }
}

/// Whether a failed attempt may be retried.
///
/// Client errors are final except request timeout (408) and rate limiting
/// (429). Server errors, network errors and unclassified failures are retried.
#[must_use]
pub fn is_retryable(failure: &Failure) -> bool {
    match failure.status() {
        Some(status) if (400..500).contains(&status) => matches!(status, 408 | 429),
        _ => true,
    }
}

/// Run `request` until it succeeds, fails with a final error, or the policy
/// is exhausted. Attempts are strictly sequential.
///
/// # Errors
///
/// Returns the last failure when it is not retryable or after
/// `max_retries + 1` attempts.
pub async fn execute_with_retry<F, Fut, T>(policy: &RetryPolicy, mut request: F) -> Result<T, Failure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let mut attempt_count: u32 = 0;

    loop {
        let failure = match request().await {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };

        if !is_retryable(&failure) {
            tracing::debug!(%failure, attempts = attempt_count + 1, "request failed, not retryable");
            return Err(failure);
        }
        if attempt_count >= policy.max_retries {
            tracing::debug!(%failure, attempts = attempt_count + 1, "request failed, retries exhausted");
            return Err(failure);
        }

        let delay = policy.delay(attempt_count);
        attempt_count += 1;
        tracing::warn!(
            %failure,
            attempt = attempt_count,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}
