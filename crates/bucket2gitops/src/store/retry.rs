//! Retry with exponential backoff for object fetches.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::error::{Result, StoreError};

/// How transient failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (default: 3).
    pub max_attempts: u32,
    /// Delay before the first retry, before jitter (default: 500ms).
    pub base_delay: Duration,
    /// Upper bound for any single delay (default: 30s).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Runs `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent.
    pub async fn run<F, Fut, T>(&self, key: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(StoreError::RetriesExhausted {
                        key: key.to_string(),
                        attempts: attempt,
                        source: Box::new(e),
                    })
                }
                Err(e) => {
                    let jitter: f64 = rand::thread_rng().gen();
                    let delay = backoff_delay(attempt - 1, self.base_delay, self.max_delay, jitter);
                    log::warn!(
                        "Attempt {}/{} for '{}' failed ({}), retrying in {:?}",
                        attempt,
                        max_attempts,
                        key,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Computes the delay before retry number `attempt` (0-based).
///
/// The exponential delay `base * 2^attempt`, capped at `max`, is split in half:
/// one half is always waited, the other is scaled by `jitter` in `[0, 1)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31));
    let exponential = base.saturating_mul(factor).min(max);
    let half = exponential / 2;
    let jitter = if jitter.is_finite() {
        jitter.clamp(0.0, 1.0)
    } else {
        0.0
    };
    half + half.mul_f64(jitter)
}
