//! Serialization-failure retry.
//!
//! Catalog methods are single transaction attempts. [`RetryPolicy::run`]
//! re-invokes one from the beginning whenever it fails with a serialization
//! conflict, sleeping with capped exponential backoff and jitter between
//! attempts. Any other error ends the loop immediately.

use std::future::Future;
use std::time::Duration;

use fwends_store::StoreResult;
use rand_core::{OsRng, RngCore};

use crate::error::EngineError;

/// Backoff and attempt cap for serializable transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 32,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately. Used in tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given (1-based) failed attempt.
    ///
    /// The ceiling doubles per attempt up to `max_delay`; the returned delay
    /// is drawn uniformly from the upper half of that ceiling.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(20);
        let ceiling = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let half = ceiling / 2;
        let spread = (ceiling - half).as_nanos() as u64;
        if spread == 0 {
            return ceiling;
        }
        let jitter = OsRng.next_u64() % (spread + 1);
        half + Duration::from_nanos(jitter)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt cap is reached.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        tracing::error!(operation, attempt, error = %e, "serialization retries exhausted");
                        return Err(EngineError::Internal(format!(
                            "{operation}: serialization retries exhausted after {attempt} attempts"
                        )));
                    }
                    let delay = self.delay_for(attempt);
                    tracing::debug!(operation, attempt, ?delay, error = %e, "serialization failure, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
