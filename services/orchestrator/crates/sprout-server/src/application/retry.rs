//! Bounded retry with exponential backoff.
//!
//! Centralizes the retry behavior for eventually-consistent provider reads
//! (connection-string resolution today) instead of scattering ad hoc loops
//! through provider calls.

use std::time::Duration;

use anyhow::{Context, Result};

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Attempt count and initial delay for one retried operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be at least 1.
    pub attempts: u32,
    /// Delay before the second attempt; doubles per attempt, capped.
    pub initial_delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            attempts,
            initial_delay,
        }
    }

    /// Policy for connection-string resolution: 5 attempts starting at 1s,
    /// so the saga gives the provider roughly half a minute before treating
    /// the step as a hard failure.
    #[must_use]
    pub const fn connection_string() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
///
/// # Errors
///
/// Returns the last attempt's error, with context naming the operation and
/// the attempt count.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(op = op_name, attempt, error = %err, "attempt failed");
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_DELAY);
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("no attempt executed")))
        .with_context(|| format!("{op_name} failed after {attempts} attempts"))
}
