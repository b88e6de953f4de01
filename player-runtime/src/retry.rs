//! # Bounded Retry Policy
//!
//! The retry-with-delay pattern as an explicit value instead of nested
//! callbacks: a policy names its attempt budget and backoff curve, and
//! `run` drives any fallible async operation under it.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// A bounded retry schedule with exponential backoff.
///
/// Attempt `n` (zero-based) that fails retryably sleeps
/// `initial_backoff * 2^n` before the next try. A policy with
/// `max_attempts == 1` never retries.
///
/// # Example
///
/// ```rust
/// use player_runtime::RetryPolicy;
/// use std::time::Duration;
///
/// // The single-retry-after-100ms schedule used for transient aborts.
/// let policy = RetryPolicy::once_after(Duration::from_millis(100));
/// assert_eq!(policy.max_attempts(), 2);
/// assert_eq!(policy.backoff(0), Duration::from_millis(100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy with a total attempt budget (first try included) and
    /// the backoff before the first retry.
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// A single retry after `delay`.
    pub fn once_after(delay: Duration) -> Self {
        Self::new(2, delay)
    }

    /// No retries at all.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempt budget, first try included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff slept after the zero-based `attempt` fails.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Drive `op` until it succeeds, fails non-retryably, or exhausts the
    /// attempt budget.
    ///
    /// `retryable` inspects each error; only errors it accepts consume a
    /// backoff sleep and another attempt.
    ///
    /// # Errors
    ///
    /// Returns the final error: the first non-retryable one, or the last
    /// retryable one once the budget is spent.
    pub async fn run<T, E, F, Fut>(&self, mut op: F, retryable: impl Fn(&E) -> bool) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retryable(&e) && attempt + 1 < self.max_attempts => {
                    let backoff = self.backoff(attempt);
                    warn!(
                        "operation failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.max_attempts,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt + 1 >= self.max_attempts && retryable(&e) {
                        warn!("operation failed after {} attempts: {}", self.max_attempts, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
