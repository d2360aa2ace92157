//! Retry loop for transient Overpass failures

use std::future::Future;
use std::time::Duration;

use crate::error::QueryError;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Stepped backoff: after the n-th failed attempt, wait `step * round(n / 3)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Unit of the backoff schedule.
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 9,
            step: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            step,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = (f64::from(attempt) / 3.0).round() as u32;
        self.step.saturating_mul(factor)
    }

    /// `attempt` is 1-based. Only transient errors are retried, and never
    /// after the last allowed attempt.
    pub fn decide(&self, attempt: u32, error: &QueryError) -> RetryDecision {
        if attempt >= self.max_attempts || !error.is_transient() {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }

    /// Sum of every delay a fully failing query would wait
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|attempt| self.backoff(attempt)).sum()
    }
}

/// Runs `f` until it succeeds or the policy says to stop; the last error is returned.
pub async fn run_with_retry<F, Fut, T>(policy: &RetryPolicy, mut f: F) -> Result<T, QueryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, QueryError>>,
{
    let mut attempt = 1u32;
    loop {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => match policy.decide(attempt, &e) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        error = %e,
                        retries_left = policy.max_attempts - attempt,
                        delay_secs = delay.as_secs(),
                        "Transient Overpass failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            },
        }
    }
}
