use std::future::Future;
use std::time::Duration;

use super::error::AnswerResult;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Best-effort retry for idempotent backend calls.
///
/// There is no delivery guarantee: once `max_attempts` is spent the last error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BACKOFF)
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub const fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out.
    ///
    /// Backoff grows linearly with the attempt number.
    pub async fn run<T, F, Fut>(&self, stage: &'static str, mut operation: F) -> AnswerResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AnswerResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        stage,
                        attempt,
                        max_attempts,
                        error = %error,
                        "backend call failed; retrying"
                    );
                    tokio::time::sleep(self.backoff.saturating_mul(attempt)).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}
