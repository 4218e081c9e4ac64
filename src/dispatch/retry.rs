use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::DispatchError;

/// Bounded resubmission for jobs that provably never reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// the attempts are used up. The wait grows linearly with each attempt.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DispatchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tried = 1;
        loop {
            match attempt().await {
                Err(e) if e.is_retryable() && tried < max_attempts => {
                    warn!(error = %e, attempt = tried, "Retrying job");
                    tokio::time::sleep(self.backoff * tried).await;
                    tried += 1;
                }
                other => return other,
            }
        }
    }
}
