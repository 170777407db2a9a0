//! Retry with capped exponential backoff for overloaded providers.

use std::future::Future;
use std::time::Duration;

use crate::error::HostError;

/// Retry policy configuration.
///
/// Only errors for which [`HostError::is_transient`] holds are retried.
/// The wait doubles after every failed attempt and is capped at
/// `max_backoff`; there is no jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for a single wait.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total time spent sleeping when every attempt fails.
    pub fn worst_case_delay(&self) -> Duration {
        let mut backoff = self.initial_backoff;
        let mut total = Duration::ZERO;
        for _ in 0..self.max_retries {
            total += backoff;
            backoff = (backoff * 2).min(self.max_backoff);
        }
        total
    }

    /// Execute an async operation, backing off while the provider reports overload.
    ///
    /// Non-transient errors are returned unchanged on first occurrence.
    /// Exhausting the retries yields [`HostError::ServiceOverloaded`].
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, HostError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HostError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => {
                    if retries >= self.max_retries {
                        tracing::error!(
                            attempts = retries + 1,
                            error = %e,
                            "Provider still overloaded, giving up"
                        );
                        return Err(HostError::ServiceOverloaded {
                            attempts: retries + 1,
                        });
                    }

                    tracing::warn!(
                        attempt = retries + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Provider overloaded, backing off"
                    );
                    tokio::time::sleep(backoff).await;

                    backoff = (backoff * 2).min(self.max_backoff);
                    retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
