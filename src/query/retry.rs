//! # Retry Envelope
//!
//! Bounded retry with exponential backoff around a single store call.
//! Only transient failures (connection, timeout, unavailable) are retried;
//! each attempt is time-boxed and the whole series honours cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::errors::{QueryError, QueryResult};
use crate::observability::{Event, MetricsRegistry};
use crate::store::{StoreError, StoreResult};

/// Default number of attempts per operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between attempts
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default bound on a single attempt
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Retry settings for store calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay after failed attempt `n` is `base_delay * 2^n`
    pub base_delay: Duration,

    /// Upper bound on one attempt; `None` disables the bound
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sleep after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Total sleep if every attempt fails
    pub fn max_total_delay(&self) -> Duration {
        (1..self.max_attempts.max(1))
            .map(|attempt| self.backoff(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Run `attempt_fn` until it succeeds, fails permanently, runs out of
    /// attempts or is cancelled
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: Option<&CancellationToken>,
        metrics: &MetricsRegistry,
        mut attempt_fn: F,
    ) -> QueryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            if cancel.map_or(false, CancellationToken::is_cancelled) {
                return Err(cancelled(operation, attempt));
            }
            attempt += 1;

            let outcome = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled(operation, attempt)),
                    outcome = self.bounded(attempt_fn()) => outcome,
                },
                None => self.bounded(attempt_fn()).await,
            };

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            metrics.increment_attempt_failures();

            if !error.is_transient() {
                warn!(
                    event = Event::QueryAttemptFailed.as_str(),
                    operation,
                    attempt,
                    kind = error.kind().as_str(),
                    error = %error,
                );
                return Err(QueryError::from_store(operation, attempt, error));
            }
            if attempt >= max_attempts {
                return Err(QueryError::from_store(operation, attempt, error));
            }

            let delay = self.backoff(attempt);
            metrics.increment_retries();
            warn!(
                event = Event::QueryRetry.as_str(),
                operation,
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
            );

            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(cancelled(operation, attempt)),
                    _ = tokio::time::sleep(delay) => {}
                },
                None => tokio::time::sleep(delay).await,
            }
        }
    }

    async fn bounded<T, Fut>(&self, attempt: Fut) -> StoreResult<T>
    where
        Fut: Future<Output = StoreResult<T>>,
    {
        match self.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(outcome) => outcome,
                Err(_) => Err(StoreError::timeout(format!(
                    "attempt exceeded {} ms",
                    limit.as_millis()
                ))),
            },
            None => attempt.await,
        }
    }
}

fn cancelled(operation: &str, attempts: u32) -> QueryError {
    warn!(event = Event::QueryCancelled.as_str(), operation, attempts);
    QueryError::Cancelled {
        operation: operation.to_string(),
        attempts,
    }
}
