//! Retry policy with exponential backoff, a delay floor, and an error predicate.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Errors that a [`RetryPolicy`] knows how to classify.
pub trait Retryable: Sized {
    /// Returns true if the failure was a request timeout.
    fn is_timeout(&self) -> bool;

    /// Returns true for the broader transient class (timeouts, connection
    /// failures, rate limiting, 5xx).
    fn is_transient(&self) -> bool;

    /// Build the error reported once the attempt budget is spent.
    fn exhausted(attempts: u32, last: Self) -> Self;
}

/// Which failures are eligible for another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryOn {
    /// Only request timeouts.
    #[default]
    Timeout,
    /// Any transient failure (timeouts, connection errors, 429, 5xx).
    Transient,
    /// Nothing is retried.
    Never,
}

impl RetryOn {
    /// Returns true if `err` should be retried under this predicate.
    pub fn matches<E: Retryable>(&self, err: &E) -> bool {
        match self {
            RetryOn::Timeout => err.is_timeout(),
            RetryOn::Transient => err.is_transient(),
            RetryOn::Never => false,
        }
    }
}

/// Configuration for retry behavior.
///
/// The default is the batch-unit policy: up to 10 attempts, retrying only
/// request timeouts, waiting `initial_delay * multiplier^n` clamped to
/// 4..=10 seconds.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry, before clamping.
    pub initial_delay: Duration,
    /// Minimum delay between attempts.
    pub min_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Growth factor applied per failed attempt.
    pub multiplier: f64,
    /// Which failures are retried.
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            min_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            retry_on: RetryOn::Timeout,
        }
    }
}

impl RetryConfig {
    /// Policy for a single unit of batch work.
    pub fn batch_unit() -> Self {
        Self::default()
    }

    /// A single attempt, no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            retry_on: RetryOn::Never,
            ..Self::default()
        }
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay floor.
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set which failures are retried.
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Delay after the `attempt`-th failure (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        let delay = Duration::from_secs_f64(self.initial_delay.as_secs_f64() * factor);
        delay.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Retry policy that determines when and how to retry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempt: u32,
}

impl RetryPolicy {
    /// Create a new retry policy from config.
    pub fn new(config: RetryConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Number of failed attempts recorded so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The configuration this policy was built from.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns true if another attempt is allowed after the next failure.
    pub fn should_retry(&self) -> bool {
        self.attempt + 1 < self.config.max_attempts
    }

    /// Record a failed attempt and return the delay before the next one.
    /// Returns None once the attempt ceiling is reached.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.should_retry().then(|| self.config.delay(self.attempt));
        self.attempt += 1;
        delay
    }

    /// Reset the retry policy for a new unit of work.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Run `op` until it succeeds, fails with an error outside the retry
    /// predicate, or the attempt ceiling is reached.
    pub async fn run<T, E, F, Fut>(&mut self, mut op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if self.config.retry_on.matches(&err) => match self.next_delay() {
                    Some(delay) => {
                        warn!(
                            attempt = self.attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(E::exhausted(self.attempt, err)),
                },
                Err(err) => return Err(err),
            }
        }
    }
}
