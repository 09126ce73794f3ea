//! Bounded retry with exponential backoff
//!
//! A [`RetryExecutor`] runs an async operation up to `max_attempts` times.
//! Each attempt may be bounded by `attempt_timeout`, the delay between
//! attempts comes from a [`BackoffStrategy`], and a [`RetryPolicy`] decides
//! which errors are worth another attempt. Every sleep and every attempt
//! races the caller's [`CancellationToken`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Marker error produced when a single attempt exceeds `attempt_timeout`
///
/// Operation error types opt into per-attempt timeouts by implementing
/// `From<AttemptTimeout>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempt timed out after {0:?}")]
pub struct AttemptTimeout(pub Duration);

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// All retry attempts have been exhausted
    #[error("all {attempts} attempts failed, last error: {source}")]
    AttemptsExhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The operation failed with an error the policy does not retry
    #[error("non-retryable error after {attempts} attempts: {source}")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The caller cancelled while an attempt or a backoff sleep was pending
    #[error("retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// The overall time budget ran out before another attempt could start
    #[error("retry budget of {budget:?} exceeded after {attempts} attempts")]
    TimeoutExceeded { attempts: u32, budget: Duration },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// The last operation error, if the executor stopped because of one
    pub fn into_source(self) -> Option<E> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source, .. } => {
                Some(source)
            }
            Self::Cancelled { .. } | Self::TimeoutExceeded { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E>
where
    E: std::error::Error + 'static,
{
    pub result: RetryResult<T, E>,
    pub attempts: u32,
    /// Delay slept before each retry, in order
    pub delays: Vec<Duration>,
}

impl<T, E> RetryOutcome<T, E>
where
    E: std::error::Error + 'static,
{
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }

    /// Total time spent sleeping between attempts
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

/// Trait for determining whether an error should be retried
pub trait RetryPolicy<E> {
    /// `attempt` is the 1-based number of the attempt that just failed
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation after the backoff delay
    Retry,
    /// Don't retry the operation
    Stop,
}

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: initial_delay * base^retry, capped at max_delay
    Exponential { initial_delay: Duration, base: f64, max_delay: Duration },
}

impl BackoffStrategy {
    /// Delay before retry number `retry` (0 for the first retry)
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed(delay) => *delay,
            BackoffStrategy::Exponential { initial_delay, base, max_delay } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let delay = initial_delay.as_secs_f64() * base.powi(exponent);
                if !delay.is_finite() || delay >= max_delay.as_secs_f64() {
                    *max_delay
                } else {
                    Duration::from_secs_f64(delay)
                }
            }
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (initial try + retries)
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Upper bound on a single attempt
    pub attempt_timeout: Option<Duration>,
    /// Maximum total time to spend retrying
    pub max_total_time: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial_delay: Duration::from_secs(2),
                base: 2.0,
                max_delay: Duration::from_secs(10),
            },
            attempt_timeout: Some(Duration::from_secs(10)),
            max_total_time: None,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        if let BackoffStrategy::Exponential { base, .. } = &self.backoff {
            if *base < 1.0 {
                return Err("exponential base must be at least 1.0".to_string());
            }
        }

        if self.attempt_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err("attempt_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed(delay);
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, base, max_delay };
        self
    }

    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout = Some(timeout);
        self
    }

    pub fn no_attempt_timeout(mut self) -> Self {
        self.config.attempt_timeout = None;
        self
    }

    pub fn max_total_time(mut self, duration: Duration) -> Self {
        self.config.max_total_time = Some(duration);
        self
    }

    pub fn build(self) -> Result<RetryConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: std::error::Error + From<AttemptTimeout> + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(cancel, operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    pub async fn execute_with_outcome<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: std::error::Error + From<AttemptTimeout> + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let mut delays = Vec::new();
        let mut attempt: u32 = 0;

        let result = loop {
            if let Some(budget) = self.config.max_total_time {
                if attempt > 0 && started.elapsed() >= budget {
                    warn!(attempts = attempt, ?budget, "Retry budget exceeded");
                    break Err(RetryError::TimeoutExceeded { attempts: attempt, budget });
                }
            }

            attempt += 1;
            debug!(attempt, max_attempts = self.config.max_attempts, "Executing operation");

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                outcome = self.run_attempt(&mut operation) => Some(outcome),
            };

            let error = match outcome {
                None => break Err(RetryError::Cancelled { attempts: attempt }),
                Some(Ok(value)) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retries");
                    }
                    break Ok(value);
                }
                Some(Err(error)) => error,
            };

            if attempt >= self.config.max_attempts {
                warn!(attempts = attempt, error = %error, "All retry attempts exhausted");
                break Err(RetryError::AttemptsExhausted { attempts: attempt, source: error });
            }

            if self.policy.should_retry(&error, attempt) == RetryDecision::Stop {
                debug!(attempt, error = %error, "Retry policy declined to retry");
                break Err(RetryError::NonRetryable { attempts: attempt, source: error });
            }

            let delay = self.config.backoff.calculate_delay(attempt - 1);
            warn!(attempt, ?delay, error = %error, "Operation failed, retrying");

            tokio::select! {
                biased;
                () = cancel.cancelled() => break Err(RetryError::Cancelled { attempts: attempt }),
                () = tokio::time::sleep(delay) => delays.push(delay),
            }
        };

        RetryOutcome { result, attempts: attempt, delays }
    }

    async fn run_attempt<F, Fut, T, E>(&self, operation: &mut F) -> Result<T, E>
    where
        E: From<AttemptTimeout>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, operation())
                .await
                .unwrap_or_else(|_| Err(E::from(AttemptTimeout(limit)))),
            None => operation().await,
        }
    }
}

impl<P: fmt::Debug> fmt::Display for RetryExecutor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RetryExecutor(max_attempts={}, policy={:?})", self.config.max_attempts, self.policy)
    }
}

/// Pre-defined retry policies for common scenarios
pub mod policies {
    use super::{RetryDecision, RetryPolicy};

    /// Always retry policy - retries on any error
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AlwaysRetry;

    impl<E> RetryPolicy<E> for AlwaysRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Retry
        }
    }

    /// Never retry policy - never retries
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NeverRetry;

    impl<E> RetryPolicy<E> for NeverRetry {
        fn should_retry(&self, _error: &E, _attempt: u32) -> RetryDecision {
            RetryDecision::Stop
        }
    }
}
