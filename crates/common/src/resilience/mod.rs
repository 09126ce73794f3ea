//! Resilience patterns for fault tolerance
//!
//! This module provides **generic, reusable** resilience patterns:
//! - **Circuit Breaker**: stops calling a dependency after repeated failures
//!   and probes it again once a cool-down has elapsed
//! - **Retry Logic**: bounded attempts with exponential backoff, per-attempt
//!   timeouts and cooperative cancellation
//!
//! Both are generic over the operation's error type and free of any network
//! code, so they can be tested with [`MockClock`] and paused tokio time.
//!
//! ## Composition
//!
//! Callers that need both wrap the retry executor inside the breaker:
//!
//! ```text
//! breaker.execute(|| retry.execute(&cancel, || send_request()))
//! ```
//!
//! Only the final outcome of the retried operation reaches the breaker, so a
//! call that recovers on its second attempt counts as one success.

pub mod circuit_breaker;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitState, Clock, ConfigError, ConfigResult, Counts, MockClock, ResilienceError,
    ResilienceResult, SystemClock,
};
// Re-export retry types
pub use retry::{
    policies, AttemptTimeout, BackoffStrategy, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
