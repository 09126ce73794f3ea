//! Circuit breaker for calls to a failing dependency
//!
//! The breaker admits calls while **Closed**, rejects them without running
//! the operation while **Open**, and lets a bounded number of trial calls
//! through while **HalfOpen**. All counters and the current state live
//! behind a single lock so each call outcome is applied atomically.
//!
//! Every state change starts a new *generation*. Outcomes reported by calls
//! that were admitted in an earlier generation are ignored, so a slow call
//! that started before the breaker opened cannot close it again.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parking_lot::Mutex as StateLock;
use thiserror::Error;
use tracing::{debug, info, warn};

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Source of monotonic time for the breaker
///
/// Production code uses [`SystemClock`]; tests drive [`MockClock`] forward
/// to cross the open-state timeout without sleeping.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed offset, so a test can keep one handle and
/// hand another to the breaker.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced by a breaker-gated call
///
/// Generic over the operation error `E` so the underlying failure is kept
/// intact for the caller.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The breaker rejected the call without running the operation
    #[error("Circuit breaker '{name}' is open, rejecting calls")]
    CircuitOpen { name: String },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },
}

/// Result type for breaker-gated operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// State and Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing limited requests to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Name used in logs and errors
    pub name: String,
    /// The breaker trips once consecutive failures exceed this value
    pub max_consecutive_failures: u64,
    /// Successful trial calls needed to close the circuit from half-open
    pub success_threshold: u64,
    /// Time to wait before transitioning from open to half-open
    pub timeout: Duration,
    /// Maximum number of trial calls admitted while half-open
    pub half_open_max_calls: u64,
    /// Rolling window after which closed-state counts are cleared.
    /// `Duration::ZERO` keeps counts until the next state change.
    pub interval: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_consecutive_failures: 3,
            success_threshold: 1,
            timeout: Duration::from_secs(30),
            half_open_max_calls: 5,
            interval: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.success_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "success_threshold must be greater than 0".to_string(),
            });
        }

        if self.half_open_max_calls == 0 {
            return Err(ConfigError::Invalid {
                message: "half_open_max_calls must be greater than 0".to_string(),
            });
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn max_consecutive_failures(mut self, failures: u64) -> Self {
        self.config.max_consecutive_failures = failures;
        self
    }

    pub fn success_threshold(mut self, threshold: u64) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn half_open_max_calls(mut self, max_calls: u64) -> Self {
        self.config.half_open_max_calls = max_calls;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Request and outcome counts for the current generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub consecutive_successes: u64,
    pub consecutive_failures: u64,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }
}

/// Circuit breaker metrics for monitoring
#[derive(Debug, Clone)]
pub struct CircuitBreakerMetrics {
    pub state: CircuitState,
    pub counts: Counts,
    pub half_open_calls: u64,
    pub generation: u64,
    pub last_failure_time: Option<Instant>,
    pub state_change_time: Instant,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    generation: u64,
    counts: Counts,
    /// Closed: end of the rolling window. Open: end of the open timeout.
    expiry: Option<Instant>,
    half_open_calls: u64,
    last_failure_time: Option<Instant>,
    state_change_time: Instant,
}

/// Admission ticket for a single call
#[derive(Debug, Clone, Copy)]
struct Admission {
    generation: u64,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

/// Generic circuit breaker implementation
///
/// Cheap to clone; clones share state.
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<StateLock<BreakerInner>>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.config.name)
            .field("state", &inner.state)
            .field("counts", &inner.counts)
            .finish()
    }
}

impl<C: Clock> Clone for CircuitBreaker<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            inner: Arc::clone(&self.inner),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        config.validate()?;

        let now = clock.now();
        let expiry = (!config.interval.is_zero()).then(|| now + config.interval);

        Ok(Self {
            config: Arc::new(config),
            inner: Arc::new(StateLock::new(BreakerInner {
                state: CircuitState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
                half_open_calls: 0,
                last_failure_time: None,
                state_change_time: now,
            })),
            clock: Arc::new(clock),
        })
    }

    /// Breaker name from the configuration
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Execute an operation with circuit breaker protection
    ///
    /// Every `Err` returned by the operation counts as a failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute_classified(operation, |_| true).await
    }

    /// Execute an operation, letting `counts_as_failure` decide whether an
    /// error should move the breaker
    ///
    /// Errors for which the classifier returns `false` (a caller-initiated
    /// cancellation, for instance) release the admission without recording
    /// an outcome.
    pub async fn execute_classified<F, Fut, T, E, P>(
        &self,
        operation: F,
        counts_as_failure: P,
    ) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
        P: FnOnce(&E) -> bool,
    {
        let admission = self.before_call().ok_or_else(|| {
            debug!(breaker = %self.config.name, "Circuit breaker rejecting call");
            ResilienceError::CircuitOpen { name: self.config.name.clone() }
        })?;

        match operation().await {
            Ok(result) => {
                self.after_call(admission, Some(true));
                Ok(result)
            }
            Err(error) => {
                if counts_as_failure(&error) {
                    warn!(breaker = %self.config.name, error = %error, "Circuit breaker: operation failed");
                    self.after_call(admission, Some(false));
                } else {
                    debug!(breaker = %self.config.name, error = %error, "Circuit breaker: outcome not recorded");
                    self.after_call(admission, None);
                }
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Get the current state, applying any time-based transition first
    pub fn state(&self) -> CircuitState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);
        inner.state
    }

    /// Get circuit breaker metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);
        CircuitBreakerMetrics {
            state: inner.state,
            counts: inner.counts,
            half_open_calls: inner.half_open_calls,
            generation: inner.generation,
            last_failure_time: inner.last_failure_time,
            state_change_time: inner.state_change_time,
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.last_failure_time = None;
        self.transition(&mut inner, CircuitState::Closed, now);
        info!(breaker = %self.config.name, "Circuit breaker manually reset to closed state");
    }

    fn before_call(&self) -> Option<Admission> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);

        match inner.state {
            CircuitState::Open => return None,
            CircuitState::HalfOpen => {
                if inner.half_open_calls >= self.config.half_open_max_calls {
                    return None;
                }
                inner.half_open_calls += 1;
            }
            CircuitState::Closed => {}
        }

        inner.counts.on_request();
        Some(Admission { generation: inner.generation })
    }

    /// `Some(true)` success, `Some(false)` failure, `None` abandoned
    fn after_call(&self, admission: Admission, outcome: Option<bool>) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, now);

        if inner.generation != admission.generation {
            debug!(breaker = %self.config.name, "Ignoring outcome from a previous generation");
            return;
        }

        match outcome {
            Some(true) => self.on_success(&mut inner, now),
            Some(false) => self.on_failure(&mut inner, now),
            None => {
                if inner.state == CircuitState::HalfOpen {
                    inner.half_open_calls = inner.half_open_calls.saturating_sub(1);
                }
            }
        }
    }

    fn on_success(&self, inner: &mut BreakerInner, now: Instant) {
        inner.counts.on_success();
        if inner.state == CircuitState::HalfOpen
            && inner.counts.consecutive_successes >= self.config.success_threshold
        {
            info!(
                breaker = %self.config.name,
                successes = inner.counts.consecutive_successes,
                "Circuit breaker closed after successful trial calls"
            );
            self.transition(inner, CircuitState::Closed, now);
        }
    }

    fn on_failure(&self, inner: &mut BreakerInner, now: Instant) {
        inner.counts.on_failure();
        inner.last_failure_time = Some(now);

        match inner.state {
            CircuitState::Closed => {
                if inner.counts.consecutive_failures > self.config.max_consecutive_failures {
                    warn!(
                        breaker = %self.config.name,
                        failures = inner.counts.consecutive_failures,
                        "Circuit breaker opened after consecutive failures"
                    );
                    self.transition(inner, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(breaker = %self.config.name, "Circuit breaker reopened by a failed trial call");
                self.transition(inner, CircuitState::Open, now);
            }
            CircuitState::Open => {}
        }
    }

    /// Apply time-driven transitions: window roll-over while closed and
    /// open-timeout expiry.
    fn refresh(&self, inner: &mut BreakerInner, now: Instant) {
        match inner.state {
            CircuitState::Closed => {
                if let Some(expiry) = inner.expiry {
                    if expiry <= now {
                        self.new_generation(inner, now);
                    }
                }
            }
            CircuitState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    info!(breaker = %self.config.name, "Circuit breaker half-open, probing");
                    self.transition(inner, CircuitState::HalfOpen, now);
                }
            }
            CircuitState::HalfOpen => {}
        }
    }

    fn transition(&self, inner: &mut BreakerInner, state: CircuitState, now: Instant) {
        debug!(breaker = %self.config.name, from = %inner.state, to = %state, "Circuit state change");
        inner.state = state;
        inner.state_change_time = now;
        self.new_generation(inner, now);
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation = inner.generation.wrapping_add(1);
        inner.counts = Counts::default();
        inner.half_open_calls = 0;
        inner.expiry = match inner.state {
            CircuitState::Closed => {
                (!self.config.interval.is_zero()).then(|| now + self.config.interval)
            }
            CircuitState::Open => Some(now + self.config.timeout),
            CircuitState::HalfOpen => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;

    fn breaker_with_clock(clock: &MockClock) -> CircuitBreaker<MockClock> {
        CircuitBreaker::with_clock(CircuitBreakerConfig::default(), clock.clone())
            .expect("default config is valid")
    }

    async fn fail(cb: &CircuitBreaker<MockClock>) {
        let _ = cb.execute(|| async { Err::<(), _>(Boom) }).await;
    }

    async fn succeed(cb: &CircuitBreaker<MockClock>) -> ResilienceResult<(), Boom> {
        cb.execute(|| async { Ok::<(), Boom>(()) }).await
    }

    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));

        assert_eq!(clock.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::Closed.to_string(), "CLOSED");
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }

    #[test]
    fn test_config_defaults_match_tsdb_settings() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.half_open_max_calls, 5);
        assert_eq!(config.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_builder_validation() {
        assert!(CircuitBreakerConfig::builder().half_open_max_calls(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().success_threshold(0).build().is_err());
        assert!(CircuitBreakerConfig::builder().timeout(Duration::ZERO).build().is_err());

        let config = CircuitBreakerConfig::builder()
            .name("tsdb")
            .max_consecutive_failures(1)
            .build()
            .expect("valid config");
        assert_eq!(config.name, "tsdb");
        assert_eq!(config.max_consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_trips_only_after_threshold_is_exceeded() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);

        for _ in 0..3 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().counts.consecutive_failures, 3);

        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_rejects_without_running_operation() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);
        for _ in 0..4 {
            fail(&cb).await;
        }

        let runs = AtomicU32::new(0);
        let result = cb
            .execute(|| async {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<(), Boom>(())
            })
            .await;

        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_success_resets_consecutive_failures() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);

        fail(&cb).await;
        fail(&cb).await;
        fail(&cb).await;
        succeed(&cb).await.expect("closed breaker admits call");
        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().counts.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_half_open_after_timeout_then_closes_on_success() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);
        for _ in 0..4 {
            fail(&cb).await;
        }

        clock.advance(Duration::from_secs(29));
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(1));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        succeed(&cb).await.expect("trial call admitted");
        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.counts.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_and_restarts_timer() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);
        for _ in 0..4 {
            fail(&cb).await;
        }

        clock.advance(Duration::from_secs(30));
        fail(&cb).await;
        assert_eq!(cb.state(), CircuitState::Open);

        clock.advance(Duration::from_secs(29));
        assert_eq!(cb.state(), CircuitState::Open);
        clock.advance(Duration::from_secs(1));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_half_open_caps_trial_calls() {
        let clock = MockClock::new();
        let config = CircuitBreakerConfig::builder()
            .max_consecutive_failures(0)
            .half_open_max_calls(2)
            .success_threshold(5)
            .build()
            .expect("valid config");
        let cb = CircuitBreaker::with_clock(config, clock.clone()).expect("breaker");

        fail(&cb).await;
        clock.advance(Duration::from_secs(30));

        succeed(&cb).await.expect("first trial admitted");
        succeed(&cb).await.expect("second trial admitted");
        let third = succeed(&cb).await;
        assert!(matches!(third, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_rolling_window_clears_closed_counts() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);

        for _ in 0..3 {
            fail(&cb).await;
        }
        clock.advance(Duration::from_secs(60));
        fail(&cb).await;

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().counts.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_unclassified_error_leaves_counts_untouched() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);

        for _ in 0..5 {
            let _ = cb.execute_classified(|| async { Err::<(), _>(Boom) }, |_| false).await;
        }

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Closed);
        assert_eq!(metrics.counts.total_failures, 0);
        assert_eq!(metrics.counts.requests, 5);
    }

    #[tokio::test]
    async fn test_stale_generation_outcome_is_ignored() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);

        let stale = cb.before_call().expect("closed breaker admits");
        for _ in 0..4 {
            fail(&cb).await;
        }
        assert_eq!(cb.state(), CircuitState::Open);

        cb.after_call(stale, Some(true));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_reset_closes_circuit() {
        let clock = MockClock::new();
        let cb = breaker_with_clock(&clock);
        for _ in 0..4 {
            fail(&cb).await;
        }

        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.metrics().counts, Counts::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_open_exactly_once() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default()).expect("breaker");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move {
                let _ = cb.execute(|| async { Err::<(), _>(Boom) }).await;
            }));
        }
        for handle in handles {
            handle.await.expect("task completes");
        }

        let metrics = cb.metrics();
        assert_eq!(metrics.state, CircuitState::Open);
        assert_eq!(metrics.generation, 1);
    }
}
