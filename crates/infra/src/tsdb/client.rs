//! Breaker-gated client for the timeseries query endpoint
//!
//! Each query runs through the circuit breaker, which wraps the retry
//! executor, which wraps a single HTTP attempt. Only the HTTP outcome is
//! gated: a 2xx body that fails to decode is returned as `Decode` without
//! counting against the breaker, since retrying the same payload cannot
//! change the endpoint's response shape. Cancellation is not counted either.

use std::sync::Arc;
use std::time::Duration;

use cockroach_mcp_common::resilience::{
    BackoffStrategy, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState,
    Clock, RetryConfig, RetryDecision, RetryExecutor, RetryPolicy, SystemClock,
};
use cockroach_mcp_domain::constants::{
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TSDB_URL, TSDB_BREAKER_INTERVAL_SECS,
    TSDB_BREAKER_NAME, TSDB_BREAKER_TIMEOUT_SECS, TSDB_HALF_OPEN_MAX_CALLS,
    TSDB_MAX_CONSECUTIVE_FAILURES, TSDB_RETRY_ATTEMPTS, TSDB_RETRY_MAX_WAIT_SECS,
    TSDB_RETRY_WAIT_SECS,
};
use cockroach_mcp_domain::{
    Credential, TimeseriesQueryResult, TimeseriesQuerySpec, TsdbAuth, TsdbConfig,
};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::models::TsdbQueryRequest;
use crate::decode::{decode, Wire};
use crate::errors::ApiError;
use crate::http::HttpClient;

/// Configuration for the timeseries client
#[derive(Debug, Clone)]
pub struct TsdbClientConfig {
    /// Full URL of the query endpoint
    pub url: String,
    /// Authentication applied to each request
    pub auth: TsdbAuth,
    /// Credential used when `auth` is [`TsdbAuth::Basic`]
    pub credential: Option<Credential>,
    /// Timeout for a single HTTP request
    pub timeout: Duration,
    /// Retry schedule for one query
    pub retry: RetryConfig,
    /// Circuit breaker configuration
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for TsdbClientConfig {
    fn default() -> Self {
        let timeout = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS);
        Self {
            url: DEFAULT_TSDB_URL.to_string(),
            auth: TsdbAuth::None,
            credential: None,
            timeout,
            retry: RetryConfig {
                max_attempts: TSDB_RETRY_ATTEMPTS,
                backoff: BackoffStrategy::Exponential {
                    initial_delay: Duration::from_secs(TSDB_RETRY_WAIT_SECS),
                    base: 2.0,
                    max_delay: Duration::from_secs(TSDB_RETRY_MAX_WAIT_SECS),
                },
                attempt_timeout: Some(timeout),
                max_total_time: None,
            },
            circuit_breaker: CircuitBreakerConfig {
                name: TSDB_BREAKER_NAME.to_string(),
                max_consecutive_failures: TSDB_MAX_CONSECUTIVE_FAILURES,
                success_threshold: 1,
                timeout: Duration::from_secs(TSDB_BREAKER_TIMEOUT_SECS),
                half_open_max_calls: TSDB_HALF_OPEN_MAX_CALLS,
                interval: Duration::from_secs(TSDB_BREAKER_INTERVAL_SECS),
            },
        }
    }
}

impl TsdbClientConfig {
    /// Build from loaded settings; `credential` is used only for basic auth
    pub fn from_settings(settings: &TsdbConfig, credential: &Credential) -> Self {
        Self {
            url: settings.url.clone(),
            auth: settings.auth,
            credential: (settings.auth == TsdbAuth::Basic).then(|| credential.clone()),
            ..Self::default()
        }
    }
}

/// Retry transport failures, timeouts, 5xx and 429; stop on everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct TransientErrors;

impl RetryPolicy<ApiError> for TransientErrors {
    fn should_retry(&self, error: &ApiError, _attempt: u32) -> RetryDecision {
        if error.should_retry() {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Timeseries client with retry and circuit breaking
pub struct TsdbClient<C: Clock = SystemClock> {
    http: HttpClient,
    url: Url,
    auth: TsdbAuth,
    credential: Option<Credential>,
    retry: RetryExecutor<TransientErrors>,
    circuit_breaker: Arc<CircuitBreaker<C>>,
}

impl<C: Clock> std::fmt::Debug for TsdbClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsdbClient")
            .field("url", &self.url.as_str())
            .field("auth", &self.auth)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish_non_exhaustive()
    }
}

impl TsdbClient<SystemClock> {
    /// Create a new timeseries client
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the URL, retry or breaker settings are
    /// invalid, or basic auth is requested without a credential
    pub fn new(config: TsdbClientConfig) -> Result<Self, ApiError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> TsdbClient<C> {
    /// Create a client whose breaker reads time from `clock`
    ///
    /// # Errors
    ///
    /// Same as [`TsdbClient::new`]
    pub fn with_clock(config: TsdbClientConfig, clock: C) -> Result<Self, ApiError> {
        let url = Url::parse(&config.url)
            .map_err(|e| ApiError::Config(format!("invalid timeseries URL '{}': {e}", config.url)))?;

        if config.auth == TsdbAuth::Basic && config.credential.is_none() {
            return Err(ApiError::Config("basic auth requires a credential".to_string()));
        }

        config.retry.validate().map_err(ApiError::Config)?;

        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()?;

        let circuit_breaker = CircuitBreaker::with_clock(config.circuit_breaker, clock)
            .map_err(|e| ApiError::Config(format!("Failed to create circuit breaker: {e}")))?;

        Ok(Self {
            http,
            url,
            auth: config.auth,
            credential: config.credential,
            retry: RetryExecutor::new(config.retry, TransientErrors),
            circuit_breaker: Arc::new(circuit_breaker),
        })
    }

    /// Current breaker state
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Breaker counters, for diagnostics
    pub fn circuit_metrics(&self) -> CircuitBreakerMetrics {
        self.circuit_breaker.metrics()
    }

    /// Run a timeseries query
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if a query names no sources, before any network call
    /// - `CircuitOpen` without any network call while the breaker is open
    /// - the last attempt's error (`Transport`, `Timeout`, `HttpStatus`)
    ///   once retries are exhausted or a non-retryable status is returned
    /// - `Cancelled` if `cancel` fires; this does not count against the breaker
    /// - `Decode` if a 2xx body is malformed
    #[instrument(skip_all, fields(url = %self.url, queries = spec.queries().len()))]
    pub async fn query(
        &self,
        spec: &TimeseriesQuerySpec,
        cancel: &CancellationToken,
    ) -> Result<TimeseriesQueryResult, ApiError> {
        spec.check_sources()?;
        let payload = serde_json::to_vec(&TsdbQueryRequest::from(spec))
            .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize query: {e}")))?;

        let body = self
            .circuit_breaker
            .execute_classified(
                || async {
                    self.retry
                        .execute(cancel, || self.attempt(&payload, cancel))
                        .await
                        .map_err(ApiError::from)
                },
                |error: &ApiError| !matches!(error, ApiError::Cancelled),
            )
            .await
            .map_err(ApiError::from)?;

        let result = decode(body.as_bytes(), Wire::Tsdb)?;
        info!(
            series = result.series.len(),
            datapoints = result.datapoint_count(),
            "Timeseries query complete"
        );
        Ok(result)
    }

    async fn attempt(&self, payload: &[u8], cancel: &CancellationToken) -> Result<String, ApiError> {
        let mut request = self
            .http
            .request(Method::POST, self.url.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload.to_vec());

        if let (TsdbAuth::Basic, Some(credential)) = (self.auth, &self.credential) {
            request = request.basic_auth(&credential.username, Some(&credential.password));
        }

        let response = self.http.send(request, cancel).await?;
        let status = response.status();
        let body = self.http.read_text(response, cancel).await?;

        if status.is_success() {
            debug!(status = %status, bytes = body.len(), "Timeseries endpoint responded");
            Ok(body)
        } else {
            warn!(status = %status, "Timeseries endpoint returned an error status");
            Err(ApiError::http_status(status, &body))
        }
    }
}
