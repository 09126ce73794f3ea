use std::time::Duration;

use cockroach_mcp_domain::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::ApiError;

const USER_AGENT: &str = concat!("cockroach-mcp/", env!("CARGO_PKG_VERSION"));

/// HTTP client with a per-request timeout and cooperative cancellation.
///
/// Every call makes exactly one attempt; retry policy belongs to the caller.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    timeout: Duration,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }

    /// Per-request timeout applied by the underlying client.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder once.
    ///
    /// Connection failures map to [`ApiError::Transport`], an elapsed
    /// timeout to [`ApiError::Timeout`], and a fired token to
    /// [`ApiError::Cancelled`]. Non-2xx responses are returned as-is.
    pub async fn send(
        &self,
        builder: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        let request = builder
            .build()
            .map_err(|err| ApiError::InvalidRequest(format!("failed to build request: {err}")))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(%method, %url, "HTTP request cancelled");
                return Err(ApiError::Cancelled);
            }
            result = self.client.execute(request) => result,
        };

        match result {
            Ok(response) => {
                debug!(%method, %url, status = %response.status(), "received HTTP response");
                Ok(response)
            }
            Err(err) => {
                debug!(%method, %url, error = %err, "HTTP request failed");
                Err(self.map_reqwest_error(&err))
            }
        }
    }

    /// Read a response body as text, honoring cancellation.
    pub async fn read_text(
        &self,
        response: Response,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ApiError::Cancelled),
            body = response.text() => body.map_err(|err| self.map_reqwest_error(&err)),
        }
    }

    fn map_reqwest_error(&self, err: &reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Transport(error_chain(err))
        }
    }
}

/// Render an error with its sources, `outer: inner: root`
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    accept_invalid_certs: bool,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            accept_invalid_certs: false,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Accept self-signed or otherwise invalid TLS certificates.
    pub fn accept_invalid_certs(mut self, enabled: bool) -> Self {
        self.accept_invalid_certs = enabled;
        self
    }

    pub fn build(self) -> Result<HttpClient, ApiError> {
        if self.timeout.is_zero() {
            return Err(ApiError::Config("HTTP timeout must be greater than 0".to_string()));
        }

        let mut builder = ReqwestClient::builder().timeout(self.timeout).user_agent(USER_AGENT);

        if self.accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|err| ApiError::Config(format!("failed to build HTTP client: {err}")))?;

        Ok(HttpClient { client, timeout: self.timeout })
    }
}
