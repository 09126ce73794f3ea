//! Session-authenticated client for the cluster management API
//!
//! Every request carries the `session` and `tenant` cookies. A 401 on the
//! first attempt triggers one single-flight re-login through the shared
//! [`SessionStore`] and one re-issue of the identical request. A second 401
//! surfaces as [`ApiError::UnauthorizedRetryExhausted`]; there is never a
//! third attempt. Transport failures are not retried.

use std::sync::Arc;

use cockroach_mcp_domain::constants::{SESSION_COOKIE, TENANT_COOKIE};
use cockroach_mcp_domain::{ClusterApiConfig, Credential, TimeseriesQueryResult, TimeseriesQuerySpec};
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::auth::{Authenticator, PasswordAuthenticator};
use super::models::TsQueryRequest;
use super::session::{SessionSnapshot, SessionStore};
use crate::decode::{decode, Wire};
use crate::errors::{body_snippet, ApiError};
use crate::http::HttpClient;

/// Management API client with transparent re-authentication
pub struct ClusterApiClient {
    http: HttpClient,
    base_url: Url,
    credential: Credential,
    session: Arc<SessionStore>,
    authenticator: Arc<dyn Authenticator>,
}

impl std::fmt::Debug for ClusterApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl ClusterApiClient {
    /// Create a client that logs in with the configured credential
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the base URL is invalid or the HTTP
    /// client cannot be built
    pub fn new(config: &ClusterApiConfig, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = http_client(config)?;
        let base_url = parse_base_url(&config.base_url)?;
        let authenticator = Arc::new(PasswordAuthenticator::new(http.clone(), &base_url)?);
        Ok(Self::from_parts(http, base_url, config, session, authenticator))
    }

    /// Create a client with a custom authenticator
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the base URL is invalid or the HTTP
    /// client cannot be built
    pub fn with_authenticator(
        config: &ClusterApiConfig,
        session: Arc<SessionStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self, ApiError> {
        let http = http_client(config)?;
        let base_url = parse_base_url(&config.base_url)?;
        Ok(Self::from_parts(http, base_url, config, session, authenticator))
    }

    fn from_parts(
        http: HttpClient,
        base_url: Url,
        config: &ClusterApiConfig,
        session: Arc<SessionStore>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self { http, base_url, credential: config.credential.clone(), session, authenticator }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Log in eagerly and store the session
    ///
    /// # Errors
    ///
    /// Returns the authenticator's error (`Auth`, `MissingToken`,
    /// `Transport`, ...) unchanged
    #[instrument(skip(self, cancel))]
    pub async fn login(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        let observed = self.session.generation().await;
        self.reauthenticate(observed, cancel).await?;
        info!(base_url = %self.base_url, "Logged in to cluster management API");
        Ok(())
    }

    /// Issue an authenticated request and return the 200 response body
    ///
    /// `path` is relative to the base URL. `body`, when present, is sent as
    /// JSON; it is serialized once and reused for the re-issued request.
    ///
    /// # Errors
    ///
    /// - `Transport`/`Timeout`/`Cancelled` from the HTTP layer, never retried
    /// - `UnauthorizedRetryExhausted` when the re-issued request is also 401
    /// - `HttpStatus` for any other non-200 status
    /// - the authenticator's error if re-login fails
    #[instrument(skip_all, fields(method = %method, path = %path, tenant = %tenant))]
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        tenant: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let url = super::join_path(&self.base_url, path)?;
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize body: {e}")))?;

        let snapshot = self.session.snapshot().await;
        let response =
            self.dispatch(&method, &url, payload.as_deref(), tenant, &snapshot, cancel).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return self.finish(response, cancel).await;
        }

        warn!(url = %url, "Unauthorized request, retrying after login");
        let refreshed = self.reauthenticate(snapshot.generation, cancel).await?;

        let response =
            self.dispatch(&method, &url, payload.as_deref(), tenant, &refreshed, cancel).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = self.http.read_text(response, cancel).await.unwrap_or_default();
            warn!(url = %url, "Request still unauthorized after re-authentication");
            return Err(ApiError::UnauthorizedRetryExhausted { body: body_snippet(&body) });
        }

        self.finish(response, cancel).await
    }

    /// GET a JSON document
    ///
    /// # Errors
    ///
    /// Same as [`ClusterApiClient::send`], plus `Decode` if the body is not
    /// valid JSON for `T`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        tenant: &str,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let body = self.send(Method::GET, path, None, tenant, cancel).await?;
        parse_json(&body)
    }

    /// POST a JSON body and parse the JSON response
    ///
    /// # Errors
    ///
    /// Same as [`ClusterApiClient::send`], plus `Decode` if the body is not
    /// valid JSON for `R`
    pub async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        tenant: &str,
        cancel: &CancellationToken,
    ) -> Result<R, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize body: {e}")))?;
        let response = self.send(Method::POST, path, Some(&value), tenant, cancel).await?;
        parse_json(&response)
    }

    /// Query one named metric over `[start_nanos, end_nanos]`
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if `start_nanos >= end_nanos` or the name is empty;
    /// otherwise the errors of [`ClusterApiClient::send`] and `Decode`
    pub async fn query_timeseries(
        &self,
        tenant: &str,
        start_nanos: i64,
        end_nanos: i64,
        query_name: &str,
        cancel: &CancellationToken,
    ) -> Result<TimeseriesQueryResult, ApiError> {
        if start_nanos >= end_nanos {
            return Err(ApiError::InvalidRequest(format!(
                "start ({start_nanos}) must be before end ({end_nanos})"
            )));
        }
        if query_name.trim().is_empty() {
            return Err(ApiError::InvalidRequest("query name must not be empty".to_string()));
        }

        self.post_timeseries(tenant, &TsQueryRequest::named(start_nanos, end_nanos, query_name), cancel)
            .await
    }

    /// Query with a fully specified, validated spec
    ///
    /// # Errors
    ///
    /// The errors of [`ClusterApiClient::send`] and `Decode`
    pub async fn query_timeseries_spec(
        &self,
        tenant: &str,
        spec: &TimeseriesQuerySpec,
        cancel: &CancellationToken,
    ) -> Result<TimeseriesQueryResult, ApiError> {
        self.post_timeseries(tenant, &TsQueryRequest::from(spec), cancel).await
    }

    async fn post_timeseries(
        &self,
        tenant: &str,
        request: &TsQueryRequest,
        cancel: &CancellationToken,
    ) -> Result<TimeseriesQueryResult, ApiError> {
        let payload = serde_json::to_value(request)
            .map_err(|e| ApiError::InvalidRequest(format!("failed to serialize query: {e}")))?;
        debug!(payload = %payload, "Timeseries query");

        let body = self.send(Method::POST, "ts/query", Some(&payload), tenant, cancel).await?;
        let result = decode(body.as_bytes(), Wire::ClusterApi)?;

        debug!(series = result.series.len(), datapoints = result.datapoint_count(), "Timeseries query decoded");
        Ok(result)
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&[u8]>,
        tenant: &str,
        snapshot: &SessionSnapshot,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(COOKIE, cookie_header(snapshot, tenant)?);

        if let Some(payload) = payload {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(payload.to_vec());
        }

        self.http.send(request, cancel).await
    }

    async fn finish(&self, response: Response, cancel: &CancellationToken) -> Result<String, ApiError> {
        let status = response.status();
        let body = self.http.read_text(response, cancel).await?;

        if status == StatusCode::OK {
            Ok(body)
        } else {
            warn!(status = %status, body = %body_snippet(&body), "Received failed response");
            Err(ApiError::http_status(status, &body))
        }
    }

    async fn reauthenticate(
        &self,
        observed_generation: u64,
        cancel: &CancellationToken,
    ) -> Result<SessionSnapshot, ApiError> {
        self.session
            .refresh_with(observed_generation, || self.authenticator.login(&self.credential, cancel))
            .await
    }
}

fn http_client(config: &ClusterApiConfig) -> Result<HttpClient, ApiError> {
    HttpClient::builder()
        .timeout(config.timeout())
        .accept_invalid_certs(config.insecure_tls)
        .build()
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|e| ApiError::Config(format!("invalid cluster API URL '{raw}': {e}")))
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(crate::decode::DecodeError::Syntax(e.to_string())))
}

/// RFC 6265 `cookie-octet`: visible ASCII except `"`, `,`, `;` and `\`
fn is_cookie_octet(byte: u8) -> bool {
    matches!(byte, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
}

/// `session=<token>; tenant=<tenant>`, omitting the session when absent
///
/// The tenant comes from tool arguments, so any byte that could end the
/// cookie value or start another cookie is rejected.
fn cookie_header(snapshot: &SessionSnapshot, tenant: &str) -> Result<HeaderValue, ApiError> {
    if !tenant.bytes().all(is_cookie_octet) {
        return Err(ApiError::InvalidRequest(format!(
            "tenant {tenant:?} contains characters not allowed in a cookie value"
        )));
    }

    let mut cookies = Vec::with_capacity(2);
    if let Some(session) = &snapshot.session {
        cookies.push(format!("{SESSION_COOKIE}={}", session.token()));
    }
    cookies.push(format!("{TENANT_COOKIE}={tenant}"));

    HeaderValue::from_str(&cookies.join("; "))
        .map_err(|_| ApiError::InvalidRequest(format!("tenant '{tenant}' is not a valid cookie value")))
}
