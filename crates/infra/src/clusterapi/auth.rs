//! Password login against the cluster management API
//!
//! `POST {base}/login` with `{username, password}`. A login succeeds only
//! when the server answers 200 **and** sets a `session` cookie.

use async_trait::async_trait;
use cockroach_mcp_domain::constants::SESSION_COOKIE;
use cockroach_mcp_domain::Credential;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::session::Session;
use crate::errors::{body_snippet, ApiError};
use crate::http::HttpClient;

/// Trait for obtaining a session from a credential
///
/// This trait allows dependency injection and testing with counting fakes.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Log in and return a fresh session
    async fn login(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<Session, ApiError>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Username/password login over HTTP
#[derive(Debug, Clone)]
pub struct PasswordAuthenticator {
    http: HttpClient,
    login_url: Url,
}

impl PasswordAuthenticator {
    /// Create an authenticator for the API rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Config` if the login URL cannot be derived
    pub fn new(http: HttpClient, base_url: &Url) -> Result<Self, ApiError> {
        let login_url = super::join_path(base_url, "login")?;
        Ok(Self { http, login_url })
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }
}

#[async_trait]
impl Authenticator for PasswordAuthenticator {
    #[instrument(skip(self, credential, cancel), fields(url = %self.login_url, username = %credential.username))]
    async fn login(
        &self,
        credential: &Credential,
        cancel: &CancellationToken,
    ) -> Result<Session, ApiError> {
        let request = self
            .http
            .request(Method::POST, self.login_url.clone())
            .json(&LoginRequest { username: &credential.username, password: &credential.password });

        let response = self.http.send(request, cancel).await?;
        let status = response.status();

        if status != StatusCode::OK {
            let body = self.http.read_text(response, cancel).await.unwrap_or_default();
            warn!(status = %status, "Login rejected");
            return Err(ApiError::Auth { status: status.as_u16(), body: body_snippet(&body) });
        }

        let token = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());

        match token {
            Some(token) if !token.is_empty() => {
                info!("Login to cluster management API successful");
                Ok(Session::new(token))
            }
            _ => {
                debug!("Login response carried no session cookie");
                Err(ApiError::MissingToken)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn authenticator(server: &MockServer) -> PasswordAuthenticator {
        let base = Url::parse(&server.uri()).expect("mock server URL");
        PasswordAuthenticator::new(HttpClient::new().expect("http client"), &base)
            .expect("authenticator")
    }

    #[tokio::test]
    async fn test_login_extracts_session_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(serde_json::json!({"username": "root", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Set-Cookie", "session=abc123; Path=/; HttpOnly"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let session = authenticator(&server)
            .login(&Credential::new("root", "pw"), &CancellationToken::new())
            .await
            .expect("login succeeds");

        assert_eq!(session.token(), "abc123");
    }

    #[tokio::test]
    async fn test_login_without_cookie_is_missing_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "other=1"))
            .mount(&server)
            .await;

        let result = authenticator(&server)
            .login(&Credential::new("root", "pw"), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ApiError::MissingToken)));
    }

    #[tokio::test]
    async fn test_login_rejection_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad password"))
            .mount(&server)
            .await;

        let result = authenticator(&server)
            .login(&Credential::new("root", "wrong"), &CancellationToken::new())
            .await;

        match result {
            Err(ApiError::Auth { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad password");
            }
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_login_url_respects_base_path() {
        let base = Url::parse("https://crdb.example:8080/api").expect("url");
        let auth = PasswordAuthenticator::new(HttpClient::new().expect("http client"), &base)
            .expect("authenticator");
        assert_eq!(auth.login_url().as_str(), "https://crdb.example:8080/api/login");
    }
}
