//! Integration tests for the cluster management API client
//!
//! **Coverage:**
//! - Session and tenant cookies on every request
//! - A single 401 triggers exactly one login and one re-issue
//! - A second 401 surfaces as `UnauthorizedRetryExhausted`
//! - Transport failures are not retried
//! - Concurrent 401s collapse to one login
//!
//! **Infrastructure:**
//! - WireMock HTTP server (simulates the cluster's HTTP endpoint)

use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cockroach_mcp_domain::{ClusterApiConfig, Credential, Datapoint};
use cockroach_mcp_infra::{ApiError, Authenticator, ClusterApiClient, Session, SessionStore};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn config_for(uri: &str) -> ClusterApiConfig {
    ClusterApiConfig::new(uri, Credential::new("root", "secret"))
}

fn demo_body() -> serde_json::Value {
    json!({
        "results": [{
            "query": {"name": "cpu", "sources": []},
            "datapoints": [{"timestampNanos": "1500", "value": 42.0}]
        }]
    })
}

async fn mount_login(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": "root", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Set-Cookie", format!("session={token}; Path=/; HttpOnly").as_str()),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Authenticator that counts calls and hands out numbered sessions
struct CountingAuthenticator {
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl Authenticator for CountingAuthenticator {
    async fn login(
        &self,
        _credential: &Credential,
        _cancel: &CancellationToken,
    ) -> Result<Session, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        Ok(Session::new(format!("fresh-{call}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_demoapp_query_sends_cookies_and_decodes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .and(header("cookie", "session=tok; tenant=demoapp"))
        .and(body_json(json!({
            "start_nanos": 1000,
            "end_nanos": 2000,
            "queries": [{"name": "cpu", "sources": []}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(demo_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SessionStore::with_session(Session::new("tok")));
    let client = ClusterApiClient::new(&config_for(&server.uri()), store).expect("client");

    let result = client
        .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
        .await
        .expect("query succeeds");

    assert_eq!(result.series.len(), 1);
    assert_eq!(result.series[0].query_name, "cpu");
    assert_eq!(result.series[0].datapoints, vec![Datapoint::new(1500, 42.0)]);
}

#[tokio::test]
async fn test_single_unauthorized_triggers_one_login_and_one_reissue() {
    let server = MockServer::start().await;
    mount_login(&server, "fresh", 1).await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .and(header("cookie", "session=stale; tenant=demoapp"))
        .respond_with(ResponseTemplate::new(401).set_body_string("session expired"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .and(header("cookie", "session=fresh; tenant=demoapp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(demo_body()))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SessionStore::with_session(Session::new("stale")));
    let client =
        ClusterApiClient::new(&config_for(&server.uri()), Arc::clone(&store)).expect("client");

    let result = client
        .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
        .await
        .expect("query succeeds after re-login");

    assert_eq!(result.datapoint_count(), 1);

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.session.as_ref().map(Session::token), Some("fresh"));
    assert_eq!(snapshot.generation, 2);
}

#[tokio::test]
async fn test_empty_store_logs_in_on_first_unauthorized() {
    let server = MockServer::start().await;
    mount_login(&server, "first", 1).await;

    Mock::given(method("GET"))
        .and(path("/_status/nodes"))
        .and(header("cookie", "tenant=system"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/_status/nodes"))
        .and(header("cookie", "session=first; tenant=system"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nodes": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = ClusterApiClient::new(&config_for(&server.uri()), Arc::new(SessionStore::new()))
        .expect("client");

    let body: serde_json::Value = client
        .get_json("_status/nodes", "system", &CancellationToken::new())
        .await
        .expect("request succeeds");

    assert_eq!(body, json!({"nodes": []}));
}

#[tokio::test]
async fn test_second_unauthorized_is_retry_exhausted() {
    let server = MockServer::start().await;
    mount_login(&server, "fresh", 1).await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .respond_with(ResponseTemplate::new(401).set_body_string("no access to tenant"))
        .expect(2)
        .mount(&server)
        .await;

    let store = Arc::new(SessionStore::with_session(Session::new("stale")));
    let client = ClusterApiClient::new(&config_for(&server.uri()), store).expect("client");

    let result = client
        .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
        .await;

    match result {
        Err(ApiError::UnauthorizedRetryExhausted { body }) => {
            assert_eq!(body, "no access to tenant");
        }
        other => panic!("expected UnauthorizedRetryExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_relogin_surfaces_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(403).set_body_string("password expired"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SessionStore::with_session(Session::new("stale")));
    let client =
        ClusterApiClient::new(&config_for(&server.uri()), Arc::clone(&store)).expect("client");

    let result = client
        .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ApiError::Auth { status: 403, .. })), "got {result:?}");
    assert_eq!(store.generation().await, 1);
}

#[tokio::test]
async fn test_server_error_is_returned_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .respond_with(ResponseTemplate::new(503).set_body_string("node draining"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(SessionStore::with_session(Session::new("tok")));
    let client = ClusterApiClient::new(&config_for(&server.uri()), store).expect("client");

    let result = client
        .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
        .await;

    assert!(
        matches!(result, Err(ApiError::HttpStatus { status: 503, ref body }) if body == "node draining"),
        "got {result:?}"
    );
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let authenticator =
        Arc::new(CountingAuthenticator { calls: AtomicUsize::new(0), delay: Duration::ZERO });
    let client = ClusterApiClient::with_authenticator(
        &config_for(&format!("http://{addr}")),
        Arc::new(SessionStore::with_session(Session::new("tok"))),
        Arc::clone(&authenticator) as Arc<dyn Authenticator>,
    )
    .expect("client");

    let result = client
        .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ApiError::Transport(_))), "got {result:?}");
    assert_eq!(authenticator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_range_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = ClusterApiClient::new(&config_for(&server.uri()), Arc::new(SessionStore::new()))
        .expect("client");

    let result = client
        .query_timeseries("demoapp", 2000, 2000, "cpu", &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(ApiError::InvalidRequest(_))));

    let result =
        client.query_timeseries("demoapp", 1000, 2000, "  ", &CancellationToken::new()).await;
    assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_unauthorized_requests_share_one_login() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .and(header("cookie", "session=stale; tenant=demoapp"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/ts/query"))
        .and(header("cookie", "session=fresh-1; tenant=demoapp"))
        .respond_with(ResponseTemplate::new(200).set_body_json(demo_body()))
        .mount(&server)
        .await;

    let authenticator = Arc::new(CountingAuthenticator {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(50),
    });
    let store = Arc::new(SessionStore::with_session(Session::new("stale")));
    let client = Arc::new(
        ClusterApiClient::with_authenticator(
            &config_for(&server.uri()),
            Arc::clone(&store),
            Arc::clone(&authenticator) as Arc<dyn Authenticator>,
        )
        .expect("client"),
    );

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .query_timeseries("demoapp", 1000, 2000, "cpu", &CancellationToken::new())
                    .await
            })
        })
        .collect();

    for task in tasks {
        let result = task.await.expect("task joined").expect("query succeeds");
        assert_eq!(result.datapoint_count(), 1);
    }

    assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.generation().await, 2);
}
