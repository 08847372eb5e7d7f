//! Integration tests for the request gateway.
//!
//! The first group drives the gateway with a scripted executor and a paused
//! clock; the second runs it end to end against a wiremock server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use meteo_client::clients::{
    ClassifiedError, DeduplicationRegistry, ErrorKind, Executor, HttpMethod, RequestDescriptor,
    RequestGateway, RequestOptions, ResponseBody,
};
use meteo_client::{AccessToken, BackoffPolicy, BaseUrl, ClientConfig, Session, SessionStore};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers every exchange with the same outcome after a fixed delay.
#[derive(Debug)]
struct MockExecutor {
    delay: Duration,
    outcome: Result<ResponseBody, ClassifiedError>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockExecutor {
    fn new(delay: Duration, outcome: Result<ResponseBody, ClassifiedError>) -> Arc<Self> {
        Arc::new(Self {
            delay,
            outcome,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResponseBody, ClassifiedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(descriptor.url().to_string());
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig::builder()
        .base_url(BaseUrl::new(base_url).unwrap())
        .build()
        .unwrap()
}

fn mock_gateway(executor: &Arc<MockExecutor>) -> RequestGateway {
    RequestGateway::with_executor(
        config("https://api.example.com/api"),
        SessionStore::new(),
        executor.clone(),
        DeduplicationRegistry::new(),
    )
}

fn signed_in(token: &str) -> SessionStore {
    SessionStore::with_session(Session::new(AccessToken::new(token).unwrap(), None))
}

// ============================================================================
// Scripted executor
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_gets_share_one_exchange() {
    let executor = MockExecutor::new(
        Duration::from_millis(50),
        Ok(ResponseBody::Json(json!({"temp": 60}))),
    );
    let gateway = mock_gateway(&executor);

    let (first, second) = tokio::join!(
        gateway.get("/weather/current/Seattle"),
        gateway.get("/weather/current/Seattle"),
    );

    assert_eq!(executor.calls(), 1);
    assert_eq!(first.unwrap().as_json(), Some(&json!({"temp": 60})));
    assert_eq!(second.unwrap().as_json(), Some(&json!({"temp": 60})));
    assert!(gateway.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shared_failure_reaches_every_caller() {
    let executor = MockExecutor::new(
        Duration::from_millis(50),
        Err(ClassifiedError::from_response(
            404,
            Some("Not Found"),
            Some(json!({"error": "City not found"})),
        )),
    );
    let gateway = mock_gateway(&executor);

    let (first, second) = tokio::join!(
        gateway.get("/weather/current/Atlantis"),
        gateway.get("/weather/current/Atlantis"),
    );

    let first = first.unwrap_err();
    assert_eq!(first.message(), "City not found");
    assert_eq!(first, second.unwrap_err());
    assert_eq!(executor.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_posts_are_not_shared() {
    let executor = MockExecutor::new(
        Duration::from_millis(50),
        Ok(ResponseBody::Json(json!({"id": 1, "name": "Paris"}))),
    );
    let gateway = mock_gateway(&executor);

    let (first, second) = tokio::join!(
        gateway.post("/favorites", json!({"name": "Paris"})),
        gateway.post("/favorites", json!({"name": "Paris"})),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(executor.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_get_is_retried_then_fails() {
    let executor = MockExecutor::new(
        Duration::ZERO,
        Err(ClassifiedError::from_response(
            429,
            Some("Too Many Requests"),
            None,
        )),
    );
    let gateway = mock_gateway(&executor);
    let options = RequestOptions::builder().max_retries(2).build().unwrap();
    let start = tokio::time::Instant::now();

    let err = gateway
        .request("/weather/forecast/Seattle", options)
        .await
        .unwrap_err();

    assert_eq!(executor.calls(), 3);
    assert_eq!(err.status(), 429);
    assert_eq!(err.kind(), ErrorKind::RateLimited);

    // Backoff of ~1000ms then ~2000ms, each within ±25%
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(2250), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(3750), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_skip_retry_makes_one_attempt() {
    let executor = MockExecutor::new(
        Duration::ZERO,
        Err(ClassifiedError::from_response(503, None, None)),
    );
    let gateway = mock_gateway(&executor);
    let options = RequestOptions::builder().skip_retry(true).build().unwrap();

    let err = gateway.request("/health", options).await.unwrap_err();

    assert_eq!(executor.calls(), 1);
    assert_eq!(err.status(), 503);
}

#[tokio::test(start_paused = true)]
async fn test_network_failure_exhausts_configured_retries() {
    let executor = MockExecutor::new(Duration::ZERO, Err(ClassifiedError::network()));
    let gateway = RequestGateway::with_executor(
        ClientConfig::builder()
            .base_url(BaseUrl::new("https://api.example.com").unwrap())
            .max_retries(4)
            .backoff(BackoffPolicy::cache_layer())
            .build()
            .unwrap(),
        SessionStore::new(),
        executor.clone(),
        DeduplicationRegistry::new(),
    );

    let err = gateway.get("/climate/normals/Oslo").await.unwrap_err();

    assert_eq!(executor.calls(), 5);
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.status(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_is_terminal() {
    let executor = MockExecutor::new(
        Duration::ZERO,
        Err(ClassifiedError::from_response(503, None, None)),
    );
    let gateway = mock_gateway(&executor);
    let token = CancellationToken::new();
    let options = RequestOptions::builder()
        .skip_dedup(true)
        .cancellation(token.clone())
        .build()
        .unwrap();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    };
    let (result, ()) = tokio::join!(gateway.request("/weather/current/Oslo", options), canceller);

    let err = result.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_already_cancelled_token_short_circuits() {
    let executor = MockExecutor::new(Duration::ZERO, Ok(ResponseBody::Empty));
    let gateway = mock_gateway(&executor);
    let token = CancellationToken::new();
    token.cancel();

    let options = RequestOptions::builder()
        .method(HttpMethod::Delete)
        .cancellation(token)
        .build()
        .unwrap();
    let err = gateway.request("/favorites/3", options).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(executor.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_gets_are_not_cached() {
    let executor = MockExecutor::new(Duration::from_millis(5), Ok(ResponseBody::Empty));
    let gateway = mock_gateway(&executor);

    gateway.get("/favorites").await.unwrap();
    gateway.get("/favorites").await.unwrap();

    assert_eq!(executor.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_registry_is_shared_between_gateways() {
    let executor = MockExecutor::new(
        Duration::from_millis(50),
        Ok(ResponseBody::Json(json!({"temp": 12}))),
    );
    let registry = DeduplicationRegistry::new();
    let make = || {
        RequestGateway::with_executor(
            config("https://api.example.com/api"),
            SessionStore::new(),
            executor.clone(),
            registry.clone(),
        )
    };
    let (left, right) = (make(), make());

    let _ = tokio::join!(
        left.get("/weather/hourly/Rome?hours=24"),
        right.get("/weather/hourly/Rome?hours=24"),
    );

    assert_eq!(executor.calls(), 1);
    assert_eq!(
        executor.urls.lock().unwrap().as_slice(),
        ["https://api.example.com/api/weather/hourly/Rome?hours=24"]
    );
}

// ============================================================================
// End to end
// ============================================================================

#[tokio::test]
async fn test_end_to_end_get_with_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/weather/forecast/Seattle"))
        .and(query_param("days", "7"))
        .and(header("Authorization", "Bearer tok-9"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"days": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::new(
        config(&format!("{}/api", mock_server.uri())),
        signed_in("tok-9"),
    )
    .unwrap();

    let options = RequestOptions::builder()
        .query_param("days", "7")
        .build()
        .unwrap();
    let body = gateway
        .request("/weather/forecast/Seattle", options)
        .await
        .unwrap();

    assert_eq!(body.as_json(), Some(&json!({"days": []})));
}

#[tokio::test]
async fn test_end_to_end_concurrent_reads_hit_server_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather/current/Seattle"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"temp": 60}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::new(config(&mock_server.uri()), SessionStore::new()).unwrap();

    let (a, b, c) = tokio::join!(
        gateway.get("/weather/current/Seattle"),
        gateway.get("/weather/current/Seattle"),
        gateway.get("/weather/current/Seattle"),
    );

    assert_eq!(a.unwrap(), b.clone().unwrap());
    assert_eq!(b.unwrap(), c.unwrap());
}

#[tokio::test]
async fn test_end_to_end_post_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/favorites"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::new(config(&mock_server.uri()), signed_in("tok")).unwrap();

    let err = gateway
        .post("/favorites", json!({"name": "Lima"}))
        .await
        .unwrap_err();

    assert_eq!(err.status(), 503);
    assert_eq!(err.message(), "Service Unavailable");
}

#[tokio::test]
async fn test_end_to_end_skip_auth_omits_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .and(header_exists("Authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = RequestGateway::new(config(&mock_server.uri()), signed_in("secret")).unwrap();
    let options = RequestOptions::builder().skip_auth(true).build().unwrap();

    let body = gateway.request("/health", options).await.unwrap();
    assert_eq!(body.as_text(), Some("OK"));
}

#[tokio::test]
async fn test_end_to_end_transient_failure_recovers() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/locations/popular"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/popular"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Short delays keep this test fast on a real clock.
    let config = ClientConfig::builder()
        .base_url(BaseUrl::new(mock_server.uri()).unwrap())
        .backoff(BackoffPolicy::new(
            Duration::from_millis(10),
            Duration::from_millis(40),
        ))
        .build()
        .unwrap();
    let gateway = RequestGateway::new(config, SessionStore::new()).unwrap();

    let body = gateway.get("/locations/popular").await.unwrap();
    assert_eq!(body.as_json(), Some(&json!([])));
}
