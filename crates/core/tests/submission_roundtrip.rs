//! End-to-end tests over real HTTP.
//!
//! A local axum server plays the remote API: bulk fetch, primary report and
//! three photo uploads, one of which is slow and one of which always fails.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tempfile::TempDir;

use stanpost_core::{
    testing::fixtures, Config, Context, ReqwestExchange, StanClient, SubmissionError,
    TransportClient, TransportError,
};
use stanpost_core::transport::Method;

#[derive(Default)]
struct Seen {
    primary: Mutex<Vec<(String, String)>>,
    uploads: Mutex<Vec<String>>,
    flaky_hits: AtomicUsize,
}

async fn fetch_handler(body: String) -> (StatusCode, Vec<u8>) {
    assert!(body.contains("username=52260.j07"));
    let records = vec![
        fixtures::source_record("1001", "A1", "900"),
        fixtures::source_record("1002", "A1", "1300"),
        fixtures::source_record("2001", "B2", "450"),
    ];
    (StatusCode::OK, fixtures::fetch_body(&records))
}

async fn primary_handler(
    State(seen): State<Arc<Seen>>,
    headers: HeaderMap,
    body: String,
) -> &'static str {
    let agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.primary.lock().unwrap().push((agent, body));
    r#"{"success":1}"#
}

async fn upload_handler(State(seen): State<Arc<Seen>>, body: String) -> &'static str {
    seen.uploads.lock().unwrap().push(body);
    "ok"
}

async fn slow_upload_handler(State(seen): State<Arc<Seen>>, body: String) -> &'static str {
    tokio::time::sleep(Duration::from_millis(150)).await;
    seen.uploads.lock().unwrap().push(body);
    "ok"
}

async fn failing_upload_handler() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn stalled_handler() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

async fn flaky_handler(State(seen): State<Arc<Seen>>) -> &'static str {
    if seen.flaky_hits.fetch_add(1, Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_secs(3)).await;
        return "late";
    }
    "ok"
}

async fn start_server() -> (SocketAddr, Arc<Seen>) {
    let seen = Arc::new(Seen::default());
    let app = Router::new()
        .route("/mobile/getAllStanPrabayar", post(fetch_handler))
        .route("/mobile/setStanPrabayar", post(primary_handler))
        .route("/mobile/uploadFoto52", post(upload_handler))
        .route("/mobile/uploadFoto2", post(slow_upload_handler))
        .route("/mobile/uploadFoto3", post(failing_upload_handler))
        .route("/mobile/stalled", post(stalled_handler))
        .route("/mobile/flaky", post(flaky_handler))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to read local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });
    (addr, seen)
}

fn config_for(addr: SocketAddr, temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.transport.base_url = format!("http://{}/mobile", addr);
    config.database.path = temp_dir.path().join("prepaidData.db");
    config
}

#[tokio::test]
async fn test_fetch_then_submit_batch() {
    let (addr, seen) = start_server().await;
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let client = StanClient::new(config_for(addr, &temp_dir), "52260.j07")
        .expect("Failed to create client");
    let ctx = Context::background();

    let fetched = client.fetch_and_store(&ctx).await.expect("Fetch failed");
    assert_eq!(fetched, 3);

    let groups = client.routing_groups().unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!((groups[0].code.as_str(), groups[0].count), ("A1", 2));

    let records = client.records_by_routing_code("A1").unwrap();
    let outcomes = client.submit_batch(&ctx, &records).await;
    assert_eq!(outcomes.len(), 2);

    for outcome in &outcomes {
        let result = &outcome.result;
        assert!(result.primary_succeeded());
        assert_eq!(result.auxiliary.len(), 3);
        assert_eq!(result.auxiliary[0].endpoint, "/uploadFoto52");
        assert!(result.auxiliary[0].is_success());
        assert_eq!(result.auxiliary[1].endpoint, "/uploadFoto2");
        assert!(result.auxiliary[1].is_success());
        assert!(matches!(
            result.auxiliary[2].outcome,
            Err(SubmissionError::Auxiliary(TransportError::Status { status: 500 }))
        ));
        assert_eq!(result.succeeded_count(), 3);
        assert_eq!(result.failed_endpoints(), vec!["/uploadFoto3"]);
    }

    // Submitted records leave the store; the other group is untouched.
    let groups = client.routing_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].code, "B2");

    let primary = seen.primary.lock().unwrap().clone();
    assert_eq!(primary.len(), 2);
    for (agent, body) in &primary {
        assert_eq!(agent, "Dalvik/2.1.0");
        assert!(body.starts_with("tglbaca="));
        assert!(body.ends_with("status_temper=0"));
    }
    assert_eq!(seen.uploads.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_connection_refused_exhausts_retries() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let temp_dir = TempDir::new().unwrap();
    let config = config_for(addr, &temp_dir);
    let transport = TransportClient::from_config(&config.transport).unwrap();

    let start = Instant::now();
    let err = transport
        .send(
            &Context::background(),
            Method::POST,
            &format!("http://{}/mobile/setStanPrabayar", addr),
            "idpel=1",
            &[],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::RetriesExhausted { attempts: 3, .. }));
    // Backoff of 100ms then 200ms between the three attempts.
    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_stalled_attempt_is_retried() {
    let (addr, seen) = start_server().await;
    let temp_dir = TempDir::new().unwrap();
    let mut config = config_for(addr, &temp_dir);
    config.transport.request_timeout_secs = 1;
    let transport = TransportClient::from_config(&config.transport).unwrap();

    let body = transport
        .send(
            &Context::background(),
            Method::POST,
            &format!("http://{}/mobile/flaky", addr),
            "",
            &[],
        )
        .await
        .expect("Second attempt should succeed");

    assert_eq!(body, b"ok");
    assert_eq!(seen.flaky_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stalled_endpoint_exhausts_retries() {
    let (addr, _) = start_server().await;
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(addr, &temp_dir);
    let transport: TransportClient<ReqwestExchange> =
        TransportClient::from_config(&config.transport)
            .unwrap()
            .with_request_timeout(Duration::from_millis(300));

    let start = Instant::now();
    let err = transport
        .send(
            &Context::background(),
            Method::POST,
            &format!("http://{}/mobile/stalled", addr),
            "",
            &[],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::RetriesExhausted { attempts: 3, .. }));
    // Three 300ms attempts plus 100ms and 200ms of backoff.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1200), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert_eq!(transport.pool().idle(), 1);
}

#[tokio::test]
async fn test_context_deadline_bounds_the_call() {
    let (addr, _) = start_server().await;
    let temp_dir = TempDir::new().unwrap();
    let config = config_for(addr, &temp_dir);
    let transport = TransportClient::from_config(&config.transport).unwrap();

    let ctx = Context::background().with_timeout(Duration::from_millis(300));
    let start = Instant::now();
    let err = transport
        .send(
            &ctx,
            Method::POST,
            &format!("http://{}/mobile/stalled", addr),
            "",
            &[],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Timeout { .. }));
    assert!(start.elapsed() < Duration::from_secs(2));
}
