//! HTTP-level tests for the public and admin routers.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use trigger_gateway::router::{build_admin_router, build_public_router, AppState};
use trigger_gateway::{
    GatewayConfig, Invocation, OperationError, PrivilegedOperation, SecretState, TokenValidator,
    TriggerHandler, TriggerLedger, TriggerMetrics,
};

const SECRET: &str = "job-search-2025";

struct CountingOperation {
    calls: AtomicUsize,
    fail: bool,
    delay: Duration,
}

#[async_trait]
impl PrivilegedOperation for CountingOperation {
    fn name(&self) -> &str {
        "workflow_dispatch"
    }

    async fn invoke(&self) -> Result<Invocation, OperationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            Err(OperationError::Transport("connection refused".into()))
        } else {
            Ok(Invocation::with_detail("job-search.yml@main"))
        }
    }
}

struct Harness {
    public: Router,
    admin: Router,
    op: Arc<CountingOperation>,
}

impl Harness {
    fn calls(&self) -> usize {
        self.op.calls.load(Ordering::SeqCst)
    }
}

fn harness_with(secret: SecretState, fail: bool, config: GatewayConfig) -> Harness {
    let op = Arc::new(CountingOperation {
        calls: AtomicUsize::new(0),
        fail,
        delay: Duration::ZERO,
    });
    harness_for(op, secret, config)
}

fn harness_for(op: Arc<CountingOperation>, secret: SecretState, config: GatewayConfig) -> Harness {
    let metrics = Arc::new(TriggerMetrics::new());
    let ledger = Arc::new(TriggerLedger::new(config.ledger.capacity));

    let handler = TriggerHandler::new(
        Arc::new(TokenValidator::new(secret)),
        op.clone(),
        Arc::clone(&metrics),
        Arc::clone(&ledger),
    );
    let state = AppState {
        api: Arc::new(handler),
        operation: op.name().to_string(),
        metrics,
        ledger,
    };

    let (public, _) = build_public_router(state.clone(), &config);
    Harness {
        public,
        admin: build_admin_router(state),
        op,
    }
}

fn harness(secret: Option<&str>) -> Harness {
    harness_with(
        SecretState::from_value(secret.map(str::to_string)),
        false,
        GatewayConfig::default(),
    )
}

async fn send(router: &Router, req: Request<Body>) -> Response {
    router.clone().oneshot(req).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap()
        .to_vec()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/trigger")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("token={}", token)))
        .unwrap()
}

#[tokio::test]
async fn form_token_triggers_once() {
    let h = harness(Some(SECRET));

    let response = send(&h.public, post_form(SECRET)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "triggered");
    assert_eq!(body["operation"], "workflow_dispatch");
    assert!(body["trigger_id"].is_string());
    assert!(body["triggered_at"].is_string());
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn json_token_triggers() {
    let h = harness(Some(SECRET));
    let req = Request::builder()
        .method("POST")
        .uri("/trigger")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::json!({ "token": SECRET }).to_string()))
        .unwrap();

    assert_eq!(send(&h.public, req).await.status(), StatusCode::ACCEPTED);
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn bearer_token_triggers() {
    let h = harness(Some(SECRET));
    let req = Request::builder()
        .method("POST")
        .uri("/trigger")
        .header(header::AUTHORIZATION, format!("Bearer {}", SECRET))
        .body(Body::empty())
        .unwrap();

    assert_eq!(send(&h.public, req).await.status(), StatusCode::ACCEPTED);
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn header_token_triggers() {
    let h = harness(Some(SECRET));
    let req = Request::builder()
        .method("POST")
        .uri("/trigger")
        .header("X-Trigger-Token", SECRET)
        .body(Body::empty())
        .unwrap();

    assert_eq!(send(&h.public, req).await.status(), StatusCode::ACCEPTED);
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn query_token_triggers() {
    let h = harness(Some(SECRET));
    let req = Request::builder()
        .uri(format!("/trigger?token={}", SECRET))
        .body(Body::empty())
        .unwrap();

    assert_eq!(send(&h.public, req).await.status(), StatusCode::ACCEPTED);
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn wrong_and_empty_tokens_are_rejected() {
    let h = harness(Some(SECRET));

    for token in ["job-search-2024", ""] {
        let response = send(&h.public, post_form(token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32010);
        assert_eq!(body["error"]["message"], "Unauthorized: invalid trigger token");
    }

    let no_token = Request::builder()
        .method("POST")
        .uri("/trigger")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        send(&h.public, no_token).await.status(),
        StatusCode::UNAUTHORIZED
    );

    assert_eq!(h.calls(), 0);
}

#[tokio::test]
async fn unavailable_secret_looks_like_mismatch() {
    let configured = harness(Some(SECRET));
    let unset = harness(None);

    let mismatch = send(&configured.public, post_form("job-search-2024")).await;
    let unavailable = send(&unset.public, post_form(SECRET)).await;

    assert_eq!(mismatch.status(), unavailable.status());
    assert_eq!(
        mismatch.headers().get(header::WWW_AUTHENTICATE),
        unavailable.headers().get(header::WWW_AUTHENTICATE)
    );
    assert_eq!(body_bytes(mismatch).await, body_bytes(unavailable).await);
    assert_eq!(unset.calls(), 0);
}

#[tokio::test]
async fn repeated_triggers_each_run() {
    let h = harness(Some(SECRET));

    for _ in 0..3 {
        let response = send(&h.public, post_form(SECRET)).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
    assert_eq!(h.calls(), 3);
}

#[tokio::test]
async fn dispatch_failure_is_bad_gateway() {
    let h = harness_with(
        SecretState::from_value(Some(SECRET.to_string())),
        true,
        GatewayConfig::default(),
    );

    let response = send(&h.public, post_form(SECRET)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], -32002);
    assert!(!body.to_string().contains("connection refused"));
    assert_eq!(h.calls(), 1);
}

#[tokio::test]
async fn status_reports_counters_only() {
    let h = harness(Some(SECRET));

    send(&h.public, post_form("nope")).await;
    send(&h.public, post_form(SECRET)).await;

    let response = send(
        &h.public,
        Request::builder().uri("/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["service"], "trigger-gateway");
    assert_eq!(body["operation"], "workflow_dispatch");
    assert_eq!(body["triggered"], 1);
    assert_eq!(body["rejected"], 1);
    assert!(body["last_triggered_at"].is_string());

    let text = body.to_string();
    assert!(!text.contains("secret"));
    assert!(!text.contains(SECRET));
}

#[tokio::test]
async fn status_is_identical_with_and_without_secret() {
    let configured = harness(Some(SECRET));
    let unset = harness(None);

    let a = body_json(
        send(
            &configured.public,
            Request::builder().uri("/status").body(Body::empty()).unwrap(),
        )
        .await,
    )
    .await;
    let b = body_json(
        send(
            &unset.public,
            Request::builder().uri("/status").body(Body::empty()).unwrap(),
        )
        .await,
    )
    .await;

    assert_eq!(a, b);
}

#[tokio::test]
async fn operator_page_and_health() {
    let h = harness(Some(SECRET));

    let page = send(
        &h.public,
        Request::builder().uri("/").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(page.status(), StatusCode::OK);
    let html = String::from_utf8(body_bytes(page).await).unwrap();
    assert!(html.contains(r#"action="/trigger""#));
    assert!(html.contains(r#"type="password""#));

    let health = send(
        &h.public,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(body_json(health).await["status"], "ok");
}

#[tokio::test]
async fn timed_out_trigger_is_still_recorded() {
    let mut config = GatewayConfig::default();
    config.timeouts.trigger = Duration::from_millis(50);
    let op = Arc::new(CountingOperation {
        calls: AtomicUsize::new(0),
        fail: false,
        delay: Duration::from_millis(300),
    });
    let h = harness_for(
        op,
        SecretState::from_value(Some(SECRET.to_string())),
        config,
    );

    let response = send(&h.public, post_form(SECRET)).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

    // the dispatch finishes on its own task after the caller gave up
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(h.calls(), 1);

    let history = body_json(send(&h.admin, get("/history")).await).await;
    let records = history["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["outcome"], "triggered");

    let metrics = body_json(send(&h.admin, get("/metrics")).await).await;
    assert_eq!(metrics["triggers"]["triggered"], 1);
}

#[tokio::test]
async fn trigger_attempts_are_rate_limited() {
    let mut config = GatewayConfig::default();
    config.rate_limit.trigger_attempts_per_minute = 2;
    config.rate_limit.trigger_burst = 2;
    let h = harness_with(SecretState::Unavailable, false, config);

    for _ in 0..2 {
        let response = send(&h.public, post_form("guess")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let limited = send(&h.public, post_form("guess")).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(body_json(limited).await["error"]["code"], -32029);

    // other routes keep working
    let status = send(
        &h.public,
        Request::builder().uri("/status").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status.status(), StatusCode::OK);
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let h = harness(Some(SECRET));
    let padding = "x".repeat(8 * 1024);
    let req = Request::builder()
        .method("POST")
        .uri("/trigger")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("token={}&pad={}", SECRET, padding)))
        .unwrap();

    let response = send(&h.public, req).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.calls(), 0);
}

#[tokio::test]
async fn admin_history_and_metrics() {
    let h = harness(Some(SECRET));

    send(&h.public, post_form("wrong")).await;
    send(&h.public, post_form(SECRET)).await;

    let history = body_json(
        send(
            &h.admin,
            Request::builder()
                .uri("/history?limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await,
    )
    .await;
    let records = history["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["outcome"], "triggered");
    assert_eq!(records[1]["outcome"], "rejected");
    assert_eq!(records[0]["source"], "body");
    assert!(!history.to_string().contains(SECRET));

    let metrics = body_json(
        send(
            &h.admin,
            Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
        )
        .await,
    )
    .await;
    assert_eq!(metrics["triggers"]["triggered"], 1);
    assert_eq!(metrics["triggers"]["rejected_token_mismatch"], 1);
}

#[test]
fn default_config_needs_only_a_repository() {
    let mut config = GatewayConfig::default();
    tokio_test::assert_err!(config.validate());

    config.operation.workflow_dispatch.owner = "octo".into();
    config.operation.workflow_dispatch.repo = "job-search".into();
    tokio_test::assert_ok!(config.validate());
}
