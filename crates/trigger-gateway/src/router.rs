//! HTTP routes for the public and admin listeners.

use crate::domain::config::GatewayConfig;
use crate::domain::error::ApiError;
use crate::domain::{TriggerContext, TriggerLedger};
use crate::extract::PresentedToken;
use crate::middleware::{
    create_cors_layer, ClientIp, MetricsLayer, RateLimitLayer, TimeoutLayer, TracingLayer,
    TriggerMetrics,
};
use crate::ports::TriggerApi;
use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;

/// Service name reported by `/status`
pub const SERVICE_NAME: &str = "trigger-gateway";

/// Default and maximum row counts for `/history`
const HISTORY_DEFAULT: usize = 50;
const HISTORY_MAX: usize = 500;

const OPERATOR_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Job search trigger</title>
</head>
<body>
<h1>Job search trigger</h1>
<form method="post" action="/trigger">
<label for="token">Trigger token</label>
<input id="token" name="token" type="password" autocomplete="off" required>
<button type="submit">Run job search</button>
</form>
</body>
</html>
"#;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn TriggerApi>,
    pub operation: String,
    pub metrics: Arc<TriggerMetrics>,
    pub ledger: Arc<TriggerLedger>,
}

/// Public router with its middleware stack.
///
/// Returns the rate-limit layer too so the caller can run its cleanup task.
pub fn build_public_router(state: AppState, config: &GatewayConfig) -> (Router, RateLimitLayer) {
    let rate_limit = RateLimitLayer::new(
        config.rate_limit.clone(),
        config.security.trust_forwarded_headers,
        Arc::clone(&state.metrics),
    );

    let middleware = ServiceBuilder::new()
        .layer(TracingLayer::new())
        .layer(MetricsLayer::new(Arc::clone(&state.metrics)))
        .layer(TimeoutLayer::new(config.timeouts.clone()))
        .layer(rate_limit.clone());

    let mut router = Router::new()
        .route("/", get(operator_page))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .route("/trigger", get(trigger).post(trigger))
        .layer(DefaultBodyLimit::max(config.limits.max_request_size))
        .layer(middleware)
        .with_state(state);

    if let Some(cors) = create_cors_layer(&config.cors) {
        router = router.layer(cors);
    }

    (router, rate_limit)
}

/// Admin router (metrics, history). Bound to localhost by default.
pub fn build_admin_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_json))
        .route("/history", get(history));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics/prometheus", get(metrics_prometheus));

    router.layer(TracingLayer::new()).with_state(state)
}

async fn operator_page() -> Html<&'static str> {
    Html(OPERATOR_PAGE)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "operation": state.operation,
        "triggered": state.metrics.triggered_count(),
        "rejected": state.metrics.rejected_count(),
        "last_triggered_at": state.ledger.last_triggered_at(),
    }))
}

async fn trigger(
    State(state): State<AppState>,
    client_ip: Option<Extension<ClientIp>>,
    token: PresentedToken,
) -> Response {
    let ip = client_ip.and_then(|Extension(ClientIp(ip))| ip);
    let ctx = TriggerContext::new(ip, token.source());

    match state.api.validate_and_trigger(token.as_str(), ctx).await {
        Ok(triggered) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "triggered",
                "trigger_id": triggered.trigger_id,
                "triggered_at": triggered.triggered_at,
                "operation": triggered.operation,
            })),
        )
            .into_response(),
        Err(e) => {
            let error = ApiError::from(&e);
            let mut response = (error.status(), Json(error.to_body())).into_response();
            if e.is_rejected() {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            response
        }
    }
}

async fn metrics_json(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.to_json())
}

#[cfg(feature = "metrics")]
async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(HISTORY_DEFAULT).min(HISTORY_MAX);
    Json(serde_json::json!({
        "capacity": state.ledger.capacity(),
        "records": state.ledger.recent(limit),
    }))
}
