//! Gateway counters.
//!
//! Exposed as JSON on the admin listener, and as Prometheus text with the
//! `metrics` feature.

use axum::{body::Body, http::Request, response::Response};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

/// Trigger gateway metrics
#[derive(Default)]
pub struct TriggerMetrics {
    // Request counters
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub requests_error: AtomicU64,

    // Trigger outcomes
    pub triggered: AtomicU64,
    pub rejected_mismatch: AtomicU64,
    pub rejected_unavailable: AtomicU64,
    pub dispatch_failed: AtomicU64,

    // Rate limit counters
    pub rate_limit_rejected: AtomicU64,

    // Summed latency; the average is all that is exported
    pub total_latency_ms: AtomicU64,
    pub request_count_for_latency: AtomicU64,
}

impl TriggerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished HTTP request
    pub fn record_request(&self, success: bool, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }

        self.total_latency_ms
            .fetch_add(latency_ms, Ordering::Relaxed);
        self.request_count_for_latency
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_triggered(&self) {
        self.triggered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_mismatch(&self) {
        self.rejected_mismatch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.rejected_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch_failure(&self) {
        self.dispatch_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record rate limit rejection
    pub fn record_rate_limit_rejection(&self) {
        self.rate_limit_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn triggered_count(&self) -> u64 {
        self.triggered.load(Ordering::Relaxed)
    }

    /// Rejections of either kind. The split is admin-only.
    pub fn rejected_count(&self) -> u64 {
        self.rejected_mismatch.load(Ordering::Relaxed)
            + self.rejected_unavailable.load(Ordering::Relaxed)
    }

    /// Get average latency in ms
    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.request_count_for_latency.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "# HELP trigger_gateway_requests_total Total number of HTTP requests\n\
             # TYPE trigger_gateway_requests_total counter\n\
             trigger_gateway_requests_total {}\n",
            self.requests_total.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP trigger_gateway_requests_error_total Requests answered with an error status\n\
             # TYPE trigger_gateway_requests_error_total counter\n\
             trigger_gateway_requests_error_total {}\n",
            self.requests_error.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP trigger_gateway_triggered_total Accepted triggers\n\
             # TYPE trigger_gateway_triggered_total counter\n\
             trigger_gateway_triggered_total {}\n",
            self.triggered.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP trigger_gateway_rejected_total Rejected trigger attempts by reason\n\
             # TYPE trigger_gateway_rejected_total counter\n\
             trigger_gateway_rejected_total{{reason=\"token_mismatch\"}} {}\n\
             trigger_gateway_rejected_total{{reason=\"secret_unavailable\"}} {}\n",
            self.rejected_mismatch.load(Ordering::Relaxed),
            self.rejected_unavailable.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP trigger_gateway_dispatch_failed_total Downstream failures after a match\n\
             # TYPE trigger_gateway_dispatch_failed_total counter\n\
             trigger_gateway_dispatch_failed_total {}\n",
            self.dispatch_failed.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP trigger_gateway_rate_limit_rejected_total Rate limited requests\n\
             # TYPE trigger_gateway_rate_limit_rejected_total counter\n\
             trigger_gateway_rate_limit_rejected_total {}\n",
            self.rate_limit_rejected.load(Ordering::Relaxed)
        ));

        output.push_str(&format!(
            "# HELP trigger_gateway_average_latency_ms Average request latency\n\
             # TYPE trigger_gateway_average_latency_ms gauge\n\
             trigger_gateway_average_latency_ms {:.2}\n",
            self.average_latency_ms()
        ));

        output
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "requests": {
                "total": self.requests_total.load(Ordering::Relaxed),
                "success": self.requests_success.load(Ordering::Relaxed),
                "error": self.requests_error.load(Ordering::Relaxed),
            },
            "triggers": {
                "triggered": self.triggered.load(Ordering::Relaxed),
                "rejected_token_mismatch": self.rejected_mismatch.load(Ordering::Relaxed),
                "rejected_secret_unavailable": self.rejected_unavailable.load(Ordering::Relaxed),
                "dispatch_failed": self.dispatch_failed.load(Ordering::Relaxed),
            },
            "rate_limiting": {
                "rejected": self.rate_limit_rejected.load(Ordering::Relaxed),
            },
            "latency": {
                "average_ms": self.average_latency_ms(),
            }
        })
    }
}

/// Request timing helper
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<TriggerMetrics>,
}

impl RequestTimer {
    pub fn new(metrics: Arc<TriggerMetrics>) -> Self {
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    pub fn finish(self, success: bool) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.metrics.record_request(success, latency_ms);
    }
}

/// Layer recording request count, outcome and latency
#[derive(Clone)]
pub struct MetricsLayer {
    metrics: Arc<TriggerMetrics>,
}

impl MetricsLayer {
    pub fn new(metrics: Arc<TriggerMetrics>) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService {
            inner,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Metrics service
#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
    metrics: Arc<TriggerMetrics>,
}

impl<S> Service<Request<Body>> for MetricsService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let timer = RequestTimer::new(Arc::clone(&self.metrics));
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let result = inner.call(req).await;
            let success = matches!(&result, Ok(response) if response.status().is_success());
            timer.finish(success);
            result
        })
    }
}
