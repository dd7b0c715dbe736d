//! Per-request tracing spans.
//!
//! Every request runs inside a `trigger_request` span. When an upstream proxy
//! sends a well-formed W3C `traceparent`, its trace and parent ids are
//! recorded on the span.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{field::Empty, info_span, Instrument, Span};

/// Ids carried by a `traceparent` header
#[derive(Debug, PartialEq, Eq)]
struct TraceParent<'a> {
    trace_id: &'a str,
    parent_id: &'a str,
}

impl<'a> TraceParent<'a> {
    /// `version-trace_id-parent_id-flags`, lowercase hex, all-zero ids invalid
    fn parse(value: &'a str) -> Option<Self> {
        let mut parts = value.trim().split('-');
        let (version, trace_id, parent_id, flags) =
            (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let hex = |s: &str, len: usize| {
            s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        };
        let zero = |s: &str| s.bytes().all(|b| b == b'0');

        if !hex(version, 2) || version == "ff" || !hex(flags, 2) {
            return None;
        }
        if !hex(trace_id, 32) || zero(trace_id) || !hex(parent_id, 16) || zero(parent_id) {
            return None;
        }

        Some(Self {
            trace_id,
            parent_id,
        })
    }

    fn from_request<B>(req: &'a Request<B>) -> Option<Self> {
        Self::parse(req.headers().get("traceparent")?.to_str().ok()?)
    }
}

fn request_span<B>(req: &Request<B>) -> Span {
    // path only: the query may carry a token
    let span = info_span!(
        "trigger_request",
        http.method = %req.method(),
        http.target = %req.uri().path(),
        otel.kind = "server",
        otel.status_code = Empty,
        trace_id = Empty,
        parent_span_id = Empty,
    );

    if let Some(parent) = TraceParent::from_request(req) {
        span.record("trace_id", parent.trace_id);
        span.record("parent_span_id", parent.parent_id);
    }

    span
}

#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
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
        let mut inner = self.inner.clone();
        let span = request_span(&req);

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let ok = matches!(&result, Ok(response) if response.status().is_success());
                Span::current().record("otel.status_code", if ok { "OK" } else { "ERROR" });
                result
            }
            .instrument(span),
        )
    }
}
