//! Timeout middleware.
//!
//! `/trigger` gets the longer trigger timeout since it waits on the
//! downstream dispatch; every other route uses the default.

use crate::domain::config::TimeoutConfig;
use crate::domain::error::ApiError;
use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    response::Response,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tower::{Layer, Service};
use tracing::warn;

/// Path whose requests use `TimeoutConfig::trigger`
pub const TRIGGER_PATH: &str = "/trigger";

/// Timeout layer
#[derive(Clone)]
pub struct TimeoutLayer {
    config: Arc<TimeoutConfig>,
}

impl TimeoutLayer {
    pub fn new(config: TimeoutConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Timeout service
#[derive(Clone)]
pub struct TimeoutService<S> {
    inner: S,
    config: Arc<TimeoutConfig>,
}

impl<S> Service<Request<Body>> for TimeoutService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let limit = get_timeout_for_request(&req, &config);
            let path = req.uri().path().to_string();

            match timeout(limit, inner.call(req)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(path = %path, timeout_ms = limit.as_millis() as u64, "Request timed out");
                    Ok(timeout_response(limit))
                }
            }
        })
    }
}

fn get_timeout_for_request<B>(req: &Request<B>, config: &TimeoutConfig) -> Duration {
    if req.uri().path() == TRIGGER_PATH {
        config.trigger
    } else {
        config.default
    }
}

fn timeout_response(limit: Duration) -> Response {
    let error = ApiError::timeout(format!("exceeded {}ms", limit.as_millis()));

    let mut response = Response::new(Body::from(
        serde_json::to_vec(&error.to_body()).unwrap_or_default(),
    ));
    *response.status_mut() = error.status();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    response
}
