//! Per-IP rate limiting with token buckets.
//!
//! Two buckets per client: a general per-second bucket for every route, and
//! a per-minute bucket for trigger attempts so a token cannot be brute forced
//! at the general rate.
//!
//! The resolved client address is attached to the request as [`ClientIp`].

use crate::domain::config::RateLimitConfig;
use crate::domain::error::ApiError;
use crate::middleware::metrics::TriggerMetrics;
use crate::middleware::timeout::TRIGGER_PATH;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Request},
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    NotUntil, Quota, RateLimiter,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client address as seen by the gateway. `None` when it could not be
/// determined (no connect info, no trusted forwarding header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

/// Token bucket entry for an IP address
struct TokenBucket {
    /// Any request
    general: DirectLimiter,
    /// Trigger attempts only
    trigger: DirectLimiter,
    /// Last access time (for cleanup)
    last_access: Instant,
}

impl TokenBucket {
    fn new(config: &RateLimitConfig) -> Self {
        let general = Quota::per_second(nonzero(config.requests_per_second))
            .allow_burst(nonzero(config.burst_size));
        let trigger = Quota::per_minute(nonzero(config.trigger_attempts_per_minute))
            .allow_burst(nonzero(config.trigger_burst));

        Self {
            general: RateLimiter::direct(general),
            trigger: RateLimiter::direct(trigger),
            last_access: Instant::now(),
        }
    }

    fn check(&mut self, is_trigger: bool) -> Result<(), Duration> {
        self.last_access = Instant::now();

        self.general.check().map_err(wait_time)?;
        if is_trigger {
            self.trigger.check().map_err(wait_time)?;
        }
        Ok(())
    }
}

fn nonzero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

fn wait_time(not_until: NotUntil<<DefaultClock as Clock>::Instant>) -> Duration {
    not_until.wait_time_from(DefaultClock::default().now())
}

/// Rate limiter state shared across requests
pub struct RateLimitState {
    /// Per-IP token buckets
    buckets: DashMap<IpAddr, TokenBucket>,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
        }
    }

    /// Check if request should be allowed. `Err` carries the wait time.
    pub fn check(&self, ip: IpAddr, is_trigger: bool) -> Result<(), Duration> {
        if !self.config.enabled || self.config.whitelist.contains(&ip) {
            return Ok(());
        }

        let mut bucket = self.buckets.entry(ip).or_insert_with(|| {
            debug!(ip = %ip, "Creating new rate limit bucket");
            TokenBucket::new(&self.config)
        });

        bucket.check(is_trigger)
    }

    /// Clean up old buckets (call periodically)
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets.retain(|ip, bucket| {
            let age = now.duration_since(bucket.last_access);
            if age > max_age {
                debug!(ip = %ip, age_secs = age.as_secs(), "Removing stale rate limit bucket");
                false
            } else {
                true
            }
        });
    }

    /// Get number of tracked IPs
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    trust_forwarded_headers: bool,
    metrics: Arc<TriggerMetrics>,
}

impl RateLimitLayer {
    pub fn new(
        config: RateLimitConfig,
        trust_forwarded_headers: bool,
        metrics: Arc<TriggerMetrics>,
    ) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            trust_forwarded_headers,
            metrics,
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            trust_forwarded_headers: self.trust_forwarded_headers,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    trust_forwarded_headers: bool,
    metrics: Arc<TriggerMetrics>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();
        let trust_forwarded = self.trust_forwarded_headers;

        Box::pin(async move {
            let client_ip = extract_client_ip(&req, trust_forwarded);
            req.extensions_mut().insert(ClientIp(client_ip));

            // unknown clients share one bucket
            let key = client_ip.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
            let is_trigger = req.uri().path() == TRIGGER_PATH;

            match state.check(key, is_trigger) {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    let retry_ms = retry_after.as_millis() as u64;
                    warn!(
                        ip = %key,
                        retry_after_ms = retry_ms,
                        is_trigger = is_trigger,
                        "Rate limit exceeded"
                    );
                    metrics.record_rate_limit_rejection();

                    Ok(rate_limit_response(retry_ms))
                }
            }
        })
    }
}

/// Resolve the client address.
///
/// Forwarding headers are only honoured when the gateway is configured to
/// trust them; otherwise any client could pick its own bucket.
pub fn extract_client_ip<B>(req: &Request<B>, trust_forwarded: bool) -> Option<IpAddr> {
    if trust_forwarded {
        let forwarded = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = req
            .headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip())
}

/// Create rate limit exceeded response
fn rate_limit_response(retry_after_ms: u64) -> Response {
    let error = ApiError::rate_limited(retry_after_ms);
    let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);

    let mut response = Response::new(Body::from(
        serde_json::to_vec(&error.to_body()).unwrap_or_default(),
    ));
    *response.status_mut() = error.status();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));

    response
}

/// Background task to clean up stale rate limit buckets
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        state.cleanup(max_age);
    }
}
