//! Middleware stack for the trigger gateway.
//!
//! Layer order (outermost first): Cors → Tracing → Metrics → Timeout → RateLimit → Handler

pub mod cors;
pub mod metrics;
pub mod rate_limit;
pub mod timeout;
pub mod tracing;

pub use cors::create_cors_layer;
pub use metrics::{MetricsLayer, RequestTimer, TriggerMetrics};
pub use rate_limit::{cleanup_task, extract_client_ip, ClientIp, RateLimitLayer, RateLimitState};
pub use timeout::TimeoutLayer;
pub use self::tracing::TracingLayer;
