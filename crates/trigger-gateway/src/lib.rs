//! Trigger Gateway - secret-token gate in front of the job-search run.
//!
//! An operator presents a token; when it equals the server-side secret the
//! privileged operation (a GitHub Actions workflow dispatch, or a local
//! command) runs once. Anything else is rejected without touching it.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       TRIGGER GATEWAY                         │
//! ├───────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐        ┌──────────────────────┐     │
//! │  │   Public HTTP        │        │   Admin HTTP         │     │
//! │  │   0.0.0.0:8000       │        │   127.0.0.1:8081     │     │
//! │  │   / /status /trigger │        │   /metrics /history  │     │
//! │  └──────────┬───────────┘        └──────────────────────┘     │
//! │             │                                                 │
//! │  ┌──────────┴───────────────────────────────────┐             │
//! │  │ Tracing → Metrics → Timeout → RateLimit      │             │
//! │  └──────────┬───────────────────────────────────┘             │
//! │             │                                                 │
//! │  ┌──────────┴───────────┐   ┌────────────────────┐            │
//! │  │   TriggerHandler     │──▶│   TokenValidator   │            │
//! │  └──────────┬───────────┘   └────────────────────┘            │
//! └─────────────┼─────────────────────────────────────────────────┘
//!               ▼
//!     PrivilegedOperation (WorkflowDispatch | CommandLauncher)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use trigger_gateway::{adapters, GatewayConfig, TriggerGatewayService};
//!
//! let config = GatewayConfig::default();
//! let secret = adapters::provision(adapters::source_from_config(&config.secret).as_ref());
//! let operation = adapters::build_operation(&config.operation)?;
//! let mut service = TriggerGatewayService::new(config, secret, operation)?;
//! service.start().await?;
//! ```
//!
//! # Security
//!
//! - Constant-time token comparison; secrets zeroized on drop
//! - Fail closed: no secret means every request is rejected
//! - Mismatch and missing-secret rejections are indistinguishable to callers
//! - Per-IP rate limiting, with a tighter bucket for trigger attempts

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod extract;
pub mod handler;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;

// Re-exports for public API
pub use domain::config::GatewayConfig;
pub use domain::error::{ApiError, ApiResult, GatewayError, OperationError, TriggerError};
pub use domain::types::*;
pub use domain::{SecretState, TokenValidator, TriggerLedger, TriggerSecret};
pub use handler::TriggerHandler;
pub use middleware::TriggerMetrics;
pub use ports::{PrivilegedOperation, SecretSource, TriggerApi};
pub use service::TriggerGatewayService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
