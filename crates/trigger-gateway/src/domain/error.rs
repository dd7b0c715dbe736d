//! Gateway error types.
//!
//! `ApiError` is the JSON error body sent to callers. The numeric codes keep
//! the JSON-RPC server-error ranges so existing clients can switch on them.

use super::validator::Rejected;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes carried in `ApiError::code`
pub mod codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const RESOURCE_UNAVAILABLE: i32 = -32002;
    pub const TIMEOUT: i32 = -32006;
    pub const UNAUTHORIZED: i32 = -32010;
    pub const RATE_LIMITED: i32 = -32029;
}

/// Caller-facing error
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Invalid request - malformed input that never reached validation
    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self::new(
            codes::INVALID_REQUEST,
            format!("Invalid request: {}", details.into()),
        )
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(
            codes::INTERNAL_ERROR,
            format!("Internal error: {}", details.into()),
        )
    }

    /// The one response for every rejected token, whatever the reason.
    pub fn unauthorized() -> Self {
        Self::new(codes::UNAUTHORIZED, "Unauthorized: invalid trigger token")
    }

    /// Downstream operation failed after a successful match
    pub fn dispatch_failed() -> Self {
        Self::new(
            codes::RESOURCE_UNAVAILABLE,
            "Resource unavailable: downstream operation failed",
        )
    }

    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::new(
            codes::TIMEOUT,
            format!("Request timeout: {}", operation.into()),
        )
    }

    pub fn rate_limited(retry_after_ms: u64) -> Self {
        Self::with_data(
            codes::RATE_LIMITED,
            "Rate limit exceeded",
            serde_json::json!({
                "retry_after_ms": retry_after_ms
            }),
        )
    }

    /// HTTP status paired with this error
    pub fn status(&self) -> StatusCode {
        match self.code {
            codes::UNAUTHORIZED => StatusCode::UNAUTHORIZED,
            codes::RESOURCE_UNAVAILABLE => StatusCode::BAD_GATEWAY,
            codes::TIMEOUT => StatusCode::GATEWAY_TIMEOUT,
            codes::RATE_LIMITED => StatusCode::TOO_MANY_REQUESTS,
            codes::INVALID_REQUEST => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Wrap in the `{"error": ...}` envelope
    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self })
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ApiError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref data) = self.data {
            state.serialize_field("data", data)?;
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for ApiError {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ErrorHelper {
            code: i32,
            message: String,
            data: Option<serde_json::Value>,
        }

        let helper = ErrorHelper::deserialize(deserializer)?;
        Ok(ApiError {
            code: helper.code,
            message: helper.message,
            data: helper.data,
        })
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure of the downstream privileged operation
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// Request never got a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Downstream answered with a non-success status
    #[error("downstream rejected dispatch with status {status}")]
    Rejected { status: u16 },

    /// Local process could not be started
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },

    /// Adapter configuration is unusable (missing credential, bad URL)
    #[error("operation misconfigured: {0}")]
    Misconfigured(String),

    /// Dispatch task ended without an outcome
    #[error("dispatch aborted: {0}")]
    Aborted(String),
}

/// Outcome of `validate_and_trigger` when nothing was triggered
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("{0}")]
    Rejected(#[from] Rejected),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] OperationError),
}

impl TriggerError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, TriggerError::Rejected(_))
    }
}

impl From<&TriggerError> for ApiError {
    fn from(e: &TriggerError) -> Self {
        match e {
            TriggerError::Rejected(_) => ApiError::unauthorized(),
            TriggerError::Dispatch(_) => ApiError::dispatch_failed(),
        }
    }
}

/// Failure to read a secret from its source
///
/// Messages name the source, never the value.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("failed to read secret from {source_name}: {message}")]
    Io {
        source_name: String,
        message: String,
    },

    #[error("secret in {source_name} is not valid unicode")]
    NotUnicode { source_name: String },
}

/// Gateway-level errors (internal use)
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("server bind error: {0}")]
    Bind(String),

    #[error("shutdown in progress")]
    ShuttingDown,

    #[error("internal error: {0}")]
    Internal(String),
}
