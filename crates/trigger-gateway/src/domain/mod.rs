//! Domain types for the trigger gateway.
//!
//! Secret handling, token validation, configuration and errors. No I/O lives
//! here; the privileged operation and secret sources are reached through ports.

pub mod config;
pub mod error;
pub mod ledger;
pub mod secret;
pub mod types;
pub mod validator;

pub use config::{GatewayConfig, LimitsConfig, OperationKind, SecretSourceKind};
pub use error::{ApiError, ApiResult, GatewayError, OperationError, SecretError, TriggerError};
pub use ledger::TriggerLedger;
pub use secret::{constant_time_compare, SecretState, TriggerSecret};
pub use types::*;
pub use validator::{Rejected, TokenValidator};
