//! Outbound (driven) ports for the trigger gateway.

use crate::domain::{Invocation, OperationError, SecretError, TriggerSecret};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// The privileged action gated by token validation.
///
/// Called at most once per accepted trigger, never for a rejected one.
/// Takes no parameters: the call itself is the "run now" signal.
#[async_trait]
pub trait PrivilegedOperation: Send + Sync {
    /// Short name for logs and responses
    fn name(&self) -> &str;

    async fn invoke(&self) -> Result<Invocation, OperationError>;
}

/// Out-of-band store the trigger secret is provisioned from.
///
/// Read once at startup.
pub trait SecretSource: Send + Sync {
    /// Human-readable location, e.g. `env:TRIGGER_SECRET`. Never the value.
    fn describe(&self) -> String;

    /// `Ok(None)` when the source holds nothing.
    fn load(&self) -> Result<Option<TriggerSecret>, SecretError>;
}

/// Time source trait for testability
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
