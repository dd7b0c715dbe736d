//! Inbound (driving) port: the trigger API exposed to the HTTP layer.

use crate::domain::{TriggerContext, TriggerError, Triggered};
use async_trait::async_trait;

/// Validate a presented token and, on a match, run the privileged operation.
///
/// # Guarantees
///
/// - Any token other than the provisioned secret returns
///   `TriggerError::Rejected` and the operation is not invoked.
/// - A matching token invokes the operation exactly once per call.
/// - Rejections carry no caller-visible reason.
#[async_trait]
pub trait TriggerApi: Send + Sync {
    async fn validate_and_trigger(
        &self,
        presented: &str,
        ctx: TriggerContext,
    ) -> Result<Triggered, TriggerError>;
}
