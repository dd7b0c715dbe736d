//! Adapters for the trigger gateway.
//!
//! Infrastructure implementations of the outbound ports.

pub mod command;
pub mod secret_source;
pub mod workflow_dispatch;

pub use command::CommandLauncher;
pub use secret_source::{provision, source_from_config, EnvSecretSource, FileSecretSource};
pub use workflow_dispatch::WorkflowDispatch;

use crate::domain::config::{OperationConfig, OperationKind};
use crate::domain::OperationError;
use crate::ports::{PrivilegedOperation, SecretSource};
use std::sync::Arc;

/// Build the configured privileged operation.
///
/// The workflow-dispatch credential is read from its env var here, once.
pub fn build_operation(
    config: &OperationConfig,
) -> Result<Arc<dyn PrivilegedOperation>, OperationError> {
    match config.kind {
        OperationKind::WorkflowDispatch => {
            let wd = &config.workflow_dispatch;
            let credential = EnvSecretSource::new(wd.token_env.clone())
                .load()
                .map_err(|e| OperationError::Misconfigured(e.to_string()))?
                .ok_or_else(|| {
                    OperationError::Misconfigured(format!(
                        "dispatch credential env var {} is not set",
                        wd.token_env
                    ))
                })?;
            Ok(Arc::new(WorkflowDispatch::new(wd, credential)?))
        }
        OperationKind::Command => Ok(Arc::new(CommandLauncher::new(&config.command))),
    }
}
