//! Local command launcher.
//!
//! Spawns the job-search program and returns as soon as the child is running.
//! A detached task reaps the child and logs its exit status.

use crate::domain::config::CommandConfig;
use crate::domain::{Invocation, OperationError};
use crate::ports::PrivilegedOperation;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{error, info, warn};

pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    inherit_output: bool,
}

impl CommandLauncher {
    pub fn new(config: &CommandConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            inherit_output: config.inherit_output,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        if self.inherit_output {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        cmd
    }
}

#[async_trait]
impl PrivilegedOperation for CommandLauncher {
    fn name(&self) -> &str {
        "command"
    }

    async fn invoke(&self) -> Result<Invocation, OperationError> {
        let mut child = self.command().spawn().map_err(|e| OperationError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let pid = child.id();
        info!(program = %self.program, pid = ?pid, "Job search process started");

        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    info!(program = %program, pid = ?pid, "Job search process finished");
                }
                Ok(status) => {
                    warn!(program = %program, pid = ?pid, code = ?status.code(), "Job search process exited with failure");
                }
                Err(e) => {
                    error!(program = %program, pid = ?pid, error = %e, "Failed to wait for job search process");
                }
            }
        });

        Ok(Invocation {
            detail: pid.map(|p| format!("pid {}", p)),
        })
    }
}
