//! # Runtime Configuration
//!
//! Resolution order: defaults → optional JSON file → `TRIGGER_*` environment
//! overrides → validation.
//!
//! | Variable                    | Field                                   |
//! |-----------------------------|-----------------------------------------|
//! | `TRIGGER_HTTP_HOST`         | `http.host`                             |
//! | `TRIGGER_HTTP_PORT`         | `http.port`                             |
//! | `TRIGGER_ADMIN_PORT`        | `admin.port`                            |
//! | `TRIGGER_SECRET_FILE`       | `secret.source = file`, `secret.path`   |
//! | `TRIGGER_OPERATION`         | `operation.kind`                        |
//! | `TRIGGER_GITHUB_REPOSITORY` | `workflow_dispatch.owner` / `.repo`     |
//! | `TRIGGER_GITHUB_WORKFLOW`   | `workflow_dispatch.workflow`            |
//! | `TRIGGER_GITHUB_REF`        | `workflow_dispatch.git_ref`             |

use std::path::{Path, PathBuf};
use trigger_gateway::domain::config::{ConfigError, OperationKind, SecretSourceKind};
use trigger_gateway::GatewayConfig;

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value in {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Load configuration from an optional file and the process environment.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigLoadError> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    config.validate()?;

    Ok(config)
}

fn read_file(path: &Path) -> Result<GatewayConfig, ConfigLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `TRIGGER_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigLoadError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("TRIGGER_HTTP_HOST") {
        config.http.host = parse_var("TRIGGER_HTTP_HOST", &host)?;
    }
    if let Some(port) = lookup("TRIGGER_HTTP_PORT") {
        config.http.port = parse_var("TRIGGER_HTTP_PORT", &port)?;
    }
    if let Some(port) = lookup("TRIGGER_ADMIN_PORT") {
        config.admin.port = parse_var("TRIGGER_ADMIN_PORT", &port)?;
    }

    if let Some(path) = lookup("TRIGGER_SECRET_FILE") {
        config.secret.source = SecretSourceKind::File;
        config.secret.path = Some(PathBuf::from(path));
    }

    if let Some(kind) = lookup("TRIGGER_OPERATION") {
        config.operation.kind = kind.parse::<OperationKind>()?;
    }

    let wd = &mut config.operation.workflow_dispatch;
    if let Some(repository) = lookup("TRIGGER_GITHUB_REPOSITORY") {
        let (owner, repo) = repository
            .trim()
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| ConfigLoadError::Env {
                var: "TRIGGER_GITHUB_REPOSITORY",
                message: format!("expected owner/repo, got {:?}", repository),
            })?;
        wd.owner = owner.to_string();
        wd.repo = repo.to_string();
    }
    if let Some(workflow) = lookup("TRIGGER_GITHUB_WORKFLOW") {
        wd.workflow = workflow;
    }
    if let Some(git_ref) = lookup("TRIGGER_GITHUB_REF") {
        wd.git_ref = git_ref;
    }

    Ok(())
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigLoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigLoadError::Env {
        var,
        message: e.to_string(),
    })
}
