//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Public trigger server
    pub http: HttpConfig,
    /// Admin server (localhost only by default)
    pub admin: AdminConfig,
    /// Per-IP rate limiting
    pub rate_limit: RateLimitConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// Timeouts
    pub timeouts: TimeoutConfig,
    /// CORS
    pub cors: CorsConfig,
    /// Client address handling
    pub security: SecurityConfig,
    /// Where the trigger secret is provisioned from
    pub secret: SecretConfig,
    /// The privileged operation behind the gateway
    pub operation: OperationConfig,
    /// Trigger history
    pub ledger: LedgerConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.enabled
            && self.admin.enabled
            && self.http.port == self.admin.port
            && self.http.port != 0
        {
            return Err(ConfigError::DuplicatePorts);
        }

        if self.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_second cannot be 0".into(),
            ));
        }

        if self.rate_limit.trigger_attempts_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "trigger_attempts_per_minute cannot be 0".into(),
            ));
        }

        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        if self.ledger.capacity == 0 {
            return Err(ConfigError::InvalidLimit("ledger capacity cannot be 0".into()));
        }

        if self.timeouts.default.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "default timeout cannot be 0".into(),
            ));
        }

        if self.timeouts.trigger.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "trigger timeout cannot be 0".into(),
            ));
        }

        // the dispatch must settle inside the trigger budget
        if self.operation.kind == OperationKind::WorkflowDispatch
            && self.operation.workflow_dispatch.request_timeout >= self.timeouts.trigger
        {
            return Err(ConfigError::InvalidTimeout(
                "workflow_dispatch.request_timeout must be shorter than the trigger timeout"
                    .into(),
            ));
        }

        if self.secret.source == SecretSourceKind::File && self.secret.path.is_none() {
            return Err(ConfigError::Invalid(
                "secret.source = file requires secret.path".into(),
            ));
        }

        self.operation.validate()
    }

    /// Public server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    /// Admin server bind address
    pub fn admin_addr(&self) -> SocketAddr {
        SocketAddr::new(self.admin.host, self.admin.port)
    }
}

/// Public trigger server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: IpAddr,
    /// Port (default: 8000)
    pub port: u16,
    pub enabled: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8000,
            enabled: true,
        }
    }
}

/// Admin server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bind address (localhost only by default)
    pub host: IpAddr,
    /// Port (default: 8081)
    pub port: u16,
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8081,
            enabled: true,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per second per IP (any route)
    pub requests_per_second: u32,
    /// Burst allowance for ordinary requests
    pub burst_size: u32,
    /// Trigger attempts per minute per IP (`/trigger` only)
    pub trigger_attempts_per_minute: u32,
    /// Burst allowance for trigger attempts
    pub trigger_burst: u32,
    pub enabled: bool,
    /// IPs exempt from rate limiting
    pub whitelist: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 20,
            burst_size: 40,
            trigger_attempts_per_minute: 10,
            trigger_burst: 5,
            enabled: true,
            whitelist: Vec::new(),
        }
    }
}

/// Request limits configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 4KB)
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 4 * 1024,
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default timeout for most requests
    #[serde(with = "humantime_serde")]
    pub default: Duration,
    /// Timeout for `/trigger`, including the downstream invocation
    #[serde(with = "humantime_serde")]
    pub trigger: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(10),
            trigger: Duration::from_secs(30),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Off by default: the operator page is served same-origin
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-Trigger-Token".to_string(),
            ],
            max_age: 3600,
        }
    }
}

/// Client address handling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a proxy that overwrites these headers.
    pub trust_forwarded_headers: bool,
}

/// Secret source selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretSourceKind {
    #[default]
    Env,
    File,
}

/// Where the trigger secret comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub source: SecretSourceKind,
    /// Environment variable holding the secret
    pub env_var: String,
    /// File holding the secret (one trailing newline is trimmed)
    pub path: Option<PathBuf>,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            source: SecretSourceKind::Env,
            env_var: "TRIGGER_SECRET".to_string(),
            path: None,
        }
    }
}

/// Privileged operation selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[default]
    WorkflowDispatch,
    Command,
}

impl std::str::FromStr for OperationKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "workflow_dispatch" => Ok(OperationKind::WorkflowDispatch),
            "command" => Ok(OperationKind::Command),
            other => Err(ConfigError::InvalidOperation(format!(
                "unknown operation kind: {}",
                other
            ))),
        }
    }
}

/// The privileged operation behind the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationConfig {
    pub kind: OperationKind,
    pub workflow_dispatch: WorkflowDispatchConfig,
    pub command: CommandConfig,
}

impl OperationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            OperationKind::WorkflowDispatch => {
                let wd = &self.workflow_dispatch;
                if wd.owner.is_empty() || wd.repo.is_empty() {
                    return Err(ConfigError::InvalidOperation(
                        "workflow_dispatch requires owner and repo".into(),
                    ));
                }
                if wd.workflow.is_empty() {
                    return Err(ConfigError::InvalidOperation(
                        "workflow_dispatch requires workflow".into(),
                    ));
                }
                if wd.git_ref.is_empty() {
                    return Err(ConfigError::InvalidOperation(
                        "workflow_dispatch requires git_ref".into(),
                    ));
                }
                if !wd.api_base.starts_with("http://") && !wd.api_base.starts_with("https://") {
                    return Err(ConfigError::InvalidOperation(format!(
                        "api_base must be an http(s) URL: {}",
                        wd.api_base
                    )));
                }
            }
            OperationKind::Command => {
                if self.command.program.is_empty() {
                    return Err(ConfigError::InvalidOperation(
                        "command requires program".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Name reported in responses and logs
    pub fn name(&self) -> &'static str {
        match self.kind {
            OperationKind::WorkflowDispatch => "workflow_dispatch",
            OperationKind::Command => "command",
        }
    }
}

/// GitHub Actions `workflow_dispatch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowDispatchConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    /// Workflow file name or numeric id
    pub workflow: String,
    /// Branch or tag the workflow runs on
    pub git_ref: String,
    /// Environment variable holding the dispatch credential
    pub token_env: String,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for WorkflowDispatchConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            workflow: "job-search.yml".to_string(),
            git_ref: "main".to_string(),
            token_env: "TRIGGER_GITHUB_TOKEN".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Local command launched on trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Inherit stdout/stderr instead of discarding them
    pub inherit_output: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["github_action_search_v2.py".to_string()],
            working_dir: None,
            inherit_output: true,
        }
    }
}

/// Trigger history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Records kept in memory; oldest evicted first
    pub capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate ports configured")]
    DuplicatePorts,
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Duration (de)serialization as `"10s"`, `"500ms"`, `"2m"` or plain seconds
pub mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" before "s" and "m"
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
