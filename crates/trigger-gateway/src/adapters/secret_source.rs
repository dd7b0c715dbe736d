//! Secret sources: environment variable and file.
//!
//! Provisioning never fails the process. Anything other than a readable,
//! non-empty value leaves the validator unarmed (fail closed).

use crate::domain::config::{SecretConfig, SecretSourceKind};
use crate::domain::{SecretError, SecretState, TriggerSecret};
use crate::ports::SecretSource;
use std::path::PathBuf;
use tracing::{info, warn};

/// Reads the secret from an environment variable.
pub struct EnvSecretSource {
    var: String,
}

impl EnvSecretSource {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl SecretSource for EnvSecretSource {
    fn describe(&self) -> String {
        format!("env:{}", self.var)
    }

    fn load(&self) -> Result<Option<TriggerSecret>, SecretError> {
        match std::env::var(&self.var) {
            Ok(value) => Ok(TriggerSecret::new(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::NotUnicode {
                source_name: self.describe(),
            }),
        }
    }
}

/// Reads the secret from a file (e.g. a mounted container secret).
pub struct FileSecretSource {
    path: PathBuf,
}

impl FileSecretSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SecretSource for FileSecretSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn load(&self) -> Result<Option<TriggerSecret>, SecretError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SecretError::Io {
                    source_name: self.describe(),
                    message: e.kind().to_string(),
                })
            }
        };

        let mut value = String::from_utf8(bytes).map_err(|_| SecretError::NotUnicode {
            source_name: self.describe(),
        })?;

        // editors leave one trailing newline
        if value.ends_with('\n') {
            value.pop();
            if value.ends_with('\r') {
                value.pop();
            }
        }

        Ok(TriggerSecret::new(value))
    }
}

/// Build the configured source
pub fn source_from_config(config: &SecretConfig) -> Box<dyn SecretSource> {
    match (config.source, &config.path) {
        (SecretSourceKind::File, Some(path)) => Box::new(FileSecretSource::new(path.clone())),
        _ => Box::new(EnvSecretSource::new(config.env_var.clone())),
    }
}

/// Read the secret once. Errors, absence and empty values all yield
/// `SecretState::Unavailable`.
pub fn provision(source: &dyn SecretSource) -> SecretState {
    match source.load() {
        Ok(Some(secret)) => {
            info!(source = %source.describe(), "Trigger secret provisioned");
            SecretState::Provisioned(secret)
        }
        Ok(None) => {
            warn!(
                source = %source.describe(),
                "Trigger secret missing or empty - all trigger requests will be rejected"
            );
            SecretState::Unavailable
        }
        Err(e) => {
            warn!(
                source = %source.describe(),
                error = %e,
                "Trigger secret unreadable - all trigger requests will be rejected"
            );
            SecretState::Unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_source_found() {
        // unique name to avoid cross-test interference
        std::env::set_var("TRIGGER_TEST_SECRET_ENV_001", "job-search-2025");
        let source = EnvSecretSource::new("TRIGGER_TEST_SECRET_ENV_001");
        let secret = source.load().unwrap().unwrap();
        assert!(secret.matches("job-search-2025"));
        std::env::remove_var("TRIGGER_TEST_SECRET_ENV_001");
    }

    #[test]
    fn test_env_source_missing() {
        let source = EnvSecretSource::new("TRIGGER_DEFINITELY_NONEXISTENT_VAR");
        assert!(source.load().unwrap().is_none());
        assert!(!provision(&source).is_provisioned());
    }

    #[test]
    fn test_env_source_empty_is_unavailable() {
        std::env::set_var("TRIGGER_TEST_SECRET_ENV_002", "");
        let source = EnvSecretSource::new("TRIGGER_TEST_SECRET_ENV_002");
        assert!(!provision(&source).is_provisioned());
        std::env::remove_var("TRIGGER_TEST_SECRET_ENV_002");
    }

    #[test]
    fn test_file_source_trims_newline() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "job-search-2025").unwrap();

        let source = FileSecretSource::new(file.path());
        let secret = source.load().unwrap().unwrap();
        assert!(secret.matches("job-search-2025"));
        assert!(!secret.matches("job-search-2025\n"));
    }

    #[test]
    fn test_file_source_keeps_inner_whitespace() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, " spaced secret ").unwrap();

        let secret = FileSecretSource::new(file.path()).load().unwrap().unwrap();
        assert!(secret.matches(" spaced secret "));
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSecretSource::new(dir.path().join("absent"));
        assert!(source.load().unwrap().is_none());
    }

    #[test]
    fn test_file_source_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00]).unwrap();

        let source = FileSecretSource::new(file.path());
        let err = source.load().unwrap_err();
        assert!(matches!(err, SecretError::NotUnicode { .. }));
        assert!(!provision(&source).is_provisioned());
    }

    #[test]
    fn test_describe_never_contains_value() {
        std::env::set_var("TRIGGER_TEST_SECRET_ENV_003", "hunter2");
        let source = EnvSecretSource::new("TRIGGER_TEST_SECRET_ENV_003");
        assert_eq!(source.describe(), "env:TRIGGER_TEST_SECRET_ENV_003");
        std::env::remove_var("TRIGGER_TEST_SECRET_ENV_003");
    }

    #[test]
    fn test_source_from_config() {
        let mut config = SecretConfig::default();
        assert_eq!(source_from_config(&config).describe(), "env:TRIGGER_SECRET");

        config.source = SecretSourceKind::File;
        config.path = Some(PathBuf::from("/run/secrets/trigger"));
        assert_eq!(
            source_from_config(&config).describe(),
            "file:/run/secrets/trigger"
        );
    }
}
