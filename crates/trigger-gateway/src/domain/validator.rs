//! Token validation: the single decision point in front of the privileged operation.
//!
//! `check` is synchronous and side-effect free. Order of checks:
//!
//! 1. Secret unavailable → reject (fail closed)
//! 2. Empty presented token → reject (even against an empty secret)
//! 3. Constant-time comparison → reject on inequality

use super::secret::SecretState;
use std::fmt;

/// Why a token was rejected. Server-side only; never surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RejectReason {
    TokenMismatch,
    SecretUnavailable,
}

impl RejectReason {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            RejectReason::TokenMismatch => "token_mismatch",
            RejectReason::SecretUnavailable => "secret_unavailable",
        }
    }
}

/// A rejected trigger request.
///
/// `Display` is identical for every reason so the outcome cannot be used to
/// learn whether a secret is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    reason: RejectReason,
}

impl Rejected {
    pub(crate) fn new(reason: RejectReason) -> Self {
        Self { reason }
    }

    pub(crate) fn reason(&self) -> RejectReason {
        self.reason
    }
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid trigger token")
    }
}

impl std::error::Error for Rejected {}

/// Compares presented tokens against the secret provisioned at startup.
#[derive(Debug)]
pub struct TokenValidator {
    secret: SecretState,
}

impl TokenValidator {
    pub fn new(secret: SecretState) -> Self {
        Self { secret }
    }

    /// Whether a secret was provisioned. For startup diagnostics only.
    pub fn is_armed(&self) -> bool {
        self.secret.is_provisioned()
    }

    /// Decide whether `presented` authorizes a trigger.
    pub fn check(&self, presented: &str) -> Result<(), Rejected> {
        let secret = match &self.secret {
            SecretState::Provisioned(secret) => secret,
            SecretState::Unavailable => {
                return Err(Rejected::new(RejectReason::SecretUnavailable));
            }
        };

        if presented.is_empty() {
            return Err(Rejected::new(RejectReason::TokenMismatch));
        }

        if secret.matches(presented) {
            Ok(())
        } else {
            Err(Rejected::new(RejectReason::TokenMismatch))
        }
    }
}
