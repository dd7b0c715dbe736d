//! # Trigger Secret
//!
//! Server-side credential compared against presented tokens.
//!
//! ## Security
//!
//! - The value is zeroed on drop and never leaves this module except as a
//!   borrowed byte slice handed to [`constant_time_compare`].
//! - `Debug` is redacted; there is no `Display`, `Clone` or `Serialize`.
//! - An empty value is a misconfiguration and is never provisioned.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A server-side credential string that zeroizes on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TriggerSecret {
    inner: Vec<u8>,
}

impl TriggerSecret {
    /// Wrap a provisioned value. Returns `None` for an empty value.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() {
            return None;
        }
        Some(Self {
            inner: value.into_bytes(),
        })
    }

    /// Borrow the raw bytes for a comparison or an outbound credential header.
    ///
    /// Use immediately and let go.
    pub fn expose(&self) -> &[u8] {
        &self.inner
    }

    /// Constant-time equality against a presented value.
    pub fn matches(&self, presented: &str) -> bool {
        constant_time_compare(presented.as_bytes(), &self.inner)
    }
}

impl std::fmt::Debug for TriggerSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TriggerSecret(***)")
    }
}

/// Provisioning state of the trigger secret, fixed at startup.
#[derive(Debug)]
pub enum SecretState {
    /// A usable, non-empty secret.
    Provisioned(TriggerSecret),
    /// Missing, unreadable or empty. Every check fails closed.
    Unavailable,
}

impl SecretState {
    /// Build the state from an optional raw value. Empty maps to `Unavailable`.
    pub fn from_value(value: Option<String>) -> Self {
        match value.and_then(TriggerSecret::new) {
            Some(secret) => SecretState::Provisioned(secret),
            None => SecretState::Unavailable,
        }
    }

    pub fn is_provisioned(&self) -> bool {
        matches!(self, SecretState::Provisioned(_))
    }
}

impl From<Option<TriggerSecret>> for SecretState {
    fn from(secret: Option<TriggerSecret>) -> Self {
        match secret {
            Some(secret) => SecretState::Provisioned(secret),
            None => SecretState::Unavailable,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// Both inputs are padded to the longer length with different fill bytes, so
/// the loop length does not depend on where the first difference is. The
/// length check is folded in with `&` rather than an early return.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];

    a_padded[..a.len()].copy_from_slice(a);
    b_padded[..b.len()].copy_from_slice(b);

    let lengths_equal = (a.len() as u64).ct_eq(&(b.len() as u64));
    let contents_equal = a_padded.ct_eq(&b_padded);

    let equal: bool = (lengths_equal & contents_equal).into();

    a_padded.zeroize();
    b_padded.zeroize();

    equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare(b"secret", b"secret"));
        assert!(!constant_time_compare(b"secret", b"Secret"));
        assert!(!constant_time_compare(b"secret", b"secre"));
        assert!(!constant_time_compare(b"secret", b"secrets"));
        assert!(!constant_time_compare(b"", b"secret"));
    }

    #[test]
    fn test_padding_does_not_create_false_match() {
        // a shorter value followed by the pad byte must still differ
        assert!(!constant_time_compare(b"abc", b"abc\xFF"));
        assert!(!constant_time_compare(b"abc\x00", b"abc"));
    }

    #[test]
    fn test_empty_secret_is_not_provisioned() {
        assert!(TriggerSecret::new("").is_none());
        assert!(!SecretState::from_value(Some(String::new())).is_provisioned());
        assert!(!SecretState::from_value(None).is_provisioned());
    }

    #[test]
    fn test_secret_matches() {
        let secret = TriggerSecret::new("job-search-2025").unwrap();
        assert!(secret.matches("job-search-2025"));
        assert!(!secret.matches("job-search-2024"));
        assert!(!secret.matches(""));
    }

    #[test]
    fn test_debug_hides_value() {
        let secret = TriggerSecret::new("job-search-2025").unwrap();
        let debug_str = format!("{:?}", secret);
        assert!(!debug_str.contains("job-search"));
        assert!(debug_str.contains("***"));

        let state = SecretState::Provisioned(secret);
        assert!(!format!("{:?}", state).contains("job-search"));
    }
}
