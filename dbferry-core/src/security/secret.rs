//! Secure container for the shared secret.

use zeroize::Zeroizing;

/// Shared secret that zeroes its memory on drop.
///
/// # Example
///
/// ```rust
/// use dbferry_core::security::SharedSecret;
///
/// let secret = SharedSecret::new("s3cret".to_string());
/// assert!(secret.matches("s3cret"));
/// assert!(!secret.matches("guess"));
/// assert_eq!(format!("{:?}", secret), "SharedSecret(****)");
/// ```
#[derive(Clone)]
pub struct SharedSecret {
    value: Zeroizing<String>,
}

impl SharedSecret {
    /// Wraps `value`; the original allocation is moved, not copied.
    pub fn new(value: String) -> Self {
        Self {
            value: Zeroizing::new(value),
        }
    }

    /// Exposes the secret for transmission (e.g. building a request header).
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Compares `candidate` against the secret without an early exit.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.value.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// True for an empty secret, which is treated as "not configured".
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(****)")
    }
}

impl From<String> for SharedSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
