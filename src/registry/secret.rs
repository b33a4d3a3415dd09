//! Shared-secret storage and constant-time comparison.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// A secret held only as its SHA-256 digest.
///
/// Candidates are hashed before comparison, so the comparison runs over two
/// fixed-size digests and leaks neither content nor length through timing.
#[derive(Clone)]
pub struct SharedSecret {
    digest: [u8; 32],
}

impl SharedSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    /// Constant-time check of a presented credential.
    pub fn verify(&self, candidate: &str) -> bool {
        let candidate: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        self.digest.ct_eq(&candidate).into()
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.digest.ct_eq(&other.digest).into()
    }
}

impl Eq for SharedSecret {}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_exact_match_only() {
        let secret = SharedSecret::new("hunter2");
        assert!(secret.verify("hunter2"));
        assert!(!secret.verify("hunter3"));
        assert!(!secret.verify("hunter22"));
        assert!(!secret.verify(""));
    }

    #[test]
    fn equality_compares_digests() {
        assert_eq!(SharedSecret::new("a"), SharedSecret::new("a"));
        assert_ne!(SharedSecret::new("a"), SharedSecret::new("b"));
    }

    #[test]
    fn debug_never_prints_secret() {
        let rendered = format!("{:?}", SharedSecret::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
