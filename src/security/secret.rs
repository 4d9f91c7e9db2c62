//! The shared authorization secret.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::controller::ControllerError;

/// Shared secret every remote call must present.
///
/// Loaded once at startup and never mutated. Clones share one allocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Arc<str>);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Arc::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True if `candidate` equals the held secret.
    ///
    /// Does not stop at the first differing byte.
    pub fn matches(&self, candidate: &str) -> bool {
        let ours = self.0.as_bytes();
        let theirs = candidate.as_bytes();
        if ours.len() != theirs.len() {
            return false;
        }
        ours.iter().zip(theirs).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
    }

    /// Fail with [`ControllerError::Unauthorized`] unless `candidate` matches.
    pub fn verify(&self, candidate: &str) -> Result<(), ControllerError> {
        if self.matches(candidate) {
            Ok(())
        } else {
            Err(ControllerError::Unauthorized)
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Read the secret file.
///
/// A missing, unreadable or blank file means "not written yet" and yields
/// `None`; trailing whitespace is stripped.
pub fn probe_secret(path: &Path) -> Option<Secret> {
    let content = fs::read_to_string(path).ok()?;
    let value = content.trim_end();
    if value.is_empty() {
        return None;
    }
    Some(Secret::new(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_accepts_only_exact_match() {
        let secret = Secret::new("s3cr3t");
        assert!(secret.verify("s3cr3t").is_ok());
        assert!(matches!(secret.verify("s3cr3"), Err(ControllerError::Unauthorized)));
        assert!(matches!(secret.verify("s3cr3T"), Err(ControllerError::Unauthorized)));
        assert!(matches!(secret.verify(""), Err(ControllerError::Unauthorized)));
    }

    #[test]
    fn debug_does_not_leak() {
        let secret = Secret::new("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
    }

    #[test]
    fn probe_handles_missing_blank_and_present_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret.key");

        assert!(probe_secret(&path).is_none());

        fs::write(&path, "\n").unwrap();
        assert!(probe_secret(&path).is_none());

        fs::write(&path, "abc123\n").unwrap();
        assert_eq!(probe_secret(&path).unwrap().expose(), "abc123");
    }
}
