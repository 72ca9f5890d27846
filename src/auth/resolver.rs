//! Fallback-ordered credential resolution.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Error, Result};
use crate::record::{ConnectionRecord, expand_tilde};

use super::Credential;

/// Default key file names probed, in order, when a record carries no
/// explicit credential.
const DEFAULT_KEY_FILES: &[&str] = &["id_ed25519", "id_rsa"];

/// Decides which credential to present for a given connection record.
///
/// Stateless apart from the SSH directory it probes for default keys, which
/// is injectable for tests and defaults to `~/.ssh`.
#[derive(Debug, Clone)]
pub struct AuthResolver {
    ssh_dir: PathBuf,
}

impl AuthResolver {
    pub fn new() -> Self {
        let ssh_dir = dirs::home_dir()
            .map(|home| home.join(".ssh"))
            .unwrap_or_else(|| PathBuf::from(".ssh"));
        Self { ssh_dir }
    }

    /// Use a specific directory for the default-key probe.
    pub fn with_ssh_dir(ssh_dir: impl Into<PathBuf>) -> Self {
        Self {
            ssh_dir: ssh_dir.into(),
        }
    }

    /// Resolve a credential for `record`.
    ///
    /// An explicit key path that does not point at a readable file is an
    /// error, not a fall-through: a configured key is a statement of intent
    /// and silently switching methods would mask the misconfiguration.
    pub fn resolve(&self, record: &ConnectionRecord) -> Result<Credential> {
        if let Some(path) = &record.private_key_path {
            let expanded = expand_tilde(path);
            if !expanded.is_file() {
                return Err(Error::KeyNotFound(expanded));
            }
            debug!(connection = %record.name, key = %expanded.display(), "using configured private key");
            return Ok(Credential::PrivateKey(expanded));
        }

        if let Some(password) = &record.password {
            debug!(connection = %record.name, "using configured password");
            return Ok(Credential::Password(password.clone()));
        }

        for file in DEFAULT_KEY_FILES {
            let candidate = self.ssh_dir.join(file);
            if candidate.is_file() {
                debug!(connection = %record.name, key = %candidate.display(), "using default private key");
                return Ok(Credential::PrivateKey(candidate));
            }
        }

        Err(Error::NoAuthenticationAvailable {
            connection: record.name.clone(),
        })
    }
}

impl Default for AuthResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record() -> ConnectionRecord {
        ConnectionRecord::new("db1", "10.0.0.5", "admin")
    }

    mod explicit_key {
        use super::*;

        #[test]
        fn test_existing_key_is_used() {
            let dir = tempfile::tempdir().unwrap();
            let key_path = dir.path().join("deploy_key");
            fs::write(&key_path, "---").unwrap();

            let mut record = record();
            record.private_key_path = Some(key_path.clone());

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert_eq!(
                resolver.resolve(&record).unwrap(),
                Credential::PrivateKey(key_path)
            );
        }

        #[test]
        fn test_missing_key_fails_with_key_not_found() {
            let dir = tempfile::tempdir().unwrap();
            let mut record = record();
            record.private_key_path = Some(dir.path().join("absent"));

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert!(matches!(
                resolver.resolve(&record),
                Err(Error::KeyNotFound(_))
            ));
        }

        #[test]
        fn test_missing_key_does_not_fall_through_to_password() {
            let dir = tempfile::tempdir().unwrap();
            let mut record = record();
            record.private_key_path = Some(dir.path().join("absent"));
            record.password = Some("backup".to_string());

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert!(matches!(
                resolver.resolve(&record),
                Err(Error::KeyNotFound(_))
            ));
        }
    }

    mod password {
        use super::*;

        #[test]
        fn test_password_used_when_no_key_configured() {
            let dir = tempfile::tempdir().unwrap();
            let mut record = record();
            record.password = Some("s3cret".to_string());

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert_eq!(
                resolver.resolve(&record).unwrap(),
                Credential::Password("s3cret".to_string())
            );
        }

        #[test]
        fn test_password_beats_default_keys() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("id_ed25519"), "---").unwrap();
            let mut record = record();
            record.password = Some("s3cret".to_string());

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert!(matches!(
                resolver.resolve(&record).unwrap(),
                Credential::Password(_)
            ));
        }
    }

    mod default_keys {
        use super::*;

        #[test]
        fn test_ed25519_probed_before_rsa() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("id_ed25519"), "---").unwrap();
            fs::write(dir.path().join("id_rsa"), "---").unwrap();

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert_eq!(
                resolver.resolve(&record()).unwrap(),
                Credential::PrivateKey(dir.path().join("id_ed25519"))
            );
        }

        #[test]
        fn test_rsa_used_when_ed25519_absent() {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("id_rsa"), "---").unwrap();

            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert_eq!(
                resolver.resolve(&record()).unwrap(),
                Credential::PrivateKey(dir.path().join("id_rsa"))
            );
        }

        #[test]
        fn test_no_credential_at_all_fails() {
            let dir = tempfile::tempdir().unwrap();
            let resolver = AuthResolver::with_ssh_dir(dir.path());
            assert!(matches!(
                resolver.resolve(&record()),
                Err(Error::NoAuthenticationAvailable { ref connection }) if connection == "db1"
            ));
        }
    }
}
