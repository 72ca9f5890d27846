//! The credential a session presents to the remote host.

use std::path::PathBuf;

/// One resolved credential, ready to present during authentication.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Publickey authentication with the key at this path.
    PrivateKey(PathBuf),
    /// Password authentication.
    Password(String),
}

impl Credential {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::PrivateKey(_) => "private-key",
            Credential::Password(_) => "password",
        }
    }
}

// Manual Debug so a password never reaches the logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::PrivateKey(path) => f.debug_tuple("PrivateKey").field(path).finish(),
            Credential::Password(_) => f.debug_tuple("Password").field(&"<redacted>").finish(),
        }
    }
}
