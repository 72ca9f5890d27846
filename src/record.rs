//! Connection records and their provenance.
//!
//! A [`ConnectionRecord`] is the boundary type for everything that feeds the
//! registry: manually curated entries, environment-supplied JSON, and
//! discovery providers all deserialize into this shape. Validation happens at
//! registry acceptance time, not here; deserialization is deliberately
//! lenient so that one malformed entry never poisons a whole source list.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default SSH port applied when a record carries none.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Where a connection definition came from.
///
/// Provenance is bookkeeping only: it decides display and whether a record
/// can later be removed (`Manual` only), never how it authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    #[default]
    Manual,
    Environment,
    Discovered,
}

impl std::fmt::Display for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordSource::Manual => write!(f, "manual"),
            RecordSource::Environment => write!(f, "environment"),
            RecordSource::Discovered => write!(f, "discovered"),
        }
    }
}

/// One addressable remote target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Unique, case-sensitive registry key.
    pub name: String,
    pub host: String,
    /// Zero means "not set"; the registry normalizes it to [`DEFAULT_SSH_PORT`].
    #[serde(default)]
    pub port: u16,
    pub username: String,
    /// Path to a private key file. Tilde-prefixed paths are expanded when the
    /// record is accepted into the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub source: RecordSource,
}

impl ConnectionRecord {
    /// Convenience constructor for a manual record with defaults.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            private_key_path: None,
            password: None,
            source: RecordSource::Manual,
        }
    }

    /// Whether the record carries the fields the registry requires.
    pub(crate) fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.host.is_empty() && !self.username.is_empty()
    }
}

/// Expand a leading `~` against the current user's home directory.
///
/// `~` and `~/...` expand; `~otheruser/...` is left untouched. Paths without
/// a tilde pass through unchanged.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
