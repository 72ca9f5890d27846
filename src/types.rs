//! Serializable outcome types for remote operations.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Result of a single remote command execution.
///
/// Output is kept as raw bytes exactly as the remote process produced it;
/// use [`CommandOutcome::stdout_text`] / [`CommandOutcome::stderr_text`] for
/// a lossy UTF-8 view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// The remote process's exit code; 0 when the transport reported none.
    pub exit_code: i32,
}

impl CommandOutcome {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Result of a completed upload or download.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub succeeded: bool,
    pub detail_message: String,
}

/// Kind of a remote directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, devices, sockets: anything that is neither of the above.
    Other,
}

/// One entry from a remote directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size_bytes: u64,
    /// Remote modification time, converted to the local timezone.
    pub modified_at: DateTime<Local>,
}

/// Outcome of a connectivity probe. Always produced, never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub succeeded: bool,
    pub message: String,
    /// Time to connect, authenticate, and tear down; absent on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}
