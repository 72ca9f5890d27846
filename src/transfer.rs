//! File operations over the SFTP subsystem of an open session.
//!
//! One [`SftpChannel`] lives inside one session and performs exactly one
//! operation before the session is torn down. Transfers are single-pass
//! whole-file copies in fixed-size chunks; there is no resumption and no
//! chunk-level retry.

use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Local};
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{OpenFlags, StatusCode};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::error::{Error, Result};
use crate::session::Session;
use crate::types::{DirectoryEntry, EntryKind};

/// Chunk size for upload/download loops (64 KiB).
const TRANSFER_CHUNK_SIZE: usize = 64 * 1024;

/// SFTP access bound to one session.
pub(crate) struct SftpChannel {
    sftp: SftpSession,
}

impl SftpChannel {
    /// Open the `sftp` subsystem on a dedicated channel of `session`.
    pub(crate) async fn open(session: &mut Session) -> Result<Self> {
        session.mark_busy();

        let channel = session
            .handle()
            .channel_open_session()
            .await
            .map_err(|e| Error::Protocol(format!("failed to open channel: {e}")))?;

        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::Protocol(format!("sftp subsystem unavailable: {e}")))?;

        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::Protocol(format!("sftp handshake failed: {e}")))?;

        Ok(Self { sftp })
    }

    /// Read a remote file and return its content as text.
    pub(crate) async fn read_to_string(&self, remote_path: &str) -> Result<String> {
        let mut file = self
            .sftp
            .open(remote_path)
            .await
            .map_err(|e| classify_sftp_error(remote_path, e))?;

        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| Error::RemoteIo {
                path: remote_path.to_string(),
                detail: e.to_string(),
            })?;

        debug!(path = remote_path, bytes = content.len(), "remote file read");
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    /// Enumerate a remote directory.
    pub(crate) async fn list_dir(&self, remote_path: &str) -> Result<Vec<DirectoryEntry>> {
        let read_dir = self
            .sftp
            .read_dir(remote_path)
            .await
            .map_err(|e| classify_sftp_error(remote_path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }

            let metadata = entry.metadata();
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else if metadata.is_regular() {
                EntryKind::File
            } else {
                EntryKind::Other
            };

            entries.push(DirectoryEntry {
                name,
                kind,
                size_bytes: metadata.size.unwrap_or(0),
                modified_at: mtime_to_local(metadata.mtime.unwrap_or(0)),
            });
        }

        debug!(path = remote_path, count = entries.len(), "remote directory listed");
        Ok(entries)
    }

    /// Copy a local file to `remote_path`, creating or truncating it.
    ///
    /// Returns the number of bytes written.
    pub(crate) async fn upload(&self, local_path: &Path, remote_path: &str) -> Result<u64> {
        let mut local_file = fs::File::open(local_path)
            .await
            .map_err(|e| Error::local(local_path, e))?;

        let mut remote_file = self
            .sftp
            .open_with_flags(
                remote_path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| classify_sftp_error(remote_path, e))?;

        let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            let bytes_read = local_file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::local(local_path, e))?;
            if bytes_read == 0 {
                break;
            }
            remote_file
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(|e| Error::RemoteIo {
                    path: remote_path.to_string(),
                    detail: e.to_string(),
                })?;
            transferred += bytes_read as u64;
        }

        remote_file.flush().await.map_err(|e| Error::RemoteIo {
            path: remote_path.to_string(),
            detail: e.to_string(),
        })?;
        // Remote file handle closes on drop.

        debug!(
            local = %local_path.display(),
            remote = remote_path,
            bytes = transferred,
            "upload complete"
        );
        Ok(transferred)
    }

    /// Copy a remote file to `local_path`, creating or truncating it.
    ///
    /// Returns the number of bytes written.
    pub(crate) async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        let mut remote_file = self
            .sftp
            .open(remote_path)
            .await
            .map_err(|e| classify_sftp_error(remote_path, e))?;

        let mut local_file = fs::File::create(local_path)
            .await
            .map_err(|e| Error::local(local_path, e))?;

        let mut buffer = vec![0u8; TRANSFER_CHUNK_SIZE];
        let mut transferred = 0u64;
        loop {
            let bytes_read = remote_file
                .read(&mut buffer)
                .await
                .map_err(|e| Error::RemoteIo {
                    path: remote_path.to_string(),
                    detail: e.to_string(),
                })?;
            if bytes_read == 0 {
                break;
            }
            local_file
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(|e| Error::local(local_path, e))?;
            transferred += bytes_read as u64;
        }

        local_file
            .flush()
            .await
            .map_err(|e| Error::local(local_path, e))?;

        debug!(
            remote = remote_path,
            local = %local_path.display(),
            bytes = transferred,
            "download complete"
        );
        Ok(transferred)
    }
}

/// Convert a remote mtime (seconds since epoch) to the local representation.
fn mtime_to_local(secs: u32) -> DateTime<Local> {
    DateTime::from(UNIX_EPOCH + Duration::from_secs(u64::from(secs)))
}

/// Map SFTP status codes into the typed taxonomy.
///
/// Remote-side path problems (missing file, permissions) become `RemoteIo`;
/// anything else from the SFTP layer is a protocol failure.
fn classify_sftp_error(path: &str, err: SftpError) -> Error {
    match err {
        SftpError::Status(status) => {
            let detail = match status.status_code {
                StatusCode::NoSuchFile => "no such file or directory".to_string(),
                StatusCode::PermissionDenied => "permission denied".to_string(),
                _ => status.error_message,
            };
            Error::RemoteIo {
                path: path.to_string(),
                detail,
            }
        }
        other => Error::Protocol(other.to_string()),
    }
}
