//! Typed failure taxonomy for registry lookups and remote operations.
//!
//! Every executor operation returns exactly one of these kinds on failure.
//! Classification is done on structured error values (`std::io::ErrorKind`,
//! `russh::Error` variants, SFTP status codes), never by inspecting message
//! text.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested name is not present in the resolved registry.
    #[error("unknown connection '{0}'")]
    UnknownConnection(String),

    /// No explicit credential and no default key file could be found.
    #[error("no authentication available for connection '{connection}'")]
    NoAuthenticationAvailable { connection: String },

    /// An explicitly configured private key file does not exist.
    #[error("private key not found at {0}")]
    KeyNotFound(PathBuf),

    /// The remote host refused the presented credential.
    #[error("authentication rejected for {username}@{host}")]
    AuthenticationRejected { username: String, host: String },

    #[error("connection refused by {host}:{port}")]
    ConnectionRefused { host: String, port: u16 },

    #[error("host unreachable: {host}:{port}")]
    HostUnreachable { host: String, port: u16 },

    /// The per-operation watchdog fired before the action completed.
    #[error("operation timed out after {timeout_ms} ms")]
    OperationTimedOut { timeout_ms: u64 },

    /// The remote side reported an I/O failure (missing file, permissions).
    #[error("remote I/O error on '{path}': {detail}")]
    RemoteIo { path: String, detail: String },

    /// A local filesystem failure, e.g. the upload source is missing.
    #[error("local I/O error on '{}': {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Unexpected transport-level failure.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Classify a failure from the transport handshake phase.
    ///
    /// TCP-level errors carry an [`io::ErrorKind`] worth distinguishing;
    /// everything else from the SSH layer is a protocol failure.
    pub(crate) fn from_handshake(host: &str, port: u16, err: russh::Error) -> Self {
        match err {
            russh::Error::IO(io_err) => Self::from_handshake_io(host, port, io_err),
            other => Error::Protocol(other.to_string()),
        }
    }

    fn from_handshake_io(host: &str, port: u16, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Error::ConnectionRefused {
                host: host.to_string(),
                port,
            },
            io::ErrorKind::TimedOut
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable => Error::HostUnreachable {
                host: host.to_string(),
                port,
            },
            _ => Error::Protocol(err.to_string()),
        }
    }

    /// Wrap a local filesystem failure with the path it concerns.
    pub(crate) fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod handshake_classification {
        use super::*;

        #[test]
        fn test_connection_refused_maps_to_refused() {
            let io_err = io::Error::from(io::ErrorKind::ConnectionRefused);
            let err = Error::from_handshake("db1", 22, russh::Error::IO(io_err));
            assert!(matches!(
                err,
                Error::ConnectionRefused { ref host, port: 22 } if host == "db1"
            ));
        }

        #[test]
        fn test_timed_out_maps_to_unreachable() {
            let io_err = io::Error::from(io::ErrorKind::TimedOut);
            let err = Error::from_handshake("db1", 2222, russh::Error::IO(io_err));
            assert!(matches!(
                err,
                Error::HostUnreachable { ref host, port: 2222 } if host == "db1"
            ));
        }

        #[test]
        fn test_host_unreachable_maps_to_unreachable() {
            let io_err = io::Error::from(io::ErrorKind::HostUnreachable);
            let err = Error::from_handshake("10.0.0.9", 22, russh::Error::IO(io_err));
            assert!(matches!(err, Error::HostUnreachable { .. }));
        }

        #[test]
        fn test_other_io_error_is_protocol() {
            let io_err = io::Error::from(io::ErrorKind::BrokenPipe);
            let err = Error::from_handshake("db1", 22, russh::Error::IO(io_err));
            assert!(matches!(err, Error::Protocol(_)));
        }

        #[test]
        fn test_non_io_ssh_error_is_protocol() {
            let err = Error::from_handshake("db1", 22, russh::Error::NotAuthenticated);
            assert!(matches!(err, Error::Protocol(_)));
        }
    }

    mod display {
        use super::*;

        #[test]
        fn test_unknown_connection_names_the_connection() {
            let err = Error::UnknownConnection("staging-web".to_string());
            assert_eq!(err.to_string(), "unknown connection 'staging-web'");
        }

        #[test]
        fn test_timeout_reports_budget() {
            let err = Error::OperationTimedOut { timeout_ms: 30_000 };
            assert_eq!(err.to_string(), "operation timed out after 30000 ms");
        }

        #[test]
        fn test_key_not_found_includes_path() {
            let err = Error::KeyNotFound(PathBuf::from("/home/u/.ssh/id_ed25519"));
            assert!(err.to_string().contains("/home/u/.ssh/id_ed25519"));
        }
    }
}
