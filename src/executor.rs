//! One-session-per-operation executor over the connection registry.
//!
//! Every operation follows the same shape: resolve the name (failing with
//! `UnknownConnection` before any network activity), resolve a credential,
//! open one fresh session, perform exactly one action, and tear the session
//! down. A watchdog races the whole connect/act/close sequence; when it
//! fires, the in-flight future is dropped, which drops the transport handle
//! and closes the connection. Resource release is unconditional on every
//! exit path.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::auth::AuthResolver;
use crate::config::{ExecutorConfig, PROBE_TIMEOUT_MS};
use crate::error::{Error, Result};
use crate::record::ConnectionRecord;
use crate::registry::ConnectionRegistry;
use crate::session::Session;
use crate::transfer::SftpChannel;
use crate::types::{CommandOutcome, DirectoryEntry, ProbeReport, TransferOutcome};

/// Executes single-shot operations against named connections.
pub struct SessionExecutor {
    registry: Arc<ConnectionRegistry>,
    resolver: AuthResolver,
    config: ExecutorConfig,
}

impl SessionExecutor {
    /// Executor with environment-resolved settings and the default resolver.
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_parts(registry, AuthResolver::new(), ExecutorConfig::from_env())
    }

    pub fn with_parts(
        registry: Arc<ConnectionRegistry>,
        resolver: AuthResolver,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            config,
        }
    }

    fn lookup(&self, name: &str) -> Result<ConnectionRecord> {
        self.registry
            .get(name)
            .ok_or_else(|| Error::UnknownConnection(name.to_string()))
    }

    /// Resolve a credential and open a fresh session for `record`.
    ///
    /// Credentials are resolved here, per session, never cached.
    async fn open_session(&self, record: &ConnectionRecord, budget: Duration) -> Result<Session> {
        let credential = self.resolver.resolve(record)?;
        Session::open(record, &credential, budget, self.config.compress).await
    }

    /// Race `action` against the watchdog.
    async fn with_deadline<T, F>(&self, budget: Duration, action: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let budget_ms = budget.as_millis() as u64;
        match tokio::time::timeout(budget, action).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = budget_ms, "watchdog fired; transport dropped");
                Err(Error::OperationTimedOut {
                    timeout_ms: budget_ms,
                })
            }
        }
    }

    /// Run one shell command on the named connection.
    ///
    /// `timeout_ms` falls back to the configured default (30 000 ms unless
    /// overridden by environment).
    pub async fn run_command(
        &self,
        name: &str,
        command: &str,
        timeout_ms: Option<u64>,
    ) -> Result<CommandOutcome> {
        let record = self.lookup(name)?;
        let budget = timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.config.command_timeout);
        info!(connection = name, command, "running remote command");

        self.with_deadline(budget, async {
            let mut session = self.open_session(&record, budget).await?;
            let outcome = session.exec(command).await;
            // Teardown happens-after the action, on success and remote error alike.
            session.close().await;
            outcome
        })
        .await
    }

    /// Read a remote file as text.
    pub async fn read_file(&self, name: &str, remote_path: &str) -> Result<String> {
        let record = self.lookup(name)?;
        let budget = self.config.transfer_timeout;

        self.with_deadline(budget, async {
            let mut session = self.open_session(&record, budget).await?;
            let result = async {
                let sftp = SftpChannel::open(&mut session).await?;
                sftp.read_to_string(remote_path).await
            }
            .await;
            session.close().await;
            result
        })
        .await
    }

    /// Enumerate a remote directory.
    pub async fn list_directory(
        &self,
        name: &str,
        remote_path: &str,
    ) -> Result<Vec<DirectoryEntry>> {
        let record = self.lookup(name)?;
        let budget = self.config.transfer_timeout;

        self.with_deadline(budget, async {
            let mut session = self.open_session(&record, budget).await?;
            let result = async {
                let sftp = SftpChannel::open(&mut session).await?;
                sftp.list_dir(remote_path).await
            }
            .await;
            session.close().await;
            result
        })
        .await
    }

    /// Upload one local file to the named connection.
    pub async fn upload_file(
        &self,
        name: &str,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<TransferOutcome> {
        let record = self.lookup(name)?;
        let budget = self.config.transfer_timeout;

        let bytes = self
            .with_deadline(budget, async {
                let mut session = self.open_session(&record, budget).await?;
                let result = async {
                    let sftp = SftpChannel::open(&mut session).await?;
                    sftp.upload(local_path, remote_path).await
                }
                .await;
                session.close().await;
                result
            })
            .await?;

        Ok(TransferOutcome {
            succeeded: true,
            detail_message: format!("uploaded {bytes} bytes to {remote_path}"),
        })
    }

    /// Download one remote file from the named connection.
    pub async fn download_file(
        &self,
        name: &str,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<TransferOutcome> {
        let record = self.lookup(name)?;
        let budget = self.config.transfer_timeout;

        let bytes = self
            .with_deadline(budget, async {
                let mut session = self.open_session(&record, budget).await?;
                let result = async {
                    let sftp = SftpChannel::open(&mut session).await?;
                    sftp.download(remote_path, local_path).await
                }
                .await;
                session.close().await;
                result
            })
            .await?;

        Ok(TransferOutcome {
            succeeded: true,
            detail_message: format!(
                "downloaded {bytes} bytes to {}",
                local_path.display()
            ),
        })
    }

    /// Probe connectivity: connect, authenticate, tear down.
    ///
    /// Diagnostic only: every failure, including the fixed 10 s
    /// budget expiring, is folded into the report instead of propagating.
    pub async fn test_connection(&self, name: &str) -> ProbeReport {
        let budget = Duration::from_millis(PROBE_TIMEOUT_MS);
        let started = Instant::now();

        let attempt = async {
            let record = self.lookup(name)?;
            let session = self.open_session(&record, budget).await?;
            session.close().await;
            Ok::<(), Error>(())
        };

        match tokio::time::timeout(budget, attempt).await {
            Ok(Ok(())) => ProbeReport {
                succeeded: true,
                message: format!("connection '{name}' is reachable"),
                latency_ms: Some(started.elapsed().as_millis() as u64),
            },
            Ok(Err(error)) => ProbeReport {
                succeeded: false,
                message: error.to_string(),
                latency_ms: None,
            },
            Err(_) => ProbeReport {
                succeeded: false,
                message: Error::OperationTimedOut {
                    timeout_ms: PROBE_TIMEOUT_MS,
                }
                .to_string(),
                latency_ms: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn executor_with(records: Vec<ConnectionRecord>) -> SessionExecutor {
        init_tracing();
        let registry = ConnectionRegistry::shared();
        registry.merge(&[records]);
        SessionExecutor::with_parts(
            registry,
            AuthResolver::with_ssh_dir("/nonexistent-ssh-dir"),
            ExecutorConfig::default(),
        )
    }

    fn record_to(name: &str, host: &str, port: u16) -> ConnectionRecord {
        let mut record = ConnectionRecord::new(name, host, "tester");
        record.port = port;
        record.password = Some("irrelevant".to_string());
        record
    }

    /// A listener that accepts connections and then stays silent, so the
    /// SSH version exchange never completes.
    async fn silent_endpoint() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut open_sockets = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    open_sockets.push(socket);
                }
            }
        });
        addr
    }

    /// Bind and immediately drop a listener to find a port that refuses.
    async fn refused_endpoint() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    mod unknown_connection {
        use super::*;

        #[tokio::test]
        async fn test_run_command_fails_before_any_network_activity() {
            let executor = executor_with(Vec::new());
            let started = Instant::now();
            let err = executor
                .run_command("does-not-exist", "uptime", None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::UnknownConnection(ref n) if n == "does-not-exist"));
            // Lookup failure must not wait on any timeout.
            assert!(started.elapsed() < Duration::from_secs(1));
        }

        #[tokio::test]
        async fn test_every_operation_reports_unknown_connection() {
            let executor = executor_with(Vec::new());
            assert!(matches!(
                executor.read_file("ghost", "/etc/hostname").await,
                Err(Error::UnknownConnection(_))
            ));
            assert!(matches!(
                executor.list_directory("ghost", "/tmp").await,
                Err(Error::UnknownConnection(_))
            ));
            assert!(matches!(
                executor.upload_file("ghost", Path::new("/tmp/a"), "/tmp/b").await,
                Err(Error::UnknownConnection(_))
            ));
            assert!(matches!(
                executor.download_file("ghost", "/tmp/a", Path::new("/tmp/b")).await,
                Err(Error::UnknownConnection(_))
            ));
        }
    }

    mod auth_resolution {
        use super::*;

        #[tokio::test]
        async fn test_no_credential_fails_before_connecting() {
            // Record with neither key nor password, and a resolver pointed at
            // an empty SSH dir: resolution fails without touching the network
            // (the host is not routable, so a connection attempt would hang).
            let mut record = ConnectionRecord::new("bare", "192.0.2.1", "tester");
            record.password = None;
            let executor = executor_with(vec![record]);

            let started = Instant::now();
            let err = executor.run_command("bare", "uptime", None).await.unwrap_err();
            assert!(matches!(err, Error::NoAuthenticationAvailable { .. }));
            assert!(started.elapsed() < Duration::from_secs(2));
        }
    }

    mod timeout_bound {
        use super::*;

        #[tokio::test]
        async fn test_run_command_times_out_against_silent_endpoint() {
            let addr = silent_endpoint().await;
            let executor = executor_with(vec![record_to("silent", "127.0.0.1", addr.port())]);

            let started = Instant::now();
            let err = executor
                .run_command("silent", "uptime", Some(500))
                .await
                .unwrap_err();

            assert!(matches!(err, Error::OperationTimedOut { timeout_ms: 500 }));
            // Budget plus a small epsilon, never an indefinite hang.
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }

    mod refused_connection {
        use super::*;

        #[tokio::test]
        async fn test_run_command_reports_connection_refused() {
            let addr = refused_endpoint().await;
            let executor = executor_with(vec![record_to("closed", "127.0.0.1", addr.port())]);

            let err = executor
                .run_command("closed", "uptime", Some(5_000))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ConnectionRefused { port, .. } if port == addr.port()));
        }
    }

    mod probe {
        use super::*;

        #[tokio::test]
        async fn test_probe_unknown_name_reports_failure_without_panicking() {
            let executor = executor_with(Vec::new());
            let report = executor.test_connection("ghost").await;
            assert!(!report.succeeded);
            assert!(report.message.contains("ghost"));
            assert!(report.latency_ms.is_none());
        }

        #[tokio::test]
        async fn test_probe_refused_endpoint_reports_failure() {
            let addr = refused_endpoint().await;
            let executor = executor_with(vec![record_to("closed", "127.0.0.1", addr.port())]);
            let report = executor.test_connection("closed").await;
            assert!(!report.succeeded);
            assert!(report.latency_ms.is_none());
        }
    }
}
