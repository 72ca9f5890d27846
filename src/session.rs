//! Per-operation SSH session lifecycle.
//!
//! A [`Session`] backs exactly one remote action. It is created by the
//! executor, driven through connect -> authenticate -> act -> close, and
//! destroyed at the end of that call regardless of outcome. Nothing here is
//! pooled or reused; two concurrent operations against the same host open
//! two independent transports.
//!
//! # State machine
//!
//! ```text
//! Idle -> Connecting -> Authenticated -> Busy -> Closing -> Closed
//!            |                            |
//!            +--------> Failed <----------+
//! ```
//!
//! `Failed` still guarantees transport teardown: the executor either calls
//! [`Session::close`] or drops the session, and dropping the russh handle
//! closes the underlying connection.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use russh::{ChannelMsg, Disconnect, client, keys};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::record::ConnectionRecord;
use crate::types::CommandOutcome;

/// Client handler that accepts all host keys.
///
/// Equivalent to `StrictHostKeyChecking=no`; production deployments should
/// extend this with known_hosts verification.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Lifecycle states of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticated,
    Busy,
    Closing,
    Closed,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Authenticated => "authenticated",
            SessionState::Busy => "busy",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        write!(f, "{label}")
    }
}

/// Build the russh client configuration for one session.
///
/// The inactivity timeout mirrors the operation budget so a dead link cannot
/// outlive the watchdog by much; keepalives cover long-running commands.
fn build_client_config(budget: Duration, compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: Some(budget),
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// One ephemeral, single-use authenticated transport.
pub struct Session {
    id: Uuid,
    connection: String,
    state: SessionState,
    handle: client::Handle<SshClientHandler>,
}

impl Session {
    /// Establish and authenticate a fresh transport for `record`.
    ///
    /// Runs Idle -> Connecting -> Authenticated; any failure is terminal for
    /// the would-be session (the handshake handle, if any, is dropped, which
    /// closes the connection).
    pub async fn open(
        record: &ConnectionRecord,
        credential: &Credential,
        budget: Duration,
        compress: bool,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let mut state = transition(id, &record.name, SessionState::Idle, SessionState::Connecting);

        let config = build_client_config(budget, compress);
        let connect = client::connect(
            config,
            (record.host.as_str(), record.port),
            SshClientHandler,
        );
        let mut handle = match connect.await {
            Ok(handle) => handle,
            Err(error) => {
                transition(id, &record.name, state, SessionState::Failed);
                return Err(Error::from_handshake(&record.host, record.port, error));
            }
        };

        if let Err(error) = authenticate(&mut handle, record, credential).await {
            transition(id, &record.name, state, SessionState::Failed);
            return Err(error);
        }
        state = transition(id, &record.name, state, SessionState::Authenticated);

        info!(
            session = %id,
            connection = %record.name,
            host = %record.host,
            port = record.port,
            method = credential.kind(),
            "session established"
        );

        Ok(Self {
            id,
            connection: record.name.clone(),
            state,
            handle,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn handle(&self) -> &client::Handle<SshClientHandler> {
        &self.handle
    }

    pub(crate) fn mark_busy(&mut self) {
        self.state = transition(self.id, &self.connection, self.state, SessionState::Busy);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.state = transition(self.id, &self.connection, self.state, SessionState::Failed);
    }

    /// Execute one command, collecting stdout and stderr independently until
    /// the remote exit notification arrives.
    pub async fn exec(&mut self, command: &str) -> Result<CommandOutcome> {
        self.mark_busy();
        match self.exec_inner(command).await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.mark_failed();
                Err(error)
            }
        }
    }

    async fn exec_inner(&mut self, command: &str) -> Result<CommandOutcome> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::Protocol(format!("failed to open channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::Protocol(format!("failed to execute command: {e}")))?;

        let mut stdout = Vec::with_capacity(4096);
        let mut stderr = Vec::with_capacity(1024);
        let mut exit_code: Option<u32> = None;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext == 1 is stderr in SSH protocol
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                }
                Some(ChannelMsg::Eof) => {
                    // Continue to wait for exit status if not received yet
                    if exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) => {
                    break;
                }
                Some(_) => {
                    // Ignore other message types
                }
                None => {
                    // Channel closed
                    break;
                }
            }
        }

        let _ = channel.close().await;

        Ok(CommandOutcome {
            stdout,
            stderr,
            // No exit notification from the transport counts as success.
            exit_code: exit_code.map(|c| c as i32).unwrap_or(0),
        })
    }

    /// Tear the transport down. Safe from any state, including `Failed`.
    pub async fn close(mut self) {
        self.state = transition(self.id, &self.connection, self.state, SessionState::Closing);
        if let Err(error) = self
            .handle
            .disconnect(Disconnect::ByApplication, "operation complete", "en")
            .await
        {
            // The handle is dropped either way, which closes the connection.
            warn!(session = %self.id, %error, "graceful disconnect failed");
        }
        transition(self.id, &self.connection, self.state, SessionState::Closed);
        info!(session = %self.id, connection = %self.connection, "session closed");
    }
}

fn transition(id: Uuid, connection: &str, from: SessionState, to: SessionState) -> SessionState {
    debug!(session = %id, connection, %from, %to, "session state");
    to
}

/// Present the resolved credential to the remote host.
async fn authenticate(
    handle: &mut client::Handle<SshClientHandler>,
    record: &ConnectionRecord,
    credential: &Credential,
) -> Result<()> {
    let success = match credential {
        Credential::Password(password) => handle
            .authenticate_password(&record.username, password)
            .await
            .map_err(|e| Error::Protocol(format!("password authentication error: {e}")))?
            .success(),
        Credential::PrivateKey(path) => {
            let key_pair = keys::load_secret_key(path, None).map_err(|e| {
                Error::Protocol(format!(
                    "failed to load private key {}: {e}",
                    path.display()
                ))
            })?;

            // For RSA keys, use the best hash algorithm the server supports.
            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();
            debug!(connection = %record.name, ?hash_alg, "publickey authentication");

            let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);
            handle
                .authenticate_publickey(&record.username, key_with_hash)
                .await
                .map_err(|e| Error::Protocol(format!("publickey authentication error: {e}")))?
                .success()
        }
    };

    if !success {
        return Err(Error::AuthenticationRejected {
            username: record.username.clone(),
            host: record.host.clone(),
        });
    }
    Ok(())
}
