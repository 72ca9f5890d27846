//! Named SSH host registry with single-shot remote operations.
//!
//! The crate keeps a merged, name-keyed registry of connection records
//! ([`ConnectionRegistry`]) fed by prioritized sources, and executes remote
//! operations against those names through a [`SessionExecutor`]. Every
//! operation (command execution, file read, directory listing, upload,
//! download, connectivity probe) opens one fresh SSH session, performs its
//! single action, and tears the session down. Sessions are never pooled or
//! reused, and every operation runs under a watchdog that guarantees
//! transport teardown on timeout.
//!
//! # Example
//!
//! ```no_run
//! use ssh_fleet::{ConnectionRecord, ConnectionRegistry, SessionExecutor};
//!
//! # async fn demo() -> ssh_fleet::Result<()> {
//! let registry = ConnectionRegistry::shared();
//! registry.merge(&[vec![ConnectionRecord::new("db1", "10.0.0.5", "admin")]]);
//!
//! let executor = SessionExecutor::new(registry);
//! let outcome = executor.run_command("db1", "uptime", None).await?;
//! println!("{}", outcome.stdout_text());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod executor;
pub mod record;
pub mod registry;
pub mod session;
pub mod source;
mod transfer;
pub mod types;

pub use auth::{AuthResolver, Credential};
pub use config::ExecutorConfig;
pub use error::{Error, Result};
pub use executor::SessionExecutor;
pub use record::{ConnectionRecord, DEFAULT_SSH_PORT, RecordSource};
pub use registry::ConnectionRegistry;
pub use session::{Session, SessionState};
pub use source::{ConnectionSource, EnvSource, StaticSource};
pub use types::{CommandOutcome, DirectoryEntry, EntryKind, ProbeReport, TransferOutcome};
