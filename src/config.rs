//! Operation timeout and transport settings.
//!
//! Values are resolved with a three-tier priority scheme:
//!
//! 1. **Parameter** - Explicitly provided function parameter (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_FLEET_COMMAND_TIMEOUT_MS` | 30000 | Command execution budget in milliseconds |
//! | `SSH_FLEET_TRANSFER_TIMEOUT_MS` | 120000 | File operation budget in milliseconds |
//! | `SSH_FLEET_COMPRESSION` | true | Enable zlib compression |
//!
//! The connectivity probe budget is deliberately not configurable: the probe
//! exists to give a fast, comparable answer.

use std::env;
use std::time::Duration;

/// Default budget for a single remote command, in milliseconds.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

/// Default budget for a single file operation (read, list, upload, download).
pub const DEFAULT_TRANSFER_TIMEOUT_MS: u64 = 120_000;

/// Fixed budget for the connectivity probe.
pub const PROBE_TIMEOUT_MS: u64 = 10_000;

/// Environment variable name for the command execution budget.
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_FLEET_COMMAND_TIMEOUT_MS";

/// Environment variable name for the file operation budget.
pub(crate) const TRANSFER_TIMEOUT_ENV_VAR: &str = "SSH_FLEET_TRANSFER_TIMEOUT_MS";

/// Environment variable name for transport compression.
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_FLEET_COMPRESSION";

/// Resolve the command budget with priority: parameter -> env var -> default.
pub(crate) fn resolve_command_timeout_ms(timeout_param: Option<u64>) -> u64 {
    if let Some(timeout) = timeout_param {
        return timeout;
    }

    if let Ok(env_timeout) = env::var(COMMAND_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return timeout;
    }

    DEFAULT_COMMAND_TIMEOUT_MS
}

/// Resolve the file operation budget with priority: parameter -> env var -> default.
pub(crate) fn resolve_transfer_timeout_ms(timeout_param: Option<u64>) -> u64 {
    if let Some(timeout) = timeout_param {
        return timeout;
    }

    if let Ok(env_timeout) = env::var(TRANSFER_TIMEOUT_ENV_VAR)
        && let Ok(timeout) = env_timeout.parse::<u64>()
    {
        return timeout;
    }

    DEFAULT_TRANSFER_TIMEOUT_MS
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true).
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolved per-executor settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default budget for `run_command` when the caller passes no timeout.
    pub command_timeout: Duration,
    /// Budget applied to every file operation.
    pub transfer_timeout: Duration,
    /// Whether to negotiate zlib compression on the transport.
    pub compress: bool,
}

impl ExecutorConfig {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            command_timeout: Duration::from_millis(resolve_command_timeout_ms(None)),
            transfer_timeout: Duration::from_millis(resolve_transfer_timeout_ms(None)),
            compress: resolve_compression(None),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
            transfer_timeout: Duration::from_millis(DEFAULT_TRANSFER_TIMEOUT_MS),
            compress: true,
        }
    }
}
