//! Configuration management for the swarm.
//!
//! Configuration can be set via environment variables:
//! - `SWARM_WORKSPACE` - Optional. Workspace base directory. Defaults to
//!   `swarm_workspace` under the system temp directory.
//! - `AGENT_CLI_PATH` - Optional. External agent executable. Defaults to `claude`.
//! - `SWARM_POLL_INTERVAL_SECS` - Optional. Liveness poll interval. Defaults to `5`.
//! - `SWARM_MONITOR_TIMEOUT_SECS` - Optional. Default monitoring window. Defaults to `300`.
//! - `SWARM_GRACE_PERIOD_SECS` - Optional. Grace period between SIGTERM and kill. Defaults to `10`.
//! - `SWARM_LAUNCH_STAGGER_MS` - Optional. Delay between swarm launches. Defaults to `1000`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Swarm configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace base directory for all durable records
    pub workspace_root: PathBuf,

    /// External agent executable (opaque; accepts a prompt and an identity)
    pub agent_cli_path: String,

    /// Sleep between liveness checks in the monitor loop
    pub poll_interval: Duration,

    /// Default monitoring window when the caller does not pass one
    pub monitor_timeout: Duration,

    /// How long cleanup waits after a graceful termination signal before
    /// escalating to a forceful kill
    pub grace_period: Duration,

    /// Stagger between process launches when starting a whole swarm
    pub launch_stagger: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let workspace_root = std::env::var("SWARM_WORKSPACE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("swarm_workspace"));

        let agent_cli_path =
            std::env::var("AGENT_CLI_PATH").unwrap_or_else(|_| "claude".to_string());

        Ok(Self {
            workspace_root,
            agent_cli_path,
            poll_interval: env_secs("SWARM_POLL_INTERVAL_SECS", 5)?,
            monitor_timeout: env_secs("SWARM_MONITOR_TIMEOUT_SECS", 300)?,
            grace_period: env_secs("SWARM_GRACE_PERIOD_SECS", 10)?,
            launch_stagger: env_millis("SWARM_LAUNCH_STAGGER_MS", 1000)?,
        })
    }

    /// Create a config rooted at an explicit workspace (useful for testing).
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            agent_cli_path: "claude".to_string(),
            poll_interval: Duration::from_secs(5),
            monitor_timeout: Duration::from_secs(300),
            grace_period: Duration::from_secs(10),
            launch_stagger: Duration::from_millis(1000),
        }
    }
}

fn env_secs(name: &str, default: u64) -> Result<Duration, ConfigError> {
    env_u64(name, default).map(Duration::from_secs)
}

fn env_millis(name: &str, default: u64) -> Result<Duration, ConfigError> {
    env_u64(name, default).map(Duration::from_millis)
}

fn env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{e}"))),
        Err(_) => Ok(default),
    }
}
