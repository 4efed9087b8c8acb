//! Crate-wide error taxonomy.
//!
//! Timeouts and missing-synthesizer conditions are deliberately *not* errors:
//! they are reported as data (`AgentStatus::Running`,
//! `FinalSynthesis::Unavailable`) because both are legitimate degraded
//! outcomes the caller decides how to handle.

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskStatus;

#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Unknown agent role: {0}")]
    UnknownRole(String),

    #[error("Failed to launch {role} agent: {source}")]
    LaunchFailure {
        role: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Workspace persistence failed at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid task state transition: {from} -> {to}")]
    InvalidState { from: TaskStatus, to: TaskStatus },
}

impl SwarmError {
    /// Wrap an I/O failure that occurred while reading or writing `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Wrap a serialization failure as a persistence error for `path`.
    pub fn serialization(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, source),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwarmError>;
