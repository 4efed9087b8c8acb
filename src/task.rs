//! Task and message records persisted through the workspace store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::thinking::TaskResult;

/// Lifecycle state of a task.
///
/// Transitions are monotonic: `Pending -> Active -> Completed`, with no
/// back-transitions. `WorkspaceStore::move_task` is the only sanctioned way
/// to change a task's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Active,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    /// Position in the lifecycle, used to reject back-transitions.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Active => 1,
            Self::Completed => 2,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One submitted problem and its lifecycle record within the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub description: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    /// Set if and only if `status` is `Completed`.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<TaskResult>,
    pub validation_required: bool,
    /// Ordered phase names required to satisfy the task.
    #[serde(default)]
    pub sequential_steps: Vec<String>,
}

impl Task {
    /// Create a new pending task with a generated id.
    pub fn new(description: impl Into<String>, sequential_steps: Vec<String>) -> Self {
        Self {
            task_id: format!("thinking_task_{}", short_uniquifier()),
            description: description.into(),
            assigned_to: None,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
            validation_required: true,
            sequential_steps,
        }
    }
}

/// An immutable, timestamped fact broadcast into the workspace.
///
/// Messages are append-only: once written they are never mutated or deleted
/// by the core. Targets need not resolve to a live agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    pub agent_id: String,
    pub message_type: String,
    /// A specific agent id, or a broadcast marker such as `"swarm"`.
    pub target: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
    #[serde(default)]
    pub correlation_id: Option<String>,
    pub requires_validation: bool,
    #[serde(default)]
    pub thinking_stage: Option<String>,
}

impl AgentMessage {
    /// Build a broadcast message from `agent_id` to `target`.
    pub fn broadcast(
        agent_id: impl Into<String>,
        message_type: impl Into<String>,
        target: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            message_type: message_type.into(),
            target: target.into(),
            timestamp: Utc::now(),
            payload,
            correlation_id: None,
            requires_validation: true,
            thinking_stage: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Short random uniquifier used in task and agent identifiers.
pub(crate) fn short_uniquifier() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending_without_completion_timestamp() {
        let task = Task::new("sort out the backlog", vec!["phase_1".into()]);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.completed_at.is_none());
        assert!(task.task_id.starts_with("thinking_task_"));
    }

    #[test]
    fn status_round_trips_through_serde() {
        for status in [TaskStatus::Pending, TaskStatus::Active, TaskStatus::Completed] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            let back: TaskStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn unknown_status_is_rejected_by_serde() {
        let err = serde_json::from_str::<TaskStatus>("\"paused\"");
        assert!(err.is_err());
    }

    #[test]
    fn uniquifiers_are_distinct() {
        assert_ne!(short_uniquifier(), short_uniquifier());
    }
}
