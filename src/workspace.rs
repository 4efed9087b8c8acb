//! File-backed coordination hub for the agent swarm.
//!
//! The store is the single source of truth: tasks, messages, thinking logs,
//! per-agent results, and coordination records all live as whole JSON files
//! under fixed subdivisions of one base directory. In-memory components hold
//! only transient caches and must treat the store as authoritative after a
//! restart.
//!
//! Records that are rewritten in place (tasks, thinking logs) go through a
//! temp-file + rename so a crash mid-write never leaves a torn record.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{Result, SwarmError};
use crate::task::{AgentMessage, Task, TaskStatus};
use crate::thinking::ThinkingLogEntry;

const SUBDIVISIONS: [&str; 8] = [
    "agents",
    "tasks/pending",
    "tasks/active",
    "tasks/completed",
    "results",
    "messages",
    "coordination",
    "thinking_sessions",
];

/// Durable, crash-tolerant storage rooted at one base directory.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    base_dir: PathBuf,
}

impl WorkspaceStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Idempotently ensure every storage subdivision exists. Never destroys
    /// existing data; safe to call repeatedly.
    pub async fn initialize(&self) -> Result<()> {
        for subdir in SUBDIVISIONS {
            let path = self.base_dir.join(subdir);
            fs::create_dir_all(&path)
                .await
                .map_err(|e| SwarmError::persistence(&path, e))?;
        }
        debug!(base_dir = %self.base_dir.display(), "workspace initialized");
        Ok(())
    }

    // ── Messages ──────────────────────────────────────────────────

    /// Persist a message under a name derived from its agent id and write
    /// time. A name collision is resolved with a uniquifying suffix rather
    /// than a silent overwrite. Returns the path written.
    pub async fn write_message(&self, message: &AgentMessage) -> Result<PathBuf> {
        let messages_dir = self.base_dir.join("messages");
        let base_name = format!(
            "{}_{}",
            message.agent_id,
            message.timestamp.timestamp_millis()
        );

        let mut path = messages_dir.join(format!("{base_name}.json"));
        let mut attempt = 0u32;
        while path_exists(&path).await {
            attempt += 1;
            path = messages_dir.join(format!("{base_name}-{attempt}.json"));
        }

        self.write_json(&path, message).await?;
        Ok(path)
    }

    // ── Tasks ─────────────────────────────────────────────────────

    /// Persist a task under its current status subdivision, keyed by id.
    pub async fn write_task(&self, task: &Task) -> Result<()> {
        let path = self.task_path(task.status, &task.task_id);
        self.write_json(&path, task).await
    }

    /// All tasks currently pending, order unspecified. Malformed records are
    /// skipped with a warning, not fatal to the listing.
    pub async fn list_pending_tasks(&self) -> Result<Vec<Task>> {
        self.read_all_json(&self.base_dir.join("tasks/pending"))
            .await
    }

    /// Relocate a task's record to a new status subdivision. This is the only
    /// sanctioned way to change a task's status.
    ///
    /// A record already absent from the source subdivision is tolerated (the
    /// move still succeeds and the record ends up only at the destination).
    /// Back-transitions are rejected with `InvalidState`; the completion
    /// timestamp is set exactly when the task moves to `Completed`.
    pub async fn move_task(&self, task: &mut Task, new_status: TaskStatus) -> Result<()> {
        if new_status.rank() <= task.status.rank() {
            return Err(SwarmError::InvalidState {
                from: task.status,
                to: new_status,
            });
        }

        let current = self.task_path(task.status, &task.task_id);
        match fs::remove_file(&current).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(SwarmError::persistence(&current, e)),
        }

        task.status = new_status;
        if new_status == TaskStatus::Completed {
            task.completed_at = Some(Utc::now());
        }
        self.write_task(task).await
    }

    fn task_path(&self, status: TaskStatus, task_id: &str) -> PathBuf {
        self.base_dir
            .join("tasks")
            .join(status.as_str())
            .join(format!("{task_id}.json"))
    }

    // ── Thinking logs ─────────────────────────────────────────────

    /// Persist a thinking-log entry. One file per (agent, stage) pair:
    /// writing the same stage again overwrites.
    pub async fn write_thinking_log(&self, entry: &ThinkingLogEntry) -> Result<()> {
        let path = self
            .base_dir
            .join("thinking_sessions")
            .join(format!("{}_{}.json", entry.agent_id, entry.stage));
        self.write_json(&path, entry).await
    }

    /// Every persisted stage entry for `agent_id`, order unspecified.
    pub async fn list_thinking_logs(&self, agent_id: &str) -> Result<Vec<ThinkingLogEntry>> {
        let dir = self.base_dir.join("thinking_sessions");
        let prefix = format!("{agent_id}_");
        let mut entries = Vec::new();

        let mut read_dir = fs::read_dir(&dir)
            .await
            .map_err(|e| SwarmError::persistence(&dir, e))?;
        while let Some(dirent) = read_dir
            .next_entry()
            .await
            .map_err(|e| SwarmError::persistence(&dir, e))?
        {
            let name = dirent.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            match self.read_json::<ThinkingLogEntry>(&dirent.path()).await {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    path = %dirent.path().display(),
                    error = %e,
                    "skipping malformed thinking-log entry"
                ),
            }
        }
        Ok(entries)
    }

    /// Number of thinking-session records across all agents.
    pub async fn thinking_session_count(&self) -> usize {
        let dir = self.base_dir.join("thinking_sessions");
        let mut count = 0;
        let Ok(mut read_dir) = fs::read_dir(&dir).await else {
            return 0;
        };
        while let Ok(Some(dirent)) = read_dir.next_entry().await {
            if dirent.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        count
    }

    // ── Results & coordination ────────────────────────────────────

    /// The externally-produced result record for an agent, if one exists.
    /// A malformed record is reported and treated as absent.
    pub async fn read_result(&self, agent_id: &str) -> Option<Value> {
        let path = self
            .base_dir
            .join("results")
            .join(format!("{agent_id}_result.json"));
        match self.read_json::<Value>(&path).await {
            Ok(value) => Some(value),
            Err(SwarmError::Persistence { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                None
            }
            Err(e) => {
                warn!(agent = %agent_id, error = %e, "skipping unreadable result record");
                None
            }
        }
    }

    /// Record an agent activity in the coordination area, keyed by agent id.
    pub async fn log_activity(
        &self,
        agent_id: &str,
        role: &str,
        activity: &str,
        details: Value,
    ) -> Result<()> {
        let path = self
            .base_dir
            .join("coordination")
            .join(format!("agent_activity_{agent_id}.json"));
        let record = json!({
            "agent_id": agent_id,
            "agent_type": role,
            "timestamp": Utc::now(),
            "activity": activity,
            "details": details,
        });
        self.write_json(&path, &record).await
    }

    // ── JSON helpers ──────────────────────────────────────────────

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| SwarmError::serialization(path, e))?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, data)
            .await
            .map_err(|e| SwarmError::persistence(&tmp_path, e))?;
        fs::rename(&tmp_path, path)
            .await
            .map_err(|e| SwarmError::persistence(path, e))?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| SwarmError::persistence(path, e))?;
        serde_json::from_slice(&bytes).map_err(|e| SwarmError::serialization(path, e))
    }

    async fn read_all_json<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut records = Vec::new();
        let mut read_dir = fs::read_dir(dir)
            .await
            .map_err(|e| SwarmError::persistence(dir, e))?;
        while let Some(dirent) = read_dir
            .next_entry()
            .await
            .map_err(|e| SwarmError::persistence(dir, e))?
        {
            let path = dirent.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match self.read_json::<T>(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed record"),
            }
        }
        Ok(records)
    }
}

async fn path_exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thinking::{SequentialAnalysis, STAGE_SEQUENTIAL, STAGE_ULTRATHINK};
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn store() -> (tempfile::TempDir, WorkspaceStore) {
        let dir = tempdir().unwrap();
        let store = WorkspaceStore::new(dir.path());
        store.initialize().await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn initialize_is_idempotent_and_preserves_data() {
        let (_dir, store) = store().await;
        let task = Task::new("keep me", vec![]);
        store.write_task(&task).await.unwrap();

        store.initialize().await.unwrap();

        let pending = store.list_pending_tasks().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].task_id, task.task_id);
    }

    #[tokio::test]
    async fn move_task_relocates_record_and_stamps_completion() {
        let (dir, store) = store().await;
        let mut task = Task::new("lifecycle", vec![]);
        store.write_task(&task).await.unwrap();

        store.move_task(&mut task, TaskStatus::Active).await.unwrap();
        assert_eq!(task.status, TaskStatus::Active);
        assert!(task.completed_at.is_none());
        assert!(!dir
            .path()
            .join("tasks/pending")
            .join(format!("{}.json", task.task_id))
            .exists());
        assert!(dir
            .path()
            .join("tasks/active")
            .join(format!("{}.json", task.task_id))
            .exists());

        store
            .move_task(&mut task, TaskStatus::Completed)
            .await
            .unwrap();
        assert!(task.completed_at.is_some());
        assert!(!dir
            .path()
            .join("tasks/active")
            .join(format!("{}.json", task.task_id))
            .exists());
        let on_disk: Task = serde_json::from_slice(
            &std::fs::read(
                dir.path()
                    .join("tasks/completed")
                    .join(format!("{}.json", task.task_id)),
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk.status, TaskStatus::Completed);
        assert!(on_disk.completed_at.is_some());
    }

    #[tokio::test]
    async fn move_task_tolerates_missing_source_record() {
        let (dir, store) = store().await;
        // Never written to pending; the source record does not exist.
        let mut task = Task::new("ghost", vec![]);

        store.move_task(&mut task, TaskStatus::Active).await.unwrap();

        assert!(dir
            .path()
            .join("tasks/active")
            .join(format!("{}.json", task.task_id))
            .exists());
    }

    #[tokio::test]
    async fn move_task_rejects_back_transitions() {
        let (_dir, store) = store().await;
        let mut task = Task::new("monotonic", vec![]);
        store.write_task(&task).await.unwrap();
        store
            .move_task(&mut task, TaskStatus::Completed)
            .await
            .unwrap();

        let err = store.move_task(&mut task, TaskStatus::Active).await;
        assert!(matches!(err, Err(SwarmError::InvalidState { .. })));
        // The failed call must not have coerced anything.
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn message_name_collision_gets_uniquifying_suffix() {
        let (_dir, store) = store().await;
        let timestamp = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut message =
            AgentMessage::broadcast("analyst_1", "agent_initialized", "swarm", json!({}));
        message.timestamp = timestamp;

        let first = store.write_message(&message).await.unwrap();
        let second = store.write_message(&message).await.unwrap();

        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
        assert!(second
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .ends_with("-1.json"));
    }

    #[tokio::test]
    async fn thinking_log_overwrites_per_stage_and_skips_malformed() {
        let (dir, store) = store().await;
        let content = serde_json::to_value(SequentialAnalysis::scaffold("p")).unwrap();

        let entry = ThinkingLogEntry::new("explorer_1", STAGE_SEQUENTIAL, content.clone());
        store.write_thinking_log(&entry).await.unwrap();
        // Same (agent, stage) again: overwrite, not append.
        store.write_thinking_log(&entry).await.unwrap();
        let other = ThinkingLogEntry::new("explorer_1", STAGE_ULTRATHINK, json!({}));
        store.write_thinking_log(&other).await.unwrap();

        std::fs::write(
            dir.path().join("thinking_sessions/explorer_1_broken.json"),
            b"{not json",
        )
        .unwrap();

        let logs = store.list_thinking_logs("explorer_1").await.unwrap();
        assert_eq!(logs.len(), 2);
        let mut stages: Vec<_> = logs.iter().map(|l| l.stage.as_str()).collect();
        stages.sort_unstable();
        assert_eq!(stages, vec![STAGE_SEQUENTIAL, STAGE_ULTRATHINK]);
    }

    #[tokio::test]
    async fn thinking_logs_do_not_leak_across_agents() {
        let (_dir, store) = store().await;
        let a = ThinkingLogEntry::new("analyst_1", STAGE_SEQUENTIAL, json!({}));
        let b = ThinkingLogEntry::new("validator_1", STAGE_SEQUENTIAL, json!({}));
        store.write_thinking_log(&a).await.unwrap();
        store.write_thinking_log(&b).await.unwrap();

        let logs = store.list_thinking_logs("analyst_1").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].agent_id, "analyst_1");
    }

    #[tokio::test]
    async fn read_result_distinguishes_absent_from_present() {
        let (dir, store) = store().await;
        assert!(store.read_result("analyst_1").await.is_none());

        std::fs::write(
            dir.path().join("results/analyst_1_result.json"),
            serde_json::to_vec(&json!({"verdict": "done"})).unwrap(),
        )
        .unwrap();
        let value = store.read_result("analyst_1").await.unwrap();
        assert_eq!(value["verdict"], "done");
    }
}
