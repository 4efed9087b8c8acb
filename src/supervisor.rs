//! Launch, monitor, and terminate external agent processes.
//!
//! One OS process backs each launched agent. The supervisor owns the live
//! handle table (a single-writer map, never ambient global state), polls
//! liveness at a fixed interval bounded by an explicit timeout, and reclaims
//! processes during cleanup with a graceful-then-forceful escalation.
//!
//! Per-process state machine:
//! `launched -> running -> {exited_normally | exited_forcefully | exited_on_timeout}`.
//! "Still running" at the end of a monitoring window is an observable status,
//! not a terminal state; only an explicit `cleanup` makes it terminal.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SwarmError};
use crate::registry::{AgentRegistry, Role, RoleConfig};
use crate::task::short_uniquifier;
use crate::thinking::ThinkingLogEntry;
use crate::workspace::WorkspaceStore;

/// Supervisor-owned record of one running agent process.
#[derive(Debug)]
pub struct AgentRuntimeHandle {
    pub agent_id: String,
    pub role: Role,
    child: Child,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub task: String,
}

/// Observable liveness of one tracked agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Exited { code: Option<i32> },
    /// The id was never launched by this supervisor (or already cleaned up).
    Untracked,
}

impl AgentStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// How a process reached a terminal state during cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    AlreadyExited,
    Graceful,
    Forced,
    NotTracked,
}

/// Outcome of one monitoring window.
#[derive(Debug, Serialize)]
pub struct MonitorReport {
    pub statuses: HashMap<String, AgentStatus>,
    /// Externally-produced result records, merged at most once per agent.
    pub results: HashMap<String, Value>,
    pub thinking_sessions: HashMap<String, Vec<ThinkingLogEntry>>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl MonitorReport {
    /// True when no tracked agent was still running at the end of the window.
    pub fn all_exited(&self) -> bool {
        self.statuses.values().all(|s| !s.is_running())
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Launches and supervises one external process per agent instance.
pub struct ProcessSupervisor {
    config: Config,
    registry: AgentRegistry,
    store: Arc<WorkspaceStore>,
    handles: Mutex<HashMap<String, AgentRuntimeHandle>>,
}

impl ProcessSupervisor {
    pub fn new(config: Config, registry: AgentRegistry, store: Arc<WorkspaceStore>) -> Self {
        Self {
            config,
            registry,
            store,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Role catalog view for the CLI surface.
    pub fn capabilities(&self) -> HashMap<String, RoleConfig> {
        self.registry
            .iter()
            .map(|(role, config)| (role.as_str().to_string(), config.clone()))
            .collect()
    }

    /// Launch one agent process for `role`.
    ///
    /// Fails with `LaunchFailure` when the external executable cannot be
    /// started; the failure is surfaced, never retried here.
    pub async fn launch(&self, role: Role, task_description: &str) -> Result<String> {
        let role_config = self.registry.describe(role)?;
        let agent_id = format!("{}_{}", role.as_str(), short_uniquifier());
        let prompt = build_prompt(
            role,
            role_config,
            task_description,
            &agent_id,
            &self.store,
        );

        let mut cmd = Command::new(&self.config.agent_cli_path);
        cmd.current_dir(self.store.base_dir())
            .arg("-p")
            .arg(&prompt)
            .env("AGENT_ID", &agent_id)
            .env("AGENT_ROLE", role.as_str())
            .env("SWARM_WORKSPACE", self.store.base_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| SwarmError::LaunchFailure {
            role: role.as_str().to_string(),
            source: e,
        })?;

        // Streams are captured for diagnostics only, never parsed for
        // control decisions.
        if let Some(stdout) = child.stdout.take() {
            drain_stream(agent_id.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_stream(agent_id.clone(), "stderr", stderr);
        }

        let handle = AgentRuntimeHandle {
            agent_id: agent_id.clone(),
            role,
            child,
            started_at: chrono::Utc::now(),
            task: task_description.to_string(),
        };
        self.handles.lock().await.insert(agent_id.clone(), handle);

        if let Err(e) = self
            .store
            .log_activity(
                &agent_id,
                role.as_str(),
                "launched",
                json!({ "task": task_description }),
            )
            .await
        {
            warn!(agent = %agent_id, error = %e, "failed to record launch activity");
        }

        info!(agent = %agent_id, role = %role, "agent process launched");
        Ok(agent_id)
    }

    /// Launch a complete swarm for `task_description`: the coordinator first,
    /// then the remaining roles, staggered to avoid a thundering start.
    pub async fn launch_swarm(
        &self,
        task_description: &str,
        roles: &[Role],
    ) -> Result<Vec<String>> {
        let mut launched = Vec::new();
        let mut ordered: Vec<Role> = Vec::new();
        if roles.contains(&Role::Coordinator) {
            ordered.push(Role::Coordinator);
        }
        ordered.extend(roles.iter().copied().filter(|r| *r != Role::Coordinator));

        for (i, role) in ordered.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.launch_stagger).await;
            }
            launched.push(self.launch(role, task_description).await?);
        }
        Ok(launched)
    }

    /// Poll the given agents until all have exited or `timeout` elapses.
    ///
    /// Reaching the timeout with agents still running is a defined
    /// degraded-success outcome, reported through `statuses`, never an error.
    /// Each agent's result record is read and merged at most once per call.
    pub async fn monitor(&self, agent_ids: &[String], timeout: Duration) -> MonitorReport {
        let start = Instant::now();
        let mut statuses = HashMap::new();
        let mut results: HashMap<String, Value> = HashMap::new();

        loop {
            let mut all_exited = true;
            {
                let mut handles = self.handles.lock().await;
                for agent_id in agent_ids {
                    let status = match handles.get_mut(agent_id) {
                        Some(handle) => match handle.child.try_wait() {
                            Ok(Some(exit)) => AgentStatus::Exited { code: exit.code() },
                            Ok(None) => AgentStatus::Running,
                            Err(e) => {
                                warn!(agent = %agent_id, error = %e, "liveness check failed");
                                AgentStatus::Exited { code: None }
                            }
                        },
                        None => AgentStatus::Untracked,
                    };
                    if status.is_running() {
                        all_exited = false;
                    }
                    statuses.insert(agent_id.clone(), status);
                }
            }

            for agent_id in agent_ids {
                if !results.contains_key(agent_id) {
                    if let Some(value) = self.store.read_result(agent_id).await {
                        results.insert(agent_id.clone(), value);
                    }
                }
            }

            let elapsed = start.elapsed();
            if all_exited || elapsed >= timeout {
                break;
            }
            let remaining = timeout - elapsed;
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }

        let mut thinking_sessions = HashMap::new();
        for agent_id in agent_ids {
            let sessions = match self.store.list_thinking_logs(agent_id).await {
                Ok(sessions) => sessions,
                Err(e) => {
                    warn!(agent = %agent_id, error = %e, "failed to collect thinking sessions");
                    Vec::new()
                }
            };
            thinking_sessions.insert(agent_id.clone(), sessions);
        }

        let report = MonitorReport {
            statuses,
            results,
            thinking_sessions,
            elapsed: start.elapsed(),
        };
        if !report.all_exited() {
            info!(
                elapsed_secs = report.elapsed.as_secs_f64(),
                "monitoring window elapsed with agents still running"
            );
        }
        report
    }

    /// Terminate the given agents and forget their handles.
    ///
    /// Idempotent: unknown ids and repeated calls are no-ops. For each live
    /// process, a graceful termination signal is followed by a bounded grace
    /// period before a forceful kill; the handle is removed unconditionally.
    pub async fn cleanup(&self, agent_ids: &[String]) -> HashMap<String, Termination> {
        let mut removed = Vec::new();
        {
            let mut handles = self.handles.lock().await;
            for agent_id in agent_ids {
                match handles.remove(agent_id) {
                    Some(handle) => removed.push(handle),
                    None => {
                        debug!(agent = %agent_id, "cleanup for untracked agent is a no-op");
                    }
                }
            }
        }

        let mut outcomes: HashMap<String, Termination> = agent_ids
            .iter()
            .map(|id| (id.clone(), Termination::NotTracked))
            .collect();

        for mut handle in removed {
            let outcome = terminate(&mut handle.child, self.config.grace_period).await;
            info!(agent = %handle.agent_id, ?outcome, "agent process cleaned up");
            if let Err(e) = self
                .store
                .log_activity(
                    &handle.agent_id,
                    handle.role.as_str(),
                    "cleaned_up",
                    json!({ "termination": outcome }),
                )
                .await
            {
                warn!(agent = %handle.agent_id, error = %e, "failed to record cleanup activity");
            }
            outcomes.insert(handle.agent_id.clone(), outcome);
        }
        outcomes
    }

    /// Ids of all currently tracked agents.
    pub async fn tracked_agents(&self) -> Vec<String> {
        self.handles.lock().await.keys().cloned().collect()
    }
}

async fn terminate(child: &mut Child, grace_period: Duration) -> Termination {
    match child.try_wait() {
        Ok(Some(_)) => return Termination::AlreadyExited,
        Ok(None) => {}
        Err(e) => warn!(error = %e, "could not check process state before termination"),
    }

    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: pid comes from a child we own and have not yet reaped.
        unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        match tokio::time::timeout(grace_period, child.wait()).await {
            Ok(Ok(_)) => return Termination::Graceful,
            Ok(Err(e)) => warn!(error = %e, "failed to wait after SIGTERM"),
            Err(_) => debug!("grace period elapsed, escalating to kill"),
        }
    }

    #[cfg(not(unix))]
    let _ = grace_period;

    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill agent process");
    }
    Termination::Forced
}

fn drain_stream<R>(agent_id: String, stream_name: &'static str, stream: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(agent = %agent_id, stream = stream_name, "{}", line);
        }
    });
}

fn build_prompt(
    role: Role,
    config: &RoleConfig,
    task_description: &str,
    agent_id: &str,
    store: &WorkspaceStore,
) -> String {
    let workspace = store.base_dir().display();
    format!(
        "You are the {role} agent in a sequential thinking swarm.\n\n\
         {description}\n\n\
         Current task: {task_description}\n\n\
         Workspace directory: {workspace}\n\
         Agent ID: {agent_id}\n\n\
         Use the file system in the workspace to:\n\
         - Read tasks from {workspace}/tasks/\n\
         - Write your result to {workspace}/results/{agent_id}_result.json\n\
         - Communicate with other agents via {workspace}/messages/\n\
         - Log your thinking process to {workspace}/thinking_sessions/",
        description = config.description,
    )
}
