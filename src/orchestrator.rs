//! Top-level sequencing for the thinking swarm.
//!
//! The orchestrator owns the in-process agent set and is the sole mutator of
//! any task's status. It drives the phase protocol: every phase-1 result is
//! collected before any agent starts phase 2 (a hard barrier, since phase-2
//! peer input is defined only against completed phase-1 output), and each
//! agent's phase-2 input excludes its own phase-1 output.

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::ThinkingAgent;
use crate::error::Result;
use crate::registry::{AgentRegistry, Role};
use crate::task::{AgentMessage, Task, TaskStatus};
use crate::thinking::{
    ConsensusSummary, FinalSynthesis, SequentialAnalysis, TaskResult, UltrathinkReport,
    UnpersistedStage, STAGE_SEQUENTIAL, STAGE_ULTRATHINK,
};
use crate::workspace::WorkspaceStore;

/// The three mandatory phases of every thinking task.
const MANDATORY_PHASES: [&str; 3] = [
    "phase_1_system_mapping",
    "phase_2_evidence_verification",
    "phase_3_minimal_intervention",
];

/// Collaborative phases appended when ultrathink is required.
const ULTRATHINK_PHASES: [&str; 4] = [
    "collaborative_perspective_gathering",
    "assumption_challenging",
    "solution_space_exploration",
    "insight_synthesis",
];

/// Summary of one initialized agent instance.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub specialty: String,
    pub description: String,
    pub status: String,
}

/// Result of `initialize_swarm`.
#[derive(Debug, Serialize)]
pub struct SwarmInit {
    pub status: String,
    pub agents: HashMap<String, AgentSummary>,
    pub workspace: PathBuf,
}

/// Read-only snapshot of the swarm.
#[derive(Debug, Serialize)]
pub struct SwarmStatus {
    pub agents: HashMap<String, AgentSummary>,
    pub active_tasks: usize,
    pub workspace: PathBuf,
    pub thinking_sessions: usize,
}

/// Coordinates the agent set and the two-phase execution protocol.
pub struct SwarmOrchestrator {
    registry: AgentRegistry,
    store: Arc<WorkspaceStore>,
    agents: HashMap<String, ThinkingAgent>,
    active_tasks: HashMap<String, Task>,
}

impl SwarmOrchestrator {
    pub fn new(registry: AgentRegistry, store: Arc<WorkspaceStore>) -> Self {
        Self {
            registry,
            store,
            agents: HashMap::new(),
            active_tasks: HashMap::new(),
        }
    }

    /// Instantiate one thinking engine per registered role and announce each.
    ///
    /// Calling this twice replaces the in-memory agent set; the previous
    /// instances are abandoned (tearing down any backing processes is the
    /// supervisor cleanup's job, not this operation's).
    pub async fn initialize_swarm(&mut self) -> Result<SwarmInit> {
        self.agents.clear();
        let mut summaries = HashMap::new();

        for (role, config) in self.registry.iter() {
            let agent = ThinkingAgent::new(role, Arc::clone(&self.store));
            let agent_id = agent.agent_id.clone();

            let message = AgentMessage::broadcast(
                &agent_id,
                "agent_initialized",
                "swarm",
                json!({
                    "specialty": role.as_str(),
                    "capabilities": config.description,
                }),
            );
            self.store.write_message(&message).await?;

            summaries.insert(
                agent_id.clone(),
                AgentSummary {
                    specialty: role.as_str().to_string(),
                    description: config.description.clone(),
                    status: "ready".to_string(),
                },
            );
            self.agents.insert(agent_id, agent);
        }

        info!(agents = self.agents.len(), "swarm initialized");
        Ok(SwarmInit {
            status: "swarm_initialized".to_string(),
            agents: summaries,
            workspace: self.store.base_dir().to_path_buf(),
        })
    }

    /// Create a new thinking task and announce it to the swarm.
    pub async fn create_thinking_task(
        &mut self,
        description: &str,
        require_ultrathink: bool,
    ) -> Result<String> {
        let mut steps: Vec<String> = MANDATORY_PHASES.iter().map(|s| s.to_string()).collect();
        if require_ultrathink {
            steps.extend(ULTRATHINK_PHASES.iter().map(|s| s.to_string()));
        }

        let task = Task::new(description, steps.clone());
        let task_id = task.task_id.clone();
        self.store.write_task(&task).await?;
        self.active_tasks.insert(task_id.clone(), task);

        let message = AgentMessage::broadcast(
            "orchestrator",
            "task_created",
            "all_agents",
            json!({
                "task_id": task_id,
                "description": description,
                "sequential_steps": steps,
                "require_ultrathink": require_ultrathink,
            }),
        )
        .with_correlation(&task_id);
        self.store.write_message(&message).await?;

        info!(task = %task_id, ultrathink = require_ultrathink, "thinking task created");
        Ok(task_id)
    }

    /// End-to-end driver: both phases across all agents, synthesis, and task
    /// completion.
    ///
    /// Partial failures of sub-agents never raise; the best available bundle
    /// is assembled with degraded sections flagged.
    pub async fn execute_sequential_swarm_thinking(&mut self, problem: &str) -> Result<TaskResult> {
        if self.agents.is_empty() {
            self.initialize_swarm().await?;
        }

        let task_id = self.create_thinking_task(problem, true).await?;
        let mut task = self
            .active_tasks
            .remove(&task_id)
            .expect("task created above is tracked");
        self.store.move_task(&mut task, TaskStatus::Active).await?;

        let mut unpersisted_stages = Vec::new();

        // Phase 1: individual sequential thinking. All results are collected
        // before any phase-2 work begins.
        let mut individual: HashMap<String, SequentialAnalysis> = HashMap::new();
        for (agent_id, agent) in self.thinking_agents() {
            let outcome = agent.sequential_think(problem).await;
            if !outcome.persisted {
                unpersisted_stages.push(UnpersistedStage {
                    agent_id: agent_id.clone(),
                    stage: STAGE_SEQUENTIAL.to_string(),
                });
            }
            individual.insert(agent_id, outcome.value);
        }

        // Phase 2: collaborative ultrathink. Each agent sees every phase-1
        // result except its own.
        let mut collaborative: HashMap<String, UltrathinkReport> = HashMap::new();
        for (agent_id, agent) in self.thinking_agents() {
            let peer_results: Vec<SequentialAnalysis> = individual
                .iter()
                .filter(|(peer_id, _)| **peer_id != agent_id)
                .map(|(_, analysis)| analysis.clone())
                .collect();
            let outcome = agent.ultrathink_collaborative(problem, &peer_results).await;
            if !outcome.persisted {
                unpersisted_stages.push(UnpersistedStage {
                    agent_id: agent_id.clone(),
                    stage: STAGE_ULTRATHINK.to_string(),
                });
            }
            collaborative.insert(agent_id, outcome.value);
        }

        let final_synthesis = match self
            .agents
            .values()
            .find(|agent| agent.role == Role::Synthesizer)
        {
            Some(synthesizer) => {
                FinalSynthesis::Integrated(synthesizer.integrate(collaborative.values()))
            }
            None => {
                warn!(task = %task_id, "no synthesizer instance; final synthesis unavailable");
                FinalSynthesis::Unavailable
            }
        };

        let result = TaskResult {
            individual_sequential_thinking: individual,
            collaborative_ultrathink: collaborative,
            final_synthesis,
            swarm_consensus: ConsensusSummary::placeholder(),
            unpersisted_stages,
        };

        task.result = Some(result.clone());
        self.store
            .move_task(&mut task, TaskStatus::Completed)
            .await?;
        info!(task = %task_id, "swarm thinking completed");
        Ok(result)
    }

    /// Read-only snapshot; mutates nothing.
    pub async fn get_swarm_status(&self) -> SwarmStatus {
        let agents = self
            .agents
            .iter()
            .map(|(agent_id, agent)| {
                let description = self
                    .registry
                    .describe(agent.role)
                    .map(|c| c.description.clone())
                    .unwrap_or_default();
                (
                    agent_id.clone(),
                    AgentSummary {
                        specialty: agent.role.as_str().to_string(),
                        description,
                        status: "active".to_string(),
                    },
                )
            })
            .collect();

        SwarmStatus {
            agents,
            active_tasks: self.active_tasks.len(),
            workspace: self.store.base_dir().to_path_buf(),
            thinking_sessions: self.store.thinking_session_count().await,
        }
    }

    /// Agents participating in the thinking phases (everyone but the
    /// coordinator), with stable id snapshots.
    fn thinking_agents(&self) -> Vec<(String, ThinkingAgent)> {
        self.agents
            .iter()
            .filter(|(_, agent)| agent.role.participates_in_thinking())
            .map(|(id, agent)| (id.clone(), agent.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn orchestrator(registry: AgentRegistry) -> (tempfile::TempDir, SwarmOrchestrator) {
        let dir = tempdir().unwrap();
        let store = Arc::new(WorkspaceStore::new(dir.path()));
        store.initialize().await.unwrap();
        (dir, SwarmOrchestrator::new(registry, store))
    }

    #[tokio::test]
    async fn initialize_swarm_yields_one_instance_per_role() {
        let (dir, mut orchestrator) = orchestrator(AgentRegistry::standard()).await;
        let init = orchestrator.initialize_swarm().await.unwrap();

        assert_eq!(init.status, "swarm_initialized");
        assert_eq!(init.agents.len(), 5);
        let mut specialties: Vec<_> =
            init.agents.values().map(|a| a.specialty.clone()).collect();
        specialties.sort_unstable();
        assert_eq!(
            specialties,
            vec!["analyst", "coordinator", "explorer", "synthesizer", "validator"]
        );

        // One announcement message per instance.
        let messages = std::fs::read_dir(dir.path().join("messages")).unwrap().count();
        assert_eq!(messages, 5);
    }

    #[tokio::test]
    async fn reinitializing_replaces_the_agent_set() {
        let (_dir, mut orchestrator) = orchestrator(AgentRegistry::standard()).await;
        let first = orchestrator.initialize_swarm().await.unwrap();
        let second = orchestrator.initialize_swarm().await.unwrap();

        assert_eq!(second.agents.len(), 5);
        for agent_id in first.agents.keys() {
            assert!(!second.agents.contains_key(agent_id));
        }
    }

    #[tokio::test]
    async fn task_phases_depend_on_ultrathink_flag() {
        let (_dir, mut orchestrator) = orchestrator(AgentRegistry::standard()).await;

        let plain = orchestrator.create_thinking_task("p", false).await.unwrap();
        let ultra = orchestrator.create_thinking_task("p", true).await.unwrap();

        let pending = orchestrator.store.list_pending_tasks().await.unwrap();
        let plain_task = pending.iter().find(|t| t.task_id == plain).unwrap();
        let ultra_task = pending.iter().find(|t| t.task_id == ultra).unwrap();
        assert_eq!(plain_task.sequential_steps.len(), 3);
        assert_eq!(ultra_task.sequential_steps.len(), 7);
        assert_eq!(
            ultra_task.sequential_steps[..3],
            plain_task.sequential_steps[..]
        );
    }

    #[tokio::test]
    async fn end_to_end_with_synthesizer_completes_with_full_bundle() {
        let (dir, mut orchestrator) = orchestrator(AgentRegistry::standard()).await;
        let result = orchestrator
            .execute_sequential_swarm_thinking("P1")
            .await
            .unwrap();

        // Four non-coordinator agents contributed to both phases.
        assert_eq!(result.individual_sequential_thinking.len(), 4);
        assert_eq!(result.collaborative_ultrathink.len(), 4);
        let mut phase_one_ids: Vec<_> =
            result.individual_sequential_thinking.keys().collect();
        let mut phase_two_ids: Vec<_> = result.collaborative_ultrathink.keys().collect();
        phase_one_ids.sort_unstable();
        phase_two_ids.sort_unstable();
        assert_eq!(phase_one_ids, phase_two_ids);
        assert!(phase_one_ids
            .iter()
            .all(|id| !id.starts_with("coordinator")));

        // Each agent saw the other three phase-1 results, never its own.
        for report in result.collaborative_ultrathink.values() {
            assert_eq!(report.integration.peer_inputs_considered, 3);
        }

        match &result.final_synthesis {
            FinalSynthesis::Integrated(insights) => {
                assert_eq!(insights.peer_inputs_considered, 4)
            }
            FinalSynthesis::Unavailable => panic!("synthesizer exists, synthesis must be available"),
        }
        assert!(result.unpersisted_stages.is_empty());

        // The task record ended up completed, with a completion timestamp.
        let completed_dir = dir.path().join("tasks/completed");
        let mut completed = std::fs::read_dir(&completed_dir).unwrap();
        let record = completed.next().unwrap().unwrap();
        let task: Task =
            serde_json::from_slice(&std::fs::read(record.path()).unwrap()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
        assert!(task.result.is_some());
        assert!(dir.path().join("tasks/pending").read_dir().unwrap().next().is_none());
        assert!(dir.path().join("tasks/active").read_dir().unwrap().next().is_none());
    }

    #[tokio::test]
    async fn missing_synthesizer_degrades_to_unavailable_marker() {
        let registry = AgentRegistry::with_roles(&[
            Role::Coordinator,
            Role::Analyst,
            Role::Validator,
            Role::Explorer,
        ]);
        let (dir, mut orchestrator) = orchestrator(registry).await;

        let result = orchestrator
            .execute_sequential_swarm_thinking("P1")
            .await
            .unwrap();

        assert!(matches!(result.final_synthesis, FinalSynthesis::Unavailable));
        assert_eq!(result.individual_sequential_thinking.len(), 3);

        // A missing synthesizer is a partial result, not a failure: the task
        // still completes.
        let completed = std::fs::read_dir(dir.path().join("tasks/completed"))
            .unwrap()
            .count();
        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn status_snapshot_counts_sessions_without_mutating() {
        let (_dir, mut orchestrator) = orchestrator(AgentRegistry::standard()).await;
        orchestrator
            .execute_sequential_swarm_thinking("P1")
            .await
            .unwrap();

        let status = orchestrator.get_swarm_status().await;
        assert_eq!(status.agents.len(), 5);
        // Four thinkers, two stages each.
        assert_eq!(status.thinking_sessions, 8);
        assert_eq!(status.active_tasks, 0);

        let again = orchestrator.get_swarm_status().await;
        assert_eq!(again.thinking_sessions, status.thinking_sessions);
    }

    #[tokio::test]
    async fn consensus_is_the_documented_placeholder() {
        let (_dir, mut orchestrator) = orchestrator(AgentRegistry::standard()).await;
        let result = orchestrator
            .execute_sequential_swarm_thinking("P1")
            .await
            .unwrap();

        assert_eq!(result.swarm_consensus.final_confidence, 0.85);
        assert!(result.swarm_consensus.agreed_points.is_empty());
        assert!(result.swarm_consensus.disagreements.is_empty());
    }
}
