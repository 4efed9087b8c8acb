//! Per-agent thinking engine.
//!
//! Runs the two-phase protocol for one agent: individual sequential analysis
//! first, then a collaborative pass over peers' phase-1 outputs. Each phase
//! persists its record to the workspace store before returning; a failed
//! write degrades the outcome to computed-but-unpersisted instead of
//! aborting.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::registry::Role;
use crate::task::short_uniquifier;
use crate::thinking::{
    IntegrationInsights, SequentialAnalysis, ThinkingLogEntry, UltrathinkReport, STAGE_SEQUENTIAL,
    STAGE_ULTRATHINK,
};
use crate::workspace::WorkspaceStore;

/// A phase result plus whether its store write succeeded.
///
/// `persisted == false` means the value was computed but the log entry never
/// made it to disk; the orchestrator decides whether that degrades the task.
#[derive(Debug, Clone)]
pub struct PhaseOutcome<T> {
    pub value: T,
    pub persisted: bool,
}

/// One logical swarm participant running in-process.
#[derive(Debug, Clone)]
pub struct ThinkingAgent {
    pub agent_id: String,
    pub role: Role,
    store: Arc<WorkspaceStore>,
}

impl ThinkingAgent {
    pub fn new(role: Role, store: Arc<WorkspaceStore>) -> Self {
        Self {
            agent_id: format!("{}_agent_{}", role.as_str(), short_uniquifier()),
            role,
            store,
        }
    }

    /// Phase 1: individual sequential analysis.
    ///
    /// Always returns all three parts of the record; persists it tagged
    /// `sequential_analysis` before returning.
    pub async fn sequential_think(&self, problem: &str) -> PhaseOutcome<SequentialAnalysis> {
        let analysis = SequentialAnalysis::scaffold(problem);
        let persisted = self
            .log_thinking(STAGE_SEQUENTIAL, serde_json::to_value(&analysis))
            .await;
        PhaseOutcome {
            value: analysis,
            persisted,
        }
    }

    /// Phase 2: collaborative ultrathink over peers' phase-1 outputs.
    ///
    /// `peer_results` must exclude this agent's own phase-1 output; the
    /// integration part echoes back how many peer inputs were considered.
    pub async fn ultrathink_collaborative(
        &self,
        problem: &str,
        peer_results: &[SequentialAnalysis],
    ) -> PhaseOutcome<UltrathinkReport> {
        let report = UltrathinkReport::scaffold(problem, peer_results.len());
        let persisted = self
            .log_thinking(STAGE_ULTRATHINK, serde_json::to_value(&report))
            .await;
        PhaseOutcome {
            value: report,
            persisted,
        }
    }

    /// Integrate a set of phase-2 reports into synthesis insights. Pure; used
    /// by the orchestrator when this agent holds the synthesizer role.
    pub fn integrate<'a>(
        &self,
        reports: impl IntoIterator<Item = &'a UltrathinkReport>,
    ) -> IntegrationInsights {
        IntegrationInsights {
            peer_inputs_considered: reports.into_iter().count(),
            ..Default::default()
        }
    }

    async fn log_thinking(&self, stage: &str, content: serde_json::Result<Value>) -> bool {
        let content = match content {
            Ok(content) => content,
            Err(e) => {
                warn!(agent = %self.agent_id, stage, error = %e, "failed to serialize phase record");
                return false;
            }
        };
        let entry = ThinkingLogEntry::new(&self.agent_id, stage, content);
        match self.store.write_thinking_log(&entry).await {
            Ok(()) => {
                debug!(agent = %self.agent_id, stage, "thinking stage persisted");
                true
            }
            Err(e) => {
                warn!(agent = %self.agent_id, stage, error = %e, "thinking stage not persisted");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thinking::StageContent;
    use tempfile::tempdir;

    async fn agent(role: Role) -> (tempfile::TempDir, ThinkingAgent) {
        let dir = tempdir().unwrap();
        let store = Arc::new(WorkspaceStore::new(dir.path()));
        store.initialize().await.unwrap();
        (dir, ThinkingAgent::new(role, store))
    }

    #[tokio::test]
    async fn sequential_think_persists_tagged_entry() {
        let (dir, agent) = agent(Role::Analyst).await;
        let outcome = agent.sequential_think("why is the cache cold").await;
        assert!(outcome.persisted);
        assert!(outcome
            .value
            .system_mapping
            .outcome_question
            .contains("cache cold"));

        let store = WorkspaceStore::new(dir.path());
        let logs = store.list_thinking_logs(&agent.agent_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].stage, STAGE_SEQUENTIAL);
        assert!(matches!(logs[0].typed(), StageContent::SequentialAnalysis(_)));
    }

    #[tokio::test]
    async fn repeated_sequential_think_overwrites_not_appends() {
        let (dir, agent) = agent(Role::Validator).await;
        agent.sequential_think("first").await;
        agent.sequential_think("second").await;

        let store = WorkspaceStore::new(dir.path());
        let logs = store.list_thinking_logs(&agent.agent_id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].stage, STAGE_SEQUENTIAL);
    }

    #[tokio::test]
    async fn both_phases_yield_two_entries() {
        let (dir, agent) = agent(Role::Explorer).await;
        let phase_one = agent.sequential_think("p").await;
        let peers = vec![phase_one.value.clone(), phase_one.value.clone()];
        let phase_two = agent.ultrathink_collaborative("p", &peers).await;
        assert!(phase_two.persisted);
        assert_eq!(phase_two.value.integration.peer_inputs_considered, 2);

        let store = WorkspaceStore::new(dir.path());
        let mut stages: Vec<_> = store
            .list_thinking_logs(&agent.agent_id)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.stage)
            .collect();
        stages.sort_unstable();
        assert_eq!(stages, vec![STAGE_SEQUENTIAL, STAGE_ULTRATHINK]);
    }

    #[test]
    fn failed_persistence_degrades_but_still_returns_value() {
        let dir = tempdir().unwrap();
        // Store never initialized: the thinking_sessions subdivision is
        // missing, so the write fails.
        let store = Arc::new(WorkspaceStore::new(dir.path().join("missing")));
        let agent = ThinkingAgent::new(Role::Analyst, store);

        let outcome = tokio_test::block_on(agent.sequential_think("p"));
        assert!(!outcome.persisted);
        assert!(!outcome.value.system_mapping.outcome_question.is_empty());
    }
}
