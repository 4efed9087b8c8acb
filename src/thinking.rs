//! Structured payloads produced by the two thinking phases.
//!
//! The analytical *content* of each part is supplied by the opaque agent
//! process backing a collaborator; the core only guarantees the shape (every
//! part present, even when sub-fields are empty) and routes the records
//! through the workspace store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Stage tag for a phase-1 record.
pub const STAGE_SEQUENTIAL: &str = "sequential_analysis";
/// Stage tag for a phase-2 record.
pub const STAGE_ULTRATHINK: &str = "ultrathink_collaborative";

// ── Phase 1: individual sequential analysis ───────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMapping {
    pub outcome_question: String,
    pub evidence_gathering: Vec<String>,
    pub root_cause_analysis: Vec<String>,
    pub component_mapping: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceVerification {
    pub assumptions: Vec<String>,
    pub verification_steps: Vec<String>,
    pub facts_discovered: Vec<String>,
    pub mental_model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MinimalIntervention {
    pub simplest_solution: String,
    pub intervention_plan: Vec<String>,
    pub verification_method: String,
    pub outcome_achievement: String,
}

/// Three-part record produced by one agent's individual analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequentialAnalysis {
    pub system_mapping: SystemMapping,
    pub evidence_verification: EvidenceVerification,
    pub minimal_intervention: MinimalIntervention,
}

impl SequentialAnalysis {
    /// Scaffold with every part present; content is filled in by the
    /// collaborator backing the agent.
    pub fn scaffold(problem: &str) -> Self {
        Self {
            system_mapping: SystemMapping {
                outcome_question: format!("What is the precise outcome needed for: {problem}?"),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

// ── Phase 2: collaborative ultrathink ─────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FirstPrinciples {
    pub fundamental_truths: Vec<String>,
    pub undisputed_facts: Vec<String>,
    pub core_components: Vec<String>,
    pub causal_relationships: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perspective {
    pub viewpoint: String,
    pub analysis: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssumptionChallenge {
    pub assumption: String,
    pub challenge: String,
    pub impact: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolutionSpace {
    pub conventional_solutions: Vec<String>,
    pub unconventional_approaches: Vec<String>,
    pub hybrid_solutions: Vec<String>,
    pub risk_assessment: HashMap<String, String>,
}

/// Synthesis of peer contributions.
///
/// `peer_inputs_considered` always records how many peer results were fed in,
/// even when every other list stayed empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationInsights {
    pub peer_inputs_considered: usize,
    pub synthesized_insights: Vec<String>,
    pub conflicts_identified: Vec<String>,
    pub emergent_patterns: Vec<String>,
    pub collaborative_conclusions: Vec<String>,
}

/// Five-part record produced by one agent's collaborative pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UltrathinkReport {
    pub first_principles: FirstPrinciples,
    pub perspectives: Vec<Perspective>,
    pub challenged_assumptions: Vec<AssumptionChallenge>,
    pub solution_space: SolutionSpace,
    pub integration: IntegrationInsights,
}

impl UltrathinkReport {
    /// Scaffold with all five parts present and the peer count echoed back.
    pub fn scaffold(_problem: &str, peer_inputs_considered: usize) -> Self {
        let perspectives = ["systems", "user", "technical", "business"]
            .into_iter()
            .map(|viewpoint| Perspective {
                viewpoint: viewpoint.to_string(),
                analysis: String::new(),
            })
            .collect();
        Self {
            first_principles: FirstPrinciples::default(),
            perspectives,
            challenged_assumptions: vec![
                AssumptionChallenge::default(),
                AssumptionChallenge::default(),
            ],
            solution_space: SolutionSpace::default(),
            integration: IntegrationInsights {
                peer_inputs_considered,
                ..Default::default()
            },
        }
    }
}

// ── Aggregate results ─────────────────────────────────────────────

/// Final synthesis across all phase-2 outputs.
///
/// A missing synthesizer role yields the explicit `Unavailable` marker, never
/// an empty success.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "insights", rename_all = "snake_case")]
pub enum FinalSynthesis {
    Integrated(IntegrationInsights),
    Unavailable,
}

impl FinalSynthesis {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Integrated(_))
    }
}

/// Swarm consensus summary.
///
/// Always a fixed placeholder: the confidence score and agreement lists are
/// constants, not computed from phase outputs. Callers must not treat this as
/// a real metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSummary {
    pub consensus_level: String,
    pub agreed_points: Vec<String>,
    pub disagreements: Vec<String>,
    pub resolution_method: String,
    pub final_confidence: f64,
}

impl ConsensusSummary {
    pub fn placeholder() -> Self {
        Self {
            consensus_level: "high".to_string(),
            agreed_points: Vec::new(),
            disagreements: Vec::new(),
            resolution_method: "collaborative_reasoning".to_string(),
            final_confidence: 0.85,
        }
    }
}

/// A phase write that could not be persisted; the in-memory value still made
/// it into the result bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnpersistedStage {
    pub agent_id: String,
    pub stage: String,
}

/// Full result bundle attached to a completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub individual_sequential_thinking: HashMap<String, SequentialAnalysis>,
    pub collaborative_ultrathink: HashMap<String, UltrathinkReport>,
    pub final_synthesis: FinalSynthesis,
    pub swarm_consensus: ConsensusSummary,
    /// Degraded sections: phases that were computed but whose store write
    /// failed.
    #[serde(default)]
    pub unpersisted_stages: Vec<UnpersistedStage>,
}

// ── Thinking log entries ──────────────────────────────────────────

/// One persisted record of one phase's output for one agent.
///
/// Exactly one file exists per (agent, stage) pair; re-writing a stage
/// overwrites the previous entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingLogEntry {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub content: Value,
}

impl ThinkingLogEntry {
    pub fn new(agent_id: impl Into<String>, stage: impl Into<String>, content: Value) -> Self {
        Self {
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            stage: stage.into(),
            content,
        }
    }

    /// Resolve the entry's content against the known stage tags. Unknown
    /// stages land in the opaque bucket rather than failing.
    pub fn typed(&self) -> StageContent {
        match self.stage.as_str() {
            STAGE_SEQUENTIAL => serde_json::from_value(self.content.clone())
                .map(StageContent::SequentialAnalysis)
                .unwrap_or_else(|_| StageContent::Opaque(self.content.clone())),
            STAGE_ULTRATHINK => serde_json::from_value(self.content.clone())
                .map(StageContent::Ultrathink)
                .unwrap_or_else(|_| StageContent::Opaque(self.content.clone())),
            _ => StageContent::Opaque(self.content.clone()),
        }
    }
}

/// Typed view over a log entry's content.
#[derive(Debug, Clone)]
pub enum StageContent {
    SequentialAnalysis(Box<SequentialAnalysis>),
    Ultrathink(Box<UltrathinkReport>),
    Opaque(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_always_carries_all_three_parts() {
        let analysis = SequentialAnalysis::scaffold("reduce build times");
        assert!(analysis
            .system_mapping
            .outcome_question
            .contains("reduce build times"));
        // The remaining parts are present even when empty.
        assert!(analysis.evidence_verification.assumptions.is_empty());
        assert!(analysis.minimal_intervention.simplest_solution.is_empty());
    }

    #[test]
    fn ultrathink_scaffold_echoes_peer_count() {
        let report = UltrathinkReport::scaffold("anything", 3);
        assert_eq!(report.integration.peer_inputs_considered, 3);
        assert_eq!(report.perspectives.len(), 4);
    }

    #[test]
    fn log_entry_typed_resolves_known_stage() {
        let analysis = SequentialAnalysis::scaffold("p");
        let entry = ThinkingLogEntry::new(
            "analyst_1",
            STAGE_SEQUENTIAL,
            serde_json::to_value(&analysis).unwrap(),
        );
        match entry.typed() {
            StageContent::SequentialAnalysis(a) => {
                assert_eq!(a.system_mapping.outcome_question, analysis.system_mapping.outcome_question)
            }
            other => panic!("expected sequential analysis, got {other:?}"),
        }
    }

    #[test]
    fn log_entry_typed_falls_back_to_opaque() {
        let entry = ThinkingLogEntry::new(
            "analyst_1",
            "some_future_stage",
            serde_json::json!({"free": "form"}),
        );
        assert!(matches!(entry.typed(), StageContent::Opaque(_)));
    }

    #[test]
    fn unavailable_synthesis_serializes_with_explicit_marker() {
        let json = serde_json::to_value(FinalSynthesis::Unavailable).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert!(!FinalSynthesis::Unavailable.is_available());
    }
}
