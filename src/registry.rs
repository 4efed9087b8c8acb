//! Static catalog of agent roles.
//!
//! The registry is pure data: built once at startup, never mutated at
//! runtime. Each role carries a description, declared capability tags, and a
//! thinking-style tag; the natural-language prompt sent to the external
//! collaborator is assembled elsewhere from these fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SwarmError};

/// Named category determining an agent's configuration and its position in
/// the phase protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coordinator,
    Analyst,
    Validator,
    Explorer,
    Synthesizer,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Coordinator,
        Role::Analyst,
        Role::Validator,
        Role::Explorer,
        Role::Synthesizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Analyst => "analyst",
            Self::Validator => "validator",
            Self::Explorer => "explorer",
            Self::Synthesizer => "synthesizer",
        }
    }

    /// The coordinator orchestrates and never runs either thinking phase.
    pub fn participates_in_thinking(&self) -> bool {
        !matches!(self, Self::Coordinator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "coordinator" => Ok(Self::Coordinator),
            "analyst" => Ok(Self::Analyst),
            "validator" => Ok(Self::Validator),
            "explorer" => Ok(Self::Explorer),
            "synthesizer" => Ok(Self::Synthesizer),
            other => Err(SwarmError::UnknownRole(other.to_string())),
        }
    }
}

/// Per-role configuration data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    pub description: String,
    pub capabilities: Vec<String>,
    pub thinking_style: String,
}

/// Read-only role catalog.
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    roles: BTreeMap<Role, RoleConfig>,
}

impl AgentRegistry {
    /// The standard five-role swarm.
    pub fn standard() -> Self {
        Self::with_roles(&Role::ALL)
    }

    /// Catalog restricted to `roles`; unknown lookups fail with `UnknownRole`.
    pub fn with_roles(roles: &[Role]) -> Self {
        let roles = roles
            .iter()
            .map(|role| (*role, builtin_config(*role)))
            .collect();
        Self { roles }
    }

    /// Look up a role's configuration.
    pub fn describe(&self, role: Role) -> Result<&RoleConfig> {
        self.roles
            .get(&role)
            .ok_or_else(|| SwarmError::UnknownRole(role.as_str().to_string()))
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains_key(&role)
    }

    pub fn list_roles(&self) -> Vec<Role> {
        self.roles.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &RoleConfig)> {
        self.roles.iter().map(|(role, config)| (*role, config))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

fn builtin_config(role: Role) -> RoleConfig {
    let (description, capabilities, thinking_style): (&str, &[&str], &str) = match role {
        Role::Coordinator => (
            "Orchestrates swarm activities and coordinates thinking sessions",
            &["file_operations", "task_coordination"],
            "meta_cognitive_orchestration",
        ),
        Role::Analyst => (
            "Performs deep first-principles analysis and problem decomposition",
            &[
                "system_analysis",
                "first_principles_reasoning",
                "evidence_verification",
            ],
            "deep_sequential_analysis",
        ),
        Role::Validator => (
            "Sequentially validates each thinking step and ensures logical consistency",
            &[
                "logical_validation",
                "evidence_verification",
                "quality_assurance",
            ],
            "rigorous_validation",
        ),
        Role::Explorer => (
            "Explores alternative perspectives and unconventional solution approaches",
            &[
                "perspective_analysis",
                "creative_thinking",
                "solution_space_mapping",
            ],
            "divergent_exploration",
        ),
        Role::Synthesizer => (
            "Integrates multi-agent insights into coherent, actionable outputs",
            &[
                "insight_integration",
                "coherence_building",
                "synthesis_creation",
            ],
            "integrative_synthesis",
        ),
    };

    RoleConfig {
        description: description.to_string(),
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        thinking_style: thinking_style.to_string(),
    }
}
