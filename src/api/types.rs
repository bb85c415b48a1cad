use crate::forms::null_as_empty;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ============================================================================
// Agents
// ============================================================================

/// Entry of the agents list. Older backends send bare names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentSummary {
    Named {
        #[serde(default)]
        id: Value,
        name: String,
    },
    Bare(String),
}

impl AgentSummary {
    pub fn name(&self) -> &str {
        match self {
            AgentSummary::Named { name, .. } => name,
            AgentSummary::Bare(name) => name,
        }
    }

    /// Key used in the `statuses` map.
    pub fn status_key(&self) -> String {
        match self {
            AgentSummary::Named { id: Value::String(id), .. } => id.clone(),
            AgentSummary::Named { id, .. } => id.to_string(),
            AgentSummary::Bare(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentList {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub agents: Vec<AgentSummary>,
    #[serde(default)]
    pub statuses: HashMap<String, bool>,
    #[serde(default)]
    pub agent_count: Option<usize>,
    #[serde(default)]
    pub actions: Option<usize>,
    #[serde(default)]
    pub connectors: Option<usize>,
}

impl AgentList {
    pub fn is_active(&self, agent: &AgentSummary) -> bool {
        self.statuses
            .get(&agent.status_key())
            .or_else(|| self.statuses.get(agent.name()))
            .copied()
            .unwrap_or(false)
    }
}

/// `GET /api/agent/{name}/status`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusHistory {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub history: Vec<String>,
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub system_prompt: String,
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionRun {
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

// ============================================================================
// Knowledge base
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSearch {
    pub query: String,
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSource {
    pub url: String,
    #[serde(default)]
    pub update_interval: u64,
}

// ============================================================================
// Skills
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(rename = "allowed-tools", default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<String>,
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GitRepo {
    #[serde(default)]
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub enabled: bool,
}
