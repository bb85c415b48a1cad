//! Agent configuration state and the form that edits it.

mod form;
mod metadata;
mod submit;

pub use form::*;
pub use metadata::*;
pub use submit::*;

use crate::editor::{ConfigListEditor, ItemKind};
use crate::forms::{null_as_empty, FormError, ValueMode};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys of the item lists; they are owned by editors, not by [`AgentSettings`].
pub const ITEM_LIST_KEYS: [&str; 4] = ["connectors", "actions", "dynamic_prompts", "filters"];

// ============================================================================
// MCP servers
// ============================================================================

/// Remote (HTTP) MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct McpServer {
    #[serde(default)]
    pub url: String,
    #[serde(default, alias = "api_key")]
    pub token: String,
}

/// Local-process MCP server speaking over stdio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct McpStdioServer {
    #[serde(default)]
    pub cmd: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub env: Vec<String>,
}

// ============================================================================
// Agent settings
// ============================================================================

/// Scalar settings of an agent plus its MCP servers.
///
/// Keys the backend sends that are not modelled here are kept in `extra`
/// and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentSettings {
    pub name: String,
    pub description: String,

    // Model
    pub model: String,
    pub multimodal_model: String,
    pub transcription_model: String,
    pub transcription_language: String,
    pub tts_model: String,
    pub api_url: String,
    pub api_key: String,

    // Memory / knowledge base
    pub local_rag_url: String,
    pub local_rag_api_key: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_kb: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_kb_compaction: bool,
    pub kb_compaction_interval: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub kb_compaction_summarize: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub kb_auto_search: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub kb_as_tools: bool,
    #[serde(deserialize_with = "lenient_int")]
    pub kb_results: i64,
    #[serde(deserialize_with = "lenient_bool")]
    pub long_term_memory: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub summary_long_term_memory: bool,
    pub conversation_storage_mode: String,

    // Prompts & goals
    pub system_prompt: String,
    pub permanent_goal: String,
    pub identity_guidance: String,

    // Advanced
    pub last_message_duration: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub hud: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub standalone_job: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub random_identity: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub initiate_conversations: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_planning: bool,
    pub plan_reviewer_model: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub disable_sink_state: bool,
    pub periodic_runs: String,
    pub scheduler_poll_interval: String,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_reasoning: bool,
    #[serde(rename = "enable_reasoning_tool", deserialize_with = "lenient_bool")]
    pub enable_force_reasoning_tool: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_guided_tools: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub can_stop_itself: bool,
    #[serde(deserialize_with = "lenient_int")]
    pub parallel_jobs: i64,
    #[serde(deserialize_with = "lenient_bool")]
    pub strip_thinking_tags: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_evaluation: bool,
    #[serde(deserialize_with = "lenient_int")]
    pub max_evaluation_loops: i64,

    // MCP
    #[serde(deserialize_with = "null_as_empty")]
    pub mcp_servers: Vec<McpServer>,
    #[serde(deserialize_with = "null_as_empty")]
    pub mcp_stdio_servers: Vec<McpStdioServer>,
    pub mcp_prepare_script: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AgentSettings {
    /// Decode settings from a full agent configuration object, ignoring the
    /// item lists.
    pub fn from_config(config: &Map<String, Value>) -> Result<Self, FormError> {
        let mut scalars = config.clone();
        for key in ITEM_LIST_KEYS {
            scalars.remove(key);
        }
        serde_json::from_value(Value::Object(scalars)).map_err(|source| FormError::InvalidJson {
            context: "agent settings".to_string(),
            source,
        })
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Accepts `true`, `"true"`, `1` and `"1"`; anything else is `false`.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim(), "true" | "1" | "on"),
        Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        _ => false,
    })
}

/// Accepts numbers or numeric strings; blank strings and null are 0.
fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom(format!("invalid integer: {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid integer: {s}"))),
        Value::Null => Ok(0),
        other => Err(de::Error::custom(format!("invalid integer: {other}"))),
    }
}

// ============================================================================
// Agent form state
// ============================================================================

/// Everything the agent form edits; the whole object is the unit of
/// persistence.
#[derive(Debug, Clone)]
pub struct AgentFormState {
    pub settings: AgentSettings,
    pub connectors: ConfigListEditor,
    pub actions: ConfigListEditor,
    pub dynamic_prompts: ConfigListEditor,
    pub filters: ConfigListEditor,
}

impl AgentFormState {
    /// Empty state for "create", with editors backed by `meta`.
    pub fn empty(meta: &AgentConfigMeta, mode: ValueMode) -> Self {
        Self {
            settings: AgentSettings::default(),
            connectors: ConfigListEditor::new(ItemKind::Connector, meta.connector_groups())
                .with_mode(mode),
            actions: ConfigListEditor::new(ItemKind::Action, meta.action_groups()).with_mode(mode),
            dynamic_prompts: ConfigListEditor::new(ItemKind::Prompt, meta.dynamic_prompts.clone())
                .with_mode(mode),
            filters: ConfigListEditor::new(ItemKind::Filter, meta.filters.clone()).with_mode(mode),
        }
    }

    /// State hydrated from a fetched agent configuration.
    pub fn from_config(
        config: &Value,
        meta: &AgentConfigMeta,
        mode: ValueMode,
    ) -> Result<Self, FormError> {
        let Value::Object(map) = config else {
            return Err(FormError::NotAnObject("agent configuration".to_string()));
        };
        let list = |key: &str| -> Vec<Value> {
            map.get(key)
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default()
        };

        Ok(Self {
            settings: AgentSettings::from_config(map)?,
            connectors: ConfigListEditor::from_wire(
                ItemKind::Connector,
                meta.connector_groups(),
                &list("connectors"),
            )
            .with_mode(mode),
            actions: ConfigListEditor::from_wire(ItemKind::Action, meta.action_groups(), &list("actions"))
                .with_mode(mode),
            dynamic_prompts: ConfigListEditor::from_wire(
                ItemKind::Prompt,
                meta.dynamic_prompts.clone(),
                &list("dynamic_prompts"),
            )
            .with_mode(mode),
            filters: ConfigListEditor::from_wire(ItemKind::Filter, meta.filters.clone(), &list("filters"))
                .with_mode(mode),
        })
    }

    /// Wire object sent on save.
    pub fn to_config(&self) -> Value {
        let mut map = self.settings.to_map();
        map.insert("connectors".into(), Value::Array(self.connectors.to_wire()));
        map.insert("actions".into(), Value::Array(self.actions.to_wire()));
        map.insert(
            "dynamic_prompts".into(),
            Value::Array(self.dynamic_prompts.to_wire()),
        );
        map.insert("filters".into(), Value::Array(self.filters.to_wire()));
        Value::Object(map)
    }

    pub fn editor(&self, kind: ItemKind) -> &ConfigListEditor {
        match kind {
            ItemKind::Connector => &self.connectors,
            ItemKind::Action => &self.actions,
            ItemKind::Prompt => &self.dynamic_prompts,
            ItemKind::Filter => &self.filters,
        }
    }

    pub fn editor_mut(&mut self, kind: ItemKind) -> &mut ConfigListEditor {
        match kind {
            ItemKind::Connector => &mut self.connectors,
            ItemKind::Action => &mut self.actions,
            ItemKind::Prompt => &mut self.dynamic_prompts,
            ItemKind::Filter => &mut self.filters,
        }
    }
}
