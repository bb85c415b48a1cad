use super::{AgentConfigMeta, AgentFormState, AgentSettings, McpServer, McpStdioServer, SubmitHandler};
use crate::editor::{ConfigListEditor, ItemKind};
use crate::forms::{coerce_for_kind, FieldKind, FormError, RawInput, ValueMode};
use crate::toast::{ToastKind, ToastService};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    BasicInfo,
    Model,
    Connectors,
    Actions,
    McpServers,
    Memory,
    Prompts,
    Advanced,
    Export,
}

impl Section {
    pub const ALL: [Section; 9] = [
        Section::BasicInfo,
        Section::Model,
        Section::Connectors,
        Section::Actions,
        Section::McpServers,
        Section::Memory,
        Section::Prompts,
        Section::Advanced,
        Section::Export,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Section::BasicInfo => "basic-section",
            Section::Model => "model-section",
            Section::Connectors => "connectors-section",
            Section::Actions => "actions-section",
            Section::McpServers => "mcp-section",
            Section::Memory => "memory-section",
            Section::Prompts => "prompts-section",
            Section::Advanced => "advanced-section",
            Section::Export => "export-section",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::BasicInfo => "Basic Information",
            Section::Model => "Model Settings",
            Section::Connectors => "Connectors",
            Section::Actions => "Actions",
            Section::McpServers => "MCP Servers",
            Section::Memory => "Memory Settings",
            Section::Prompts => "Prompts & Goals",
            Section::Advanced => "Advanced Settings",
            Section::Export => "Export Data",
        }
    }

    /// Metadata `tags.section` value of the scalar fields shown here.
    pub fn meta_tag(self) -> Option<&'static str> {
        match self {
            Section::BasicInfo => Some("BasicInfo"),
            Section::Model => Some("ModelSettings"),
            Section::Memory => Some("MemorySettings"),
            Section::Prompts => Some("PromptsGoals"),
            Section::Advanced => Some("AdvancedSettings"),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { name: String },
    Group,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] FormError),
    #[error("{0}")]
    Rejected(String),
}

// ============================================================================
// Agent Form
// ============================================================================

/// State machine behind the create/edit/group agent form.
pub struct AgentForm {
    mode: FormMode,
    meta: AgentConfigMeta,
    state: AgentFormState,
    active: Section,
    value_mode: ValueMode,
    baseline: Option<String>,
    submitting: bool,
}

impl AgentForm {
    pub fn new(mode: FormMode, meta: AgentConfigMeta, value_mode: ValueMode) -> Self {
        let active = if mode == FormMode::Group {
            Section::Model
        } else {
            Section::BasicInfo
        };
        let state = AgentFormState::empty(&meta, value_mode);
        Self {
            mode,
            meta,
            state,
            active,
            value_mode,
            baseline: None,
            submitting: false,
        }
    }

    /// Form for editing an existing agent, hydrated from its fetched config.
    pub fn edit(
        name: impl Into<String>,
        meta: AgentConfigMeta,
        config: &Value,
        value_mode: ValueMode,
    ) -> Result<Self, FormError> {
        let mut form = Self::new(FormMode::Edit { name: name.into() }, meta, value_mode);
        form.hydrate(config)?;
        Ok(form)
    }

    pub fn mode(&self) -> &FormMode {
        &self.mode
    }

    pub fn meta(&self) -> &AgentConfigMeta {
        &self.meta
    }

    pub fn state(&self) -> &AgentFormState {
        &self.state
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.state.settings
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Sections available in this mode, in display order.
    pub fn sections(&self) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .filter(|s| match s {
                Section::BasicInfo => self.mode != FormMode::Group,
                Section::Export => matches!(self.mode, FormMode::Edit { .. }),
                _ => true,
            })
            .collect()
    }

    pub fn active_section(&self) -> Section {
        self.active
    }

    /// Switch the visible section. Nothing else changes.
    pub fn select_section(&mut self, section: Section) -> bool {
        if !self.sections().contains(&section) {
            debug!("Section {} not available in {:?} form", section, self.mode);
            return false;
        }
        self.active = section;
        true
    }

    // ------------------------------------------------------------------------
    // Scalar fields
    // ------------------------------------------------------------------------

    /// Apply one edit to a scalar field.
    ///
    /// `parent.child` merges `child` into the object at `parent`. The input is
    /// coerced by the metadata field kind, else by the type of the current
    /// value. A value the settings cannot hold is rejected and nothing changes.
    pub fn set_field(&mut self, name: &str, raw: impl Into<RawInput>) -> Result<(), FormError> {
        let raw = raw.into();
        let mut map = self.state.settings.to_map();
        let path: Vec<&str> = name.split('.').filter(|s| !s.is_empty()).collect();
        let Some((leaf, parents)) = path.split_last() else {
            return Err(FormError::MissingRequired("field name".to_string()));
        };

        let value = match self.meta.field(name) {
            Some(def) => coerce_for_kind(def.kind, raw, ValueMode::Typed),
            None => coerce_like(lookup(&map, &path), raw),
        };
        insert_path(&mut map, parents, leaf, value);

        let settings: AgentSettings =
            serde_json::from_value(Value::Object(map)).map_err(|source| FormError::InvalidJson {
                context: format!("field '{}'", name),
                source,
            })?;
        self.state.settings = settings;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Item lists
    // ------------------------------------------------------------------------

    pub fn editor(&self, kind: ItemKind) -> &ConfigListEditor {
        self.state.editor(kind)
    }

    pub fn editor_mut(&mut self, kind: ItemKind) -> &mut ConfigListEditor {
        self.state.editor_mut(kind)
    }

    /// Merge one key into a connector's config, as the basic connector form does.
    pub fn update_connector_config(
        &mut self,
        index: usize,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<(), FormError> {
        self.state
            .connectors
            .set_config_value(index, key, value.into())
    }

    // ------------------------------------------------------------------------
    // MCP servers
    // ------------------------------------------------------------------------

    pub fn add_mcp_server(&mut self) -> usize {
        self.state.settings.mcp_servers.push(McpServer::default());
        self.state.settings.mcp_servers.len() - 1
    }

    pub fn remove_mcp_server(&mut self, index: usize) -> Result<McpServer, FormError> {
        let servers = &mut self.state.settings.mcp_servers;
        check_index(index, servers.len())?;
        Ok(servers.remove(index))
    }

    /// Set `url` or `token` of one HTTP server.
    pub fn change_mcp_server(&mut self, index: usize, field: &str, value: &str) -> Result<(), FormError> {
        let servers = &mut self.state.settings.mcp_servers;
        check_index(index, servers.len())?;
        let mut server = servers[index].clone();
        match field {
            "url" => server.url = value.to_string(),
            "token" | "api_key" => server.token = value.to_string(),
            other => return Err(unknown_field("MCP server", other)),
        }
        servers[index] = server;
        Ok(())
    }

    pub fn add_mcp_stdio_server(&mut self) -> usize {
        self.state
            .settings
            .mcp_stdio_servers
            .push(McpStdioServer::default());
        self.state.settings.mcp_stdio_servers.len() - 1
    }

    pub fn remove_mcp_stdio_server(&mut self, index: usize) -> Result<McpStdioServer, FormError> {
        let servers = &mut self.state.settings.mcp_stdio_servers;
        check_index(index, servers.len())?;
        Ok(servers.remove(index))
    }

    /// Set `cmd`, `args` or `env` of one STDIO server. List fields take one
    /// entry per line.
    pub fn change_mcp_stdio_server(
        &mut self,
        index: usize,
        field: &str,
        value: &str,
    ) -> Result<(), FormError> {
        let servers = &mut self.state.settings.mcp_stdio_servers;
        check_index(index, servers.len())?;
        let lines = || -> Vec<String> {
            value
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        };
        let mut server = servers[index].clone();
        match field {
            "cmd" => server.cmd = value.to_string(),
            "args" => server.args = lines(),
            "env" => server.env = lines(),
            other => return Err(unknown_field("MCP STDIO server", other)),
        }
        servers[index] = server;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    /// Replace the whole state from a fetched agent configuration.
    pub fn hydrate(&mut self, config: &Value) -> Result<(), FormError> {
        self.state = AgentFormState::from_config(config, &self.meta, self.value_mode)?;
        self.baseline = Some(hash_value(&self.submission()));
        debug!("Hydrated agent form '{}'", self.state.settings.name);
        Ok(())
    }

    /// Wire object for the backend.
    pub fn submission(&self) -> Value {
        self.state.to_config()
    }

    /// Whether anything changed since hydration. A never-hydrated form is
    /// dirty.
    pub fn is_dirty(&self) -> bool {
        match &self.baseline {
            Some(baseline) => *baseline != hash_value(&self.submission()),
            None => true,
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.mode != FormMode::Group && self.state.settings.name.trim().is_empty() {
            return Err(FormError::MissingRequired("Agent name".to_string()));
        }
        for kind in [ItemKind::Connector, ItemKind::Action, ItemKind::Prompt, ItemKind::Filter] {
            self.state.editor(kind).validate()?;
        }
        Ok(())
    }

    /// Validate, deliver through `handler` and report the outcome as a toast.
    pub async fn submit(
        &mut self,
        handler: &dyn SubmitHandler,
        toasts: &ToastService,
    ) -> Result<(), SubmitError> {
        if let Err(e) = self.validate() {
            toasts.show(capitalize(&e.to_string()), ToastKind::Error);
            return Err(e.into());
        }

        let payload = self.submission();
        self.submitting = true;
        let result = handler.submit(payload).await;
        self.submitting = false;

        match result {
            Ok(()) => {
                let name = &self.state.settings.name;
                let message = match &self.mode {
                    FormMode::Create => format!("Agent \"{}\" created successfully", name),
                    FormMode::Edit { .. } => format!("Agent \"{}\" updated successfully", name),
                    FormMode::Group => "Agent group created successfully".to_string(),
                };
                info!("{}", message);
                self.baseline = Some(hash_value(&self.submission()));
                toasts.show(message, ToastKind::Success);
                Ok(())
            }
            Err(e) => {
                warn!("Agent form submission failed: {:#}", e);
                let message = capitalize(&e.to_string());
                toasts.show(message.clone(), ToastKind::Error);
                Err(SubmitError::Rejected(message))
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Insert `value` at `parents.leaf`, creating intermediate objects and
/// replacing non-object values in the way. Existing keys keep their position.
fn insert_path(map: &mut Map<String, Value>, parents: &[&str], leaf: &str, value: Value) {
    let Some((head, rest)) = parents.split_first() else {
        map.insert(leaf.to_string(), value);
        return;
    };
    if let Some(Value::Object(child)) = map.get_mut(*head) {
        insert_path(child, rest, leaf, value);
        return;
    }
    let mut child = Map::new();
    insert_path(&mut child, rest, leaf, value);
    map.insert(head.to_string(), Value::Object(child));
}

fn lookup<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(map.get(*first)?, |value, key| value.get(*key))
}

/// Coerce raw input to the JSON type of the value it replaces.
fn coerce_like(existing: Option<&Value>, raw: RawInput) -> Value {
    let kind = match existing {
        Some(Value::Bool(_)) => FieldKind::Checkbox,
        Some(Value::Number(_)) => FieldKind::Number,
        _ => FieldKind::Text,
    };
    match raw {
        RawInput::Checked(b) => Value::Bool(b),
        text => coerce_for_kind(kind, text, ValueMode::Typed),
    }
}

fn check_index(index: usize, len: usize) -> Result<(), FormError> {
    if index < len {
        Ok(())
    } else {
        Err(FormError::IndexOutOfRange { index, len })
    }
}

fn unknown_field(what: &str, field: &str) -> FormError {
    FormError::MissingRequired(format!("known {} field (got '{}')", what, field))
}

fn hash_value(value: &Value) -> String {
    hex::encode(Sha256::digest(value.to_string().as_bytes()))
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FieldDefinition;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    struct Recorder {
        payloads: Mutex<Vec<Value>>,
        fail_with: Option<String>,
    }

    impl Recorder {
        fn ok() -> Self {
            Self {
                payloads: Mutex::new(Vec::new()),
                fail_with: None,
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                payloads: Mutex::new(Vec::new()),
                fail_with: Some(message.to_string()),
            }
        }
    }

    #[async_trait]
    impl SubmitHandler for Recorder {
        async fn submit(&self, payload: Value) -> anyhow::Result<()> {
            self.payloads.lock().push(payload);
            match &self.fail_with {
                Some(message) => anyhow::bail!("{}", message),
                None => Ok(()),
            }
        }
    }

    fn meta() -> AgentConfigMeta {
        AgentConfigMeta {
            fields: vec![
                FieldDefinition::text("name", "Name").in_section("BasicInfo"),
                FieldDefinition::checkbox("enable_kb", "Enable KB").in_section("MemorySettings"),
                FieldDefinition::number("kb_results", "KB results").in_section("MemorySettings"),
            ],
            ..Default::default()
        }
    }

    fn fetched() -> Value {
        json!({
            "name": "helper",
            "model": "qwen3",
            "enable_kb": false,
            "kb_results": 3,
            "memory": {"provider": "chromem", "collection": "default"},
            "connectors": [{"type": "telegram", "config": "{\"token\":\"123:ABC\"}"}],
            "actions": [],
            "dynamic_prompts": [],
            "filters": []
        })
    }

    #[test]
    fn group_form_hides_basic_info_and_starts_on_model() {
        let mut form = AgentForm::new(FormMode::Group, meta(), ValueMode::Typed);
        assert_eq!(form.active_section(), Section::Model);
        assert!(!form.sections().contains(&Section::BasicInfo));
        assert!(!form.select_section(Section::BasicInfo));
        assert_eq!(form.active_section(), Section::Model);

        let create = AgentForm::new(FormMode::Create, meta(), ValueMode::Typed);
        assert_eq!(create.active_section(), Section::BasicInfo);
        assert!(!create.sections().contains(&Section::Export));
    }

    #[test]
    fn navigation_keeps_section_state() {
        let mut form = AgentForm::new(FormMode::Create, meta(), ValueMode::Typed);
        form.set_field("name", "helper").unwrap();
        form.select_section(Section::Connectors);
        form.editor_mut(ItemKind::Connector).add();
        form.select_section(Section::Advanced);
        form.select_section(Section::Connectors);
        assert_eq!(form.settings().name, "helper");
        assert_eq!(form.editor(ItemKind::Connector).len(), 1);
    }

    #[test]
    fn set_field_coerces_by_metadata_and_current_type() {
        let mut form = AgentForm::edit("helper", meta(), &fetched(), ValueMode::Typed).unwrap();
        form.set_field("enable_kb", true).unwrap();
        form.set_field("kb_results", "7").unwrap();
        form.set_field("hud", "true").unwrap();
        form.set_field("model", "llama").unwrap();

        let settings = form.settings();
        assert!(settings.enable_kb);
        assert_eq!(settings.kb_results, 7);
        assert!(settings.hud);
        assert_eq!(settings.model, "llama");
    }

    #[test]
    fn invalid_scalar_is_rejected_without_change() {
        let mut form = AgentForm::edit("helper", meta(), &fetched(), ValueMode::Typed).unwrap();
        let err = form.set_field("parallel_jobs", "lots").unwrap_err();
        assert!(matches!(err, FormError::InvalidJson { .. }));
        assert_eq!(form.settings().parallel_jobs, 0);
    }

    #[test]
    fn dotted_names_merge_into_nested_objects() {
        let mut form = AgentForm::edit("helper", meta(), &fetched(), ValueMode::Typed).unwrap();
        form.set_field("memory.provider", "qdrant").unwrap();
        form.set_field("tuning.nested.depth", "2").unwrap();

        let out = form.submission();
        assert_eq!(out["memory"], json!({"provider": "qdrant", "collection": "default"}));
        assert_eq!(out["tuning"]["nested"]["depth"], "2");
    }

    #[test]
    fn mcp_servers_add_change_remove() {
        let mut form = AgentForm::new(FormMode::Create, meta(), ValueMode::Typed);
        let i = form.add_mcp_server();
        form.change_mcp_server(i, "url", "http://mcp:8080").unwrap();
        form.change_mcp_server(i, "token", "secret").unwrap();
        assert!(form.change_mcp_server(i, "port", "1").is_err());
        assert!(form.change_mcp_server(4, "url", "x").is_err());

        let j = form.add_mcp_stdio_server();
        form.change_mcp_stdio_server(j, "cmd", "npx").unwrap();
        form.change_mcp_stdio_server(j, "args", "-y\n@mcp/server\n").unwrap();
        form.change_mcp_stdio_server(j, "env", "A=1").unwrap();

        let out = form.submission();
        assert_eq!(out["mcp_servers"], json!([{"url": "http://mcp:8080", "token": "secret"}]));
        assert_eq!(
            out["mcp_stdio_servers"],
            json!([{"cmd": "npx", "args": ["-y", "@mcp/server"], "env": ["A=1"]}])
        );

        form.remove_mcp_server(0).unwrap();
        form.remove_mcp_stdio_server(0).unwrap();
        assert_eq!(form.submission()["mcp_servers"], json!([]));
    }

    #[test]
    fn connector_config_merges_keys() {
        let mut form = AgentForm::edit("helper", meta(), &fetched(), ValueMode::Typed).unwrap();
        form.update_connector_config(0, "chatId", "42").unwrap();
        let config = &form.editor(ItemKind::Connector).items()[0].config;
        assert_eq!(config["token"], "123:ABC");
        assert_eq!(config["chatId"], "42");
        assert!(form.update_connector_config(3, "k", "v").is_err());
    }

    #[test]
    fn fetch_then_save_without_edits_is_identical() {
        let form = AgentForm::edit("helper", meta(), &fetched(), ValueMode::Typed).unwrap();
        assert!(!form.is_dirty());
        let out = form.submission();
        for (key, value) in fetched().as_object().unwrap() {
            assert_eq!(&out[key], value, "key {key}");
        }
    }

    #[test]
    fn edits_make_form_dirty() {
        let mut form = AgentForm::edit("helper", meta(), &fetched(), ValueMode::Typed).unwrap();
        form.set_field("model", "other").unwrap();
        assert!(form.is_dirty());
        form.set_field("model", "qwen3").unwrap();
        assert!(!form.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_requires_name_outside_group_mode() {
        let toasts = ToastService::new(Duration::from_millis(3000));
        let handler = Recorder::ok();
        let mut form = AgentForm::new(FormMode::Create, meta(), ValueMode::Typed);

        let err = form.submit(&handler, &toasts).await.unwrap_err();
        assert!(matches!(err, SubmitError::Invalid(FormError::MissingRequired(_))));
        assert!(handler.payloads.lock().is_empty());
        assert_eq!(toasts.visible().unwrap().message, "Agent name is required");

        let mut group = AgentForm::new(FormMode::Group, meta(), ValueMode::Typed);
        group.submit(&handler, &toasts).await.unwrap();
        assert_eq!(handler.payloads.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_reports_success_and_capitalised_errors() {
        let toasts = ToastService::new(Duration::from_millis(3000));
        let mut form = AgentForm::new(FormMode::Create, meta(), ValueMode::Typed);
        form.set_field("name", "helper").unwrap();

        form.submit(&Recorder::ok(), &toasts).await.unwrap();
        assert_eq!(
            toasts.visible().unwrap().message,
            "Agent \"helper\" created successfully"
        );
        assert!(!form.is_dirty());

        let err = form
            .submit(&Recorder::failing("agent already exists"), &toasts)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Agent already exists");
        assert_eq!(toasts.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_rejects_untyped_items() {
        let toasts = ToastService::new(Duration::from_millis(3000));
        let handler = Recorder::ok();
        let mut form = AgentForm::new(FormMode::Create, meta(), ValueMode::Typed);
        form.set_field("name", "helper").unwrap();
        form.editor_mut(ItemKind::Filter).add();

        let err = form.submit(&handler, &toasts).await.unwrap_err();
        assert_eq!(err.to_string(), "Filter #1 has no type selected");
        assert!(handler.payloads.lock().is_empty());
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("élan"), "Élan");
    }
}
