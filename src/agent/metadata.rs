use crate::editor::legacy;
use crate::forms::{null_as_empty, FieldDefinition, FieldGroup};
use serde::{Deserialize, Serialize};

/// Form metadata published by `GET /api/meta/agent/config`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentConfigMeta {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDefinition>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub connectors: Vec<FieldGroup>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub actions: Vec<FieldGroup>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dynamic_prompts: Vec<FieldGroup>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub filters: Vec<FieldGroup>,
    #[serde(rename = "MCPServers", default, deserialize_with = "null_as_empty")]
    pub mcp_servers: Vec<FieldDefinition>,
}

impl AgentConfigMeta {
    /// Scalar fields grouped by their section tag, in first-seen order.
    pub fn fields_by_section(&self) -> Vec<(String, Vec<&FieldDefinition>)> {
        let mut sections: Vec<(String, Vec<&FieldDefinition>)> = Vec::new();
        for field in &self.fields {
            let section = field.section();
            match sections.iter_mut().find(|(name, _)| name == section) {
                Some((_, fields)) => fields.push(field),
                None => sections.push((section.to_string(), vec![field])),
            }
        }
        sections
    }

    pub fn fields_in_section(&self, section: &str) -> Vec<&FieldDefinition> {
        self.fields.iter().filter(|f| f.section() == section).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Connector catalogue; the built-in groups when the backend sends none.
    pub fn connector_groups(&self) -> Vec<FieldGroup> {
        if self.connectors.is_empty() {
            legacy::connector_groups()
        } else {
            self.connectors.clone()
        }
    }

    /// Action catalogue; the built-in groups when the backend sends none.
    pub fn action_groups(&self) -> Vec<FieldGroup> {
        if self.actions.is_empty() {
            legacy::action_groups()
        } else {
            self.actions.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::FieldKind;
    use serde_json::json;

    fn meta() -> AgentConfigMeta {
        serde_json::from_value(json!({
            "Fields": [
                {"name": "name", "type": "text", "label": "Name", "required": true,
                 "tags": {"section": "BasicInfo"}},
                {"name": "model", "type": "text", "label": "Model",
                 "tags": {"section": "ModelSettings"}},
                {"name": "hud", "type": "checkbox", "label": "HUD", "defaultValue": false,
                 "tags": {"section": "AdvancedSettings"}},
                {"name": "description", "type": "textarea", "label": "Description",
                 "tags": {"section": "BasicInfo"}},
                {"name": "legacy", "type": "text", "label": "Legacy"}
            ],
            "Connectors": [
                {"name": "telegram", "label": "Telegram",
                 "fields": [{"name": "token", "type": "text", "label": "Token", "required": true}]}
            ],
            "Actions": null,
            "DynamicPrompts": [],
            "Filters": [],
            "MCPServers": [{"name": "url", "type": "text", "label": "URL"}]
        }))
        .unwrap()
    }

    #[test]
    fn decodes_pascal_case_keys() {
        let meta = meta();
        assert_eq!(meta.fields.len(), 5);
        assert_eq!(meta.connectors[0].fields[0].name, "token");
        assert!(meta.actions.is_empty());
        assert_eq!(meta.mcp_servers[0].name, "url");
        assert_eq!(meta.field("hud").unwrap().kind, FieldKind::Checkbox);
    }

    #[test]
    fn groups_fields_by_section_in_order() {
        let meta = meta();
        let sections = meta.fields_by_section();
        let names: Vec<_> = sections.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(names, ["BasicInfo", "ModelSettings", "AdvancedSettings", "Other"]);
        assert_eq!(sections[0].1.len(), 2);
        assert_eq!(meta.fields_in_section("Other")[0].name, "legacy");
    }

    #[test]
    fn falls_back_to_built_in_catalogues() {
        let meta = meta();
        assert_eq!(meta.connector_groups().len(), 1);
        assert!(meta.action_groups().iter().any(|g| g.name == "send-mail"));
    }

    #[test]
    fn prompt_group_without_fields_decodes() {
        let meta: AgentConfigMeta = serde_json::from_value(json!({
            "Fields": [],
            "Connectors": [],
            "Actions": [],
            "DynamicPrompts": [
                {"name": "memory", "label": "Memory", "fields": null},
                {"name": "custom", "label": "Custom",
                 "fields": [{"name": "code", "type": "textarea", "label": "Code"}]}
            ],
            "Filters": null,
            "MCPServers": null
        }))
        .unwrap();
        assert_eq!(meta.dynamic_prompts.len(), 2);
        assert!(meta.dynamic_prompts[0].fields.is_empty());
        assert_eq!(meta.dynamic_prompts[1].fields[0].kind, FieldKind::Textarea);
        assert!(meta.filters.is_empty());
    }
}
