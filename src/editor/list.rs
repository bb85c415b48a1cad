use super::{ConfigItem, ItemKey, ItemKind};
use crate::forms::{
    apply_defaults, coerce_for_kind, coerce_input, find_group, missing_required, render_group,
    FieldGroup, FieldKind, FieldOption, FormError, RawInput, RenderedField, ValueMode,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// The type selector shown above every item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeSelector {
    pub id: String,
    pub label: String,
    pub selected: String,
    pub options: Vec<FieldOption>,
}

/// One item as a front end should draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedItem {
    #[serde(skip)]
    pub key: ItemKey,
    pub index: usize,
    pub title: String,
    pub type_selector: TypeSelector,
    /// `None` when no field group matches the discriminant: only the
    /// selector is shown.
    pub fields: Option<Vec<RenderedField>>,
}

/// Editor for an ordered list of [`ConfigItem`]s of one kind.
#[derive(Debug, Clone)]
pub struct ConfigListEditor {
    kind: ItemKind,
    items: Vec<ConfigItem>,
    groups: Vec<FieldGroup>,
    mode: ValueMode,
}

impl ConfigListEditor {
    pub fn new(kind: ItemKind, groups: Vec<FieldGroup>) -> Self {
        Self {
            kind,
            items: Vec::new(),
            groups,
            mode: ValueMode::Typed,
        }
    }

    pub fn with_mode(mut self, mode: ValueMode) -> Self {
        self.mode = mode;
        self
    }

    /// Editor pre-filled from the backend's wire representation.
    pub fn from_wire(kind: ItemKind, groups: Vec<FieldGroup>, items: &[Value]) -> Self {
        let mut editor = Self::new(kind, groups);
        editor.items = items
            .iter()
            .map(|v| ConfigItem::from_wire(kind, v))
            .collect();
        editor
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn mode(&self) -> ValueMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ValueMode) {
        self.mode = mode;
    }

    pub fn items(&self) -> &[ConfigItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&ConfigItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// Replace the field-group catalogue (e.g. once metadata arrives).
    pub fn set_groups(&mut self, groups: Vec<FieldGroup>) {
        self.groups = groups;
    }

    pub fn index_of(&self, key: ItemKey) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    /// Append an item with no type and an empty config.
    pub fn add(&mut self) -> ItemKey {
        let item = ConfigItem::empty(self.kind);
        let key = item.key();
        self.items.push(item);
        debug!("Added {} #{}", self.kind, self.items.len());
        key
    }

    /// Append a fully formed item (used by the CLI and hydration).
    pub fn push(&mut self, item: ConfigItem) -> ItemKey {
        let key = item.key();
        self.items.push(item);
        key
    }

    /// Remove by index; later items shift down.
    pub fn remove(&mut self, index: usize) -> Result<ConfigItem, FormError> {
        self.check_index(index)?;
        Ok(self.items.remove(index))
    }

    pub fn remove_key(&mut self, key: ItemKey) -> Option<ConfigItem> {
        let index = self.index_of(key)?;
        Some(self.items.remove(index))
    }

    /// Change the discriminant only. Previously entered config values are
    /// kept, so switching back to an earlier type restores them; defaults of
    /// the new type fill keys that are still missing.
    pub fn change_type(&mut self, index: usize, new_type: &str) -> Result<(), FormError> {
        self.check_index(index)?;
        let mut updated = self.items[index].with_discriminant(new_type);
        if let Some(group) = find_group(&self.groups, new_type) {
            apply_defaults(&group.fields, &mut updated.config);
        }
        debug!(
            "{} #{} type '{}' -> '{}'",
            self.kind,
            index + 1,
            self.items[index].discriminant,
            new_type
        );
        self.items[index] = updated;
        Ok(())
    }

    /// Set one config field from a raw control edit.
    ///
    /// The value is coerced according to the field's definition in the
    /// item's group; fields outside the group are treated as text.
    pub fn change_field(
        &mut self,
        index: usize,
        field: &str,
        raw: impl Into<RawInput>,
    ) -> Result<(), FormError> {
        self.check_index(index)?;
        let item = &self.items[index];
        let group = find_group(&self.groups, &item.discriminant);
        let value = match group.and_then(|g| g.field(field)) {
            Some(def) => coerce_input(def, raw.into(), self.mode),
            None => coerce_for_kind(FieldKind::Text, raw.into(), self.mode),
        };

        let mut config = item.config.clone();
        config.insert(field.to_string(), value);
        if let Some(group) = group {
            apply_defaults(&group.fields, &mut config);
        }
        self.items[index] = item.with_config(config);
        Ok(())
    }

    /// Set one config key to an already-typed value.
    pub fn set_config_value(
        &mut self,
        index: usize,
        field: &str,
        value: Value,
    ) -> Result<(), FormError> {
        self.check_index(index)?;
        let mut config = self.items[index].config.clone();
        config.insert(field.to_string(), value);
        self.items[index] = self.items[index].with_config(config);
        Ok(())
    }

    /// Replace an item's config from JSON text typed by the user.
    ///
    /// Invalid JSON or a non-object leaves the item unchanged.
    pub fn set_raw_config(&mut self, index: usize, text: &str) -> Result<(), FormError> {
        self.check_index(index)?;
        let context = format!("{} #{}", self.kind, index + 1);
        let parsed: Value = serde_json::from_str(text)
            .map_err(|source| FormError::InvalidJson {
                context: context.clone(),
                source,
            })?;
        let Value::Object(config) = parsed else {
            return Err(FormError::NotAnObject(context));
        };
        self.items[index] = self.items[index].with_config(config);
        Ok(())
    }

    /// Describe every item for drawing.
    pub fn render(&self) -> Vec<RenderedItem> {
        let options: Vec<FieldOption> = std::iter::once(FieldOption::new(
            "",
            format!("Select a {} type", self.kind.noun()),
        ))
        .chain(
            self.groups
                .iter()
                .map(|g| FieldOption::new(g.name.clone(), g.label.clone())),
        )
        .collect();

        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let prefix = format!("{}-{}-", self.kind.noun().replace(' ', "_"), index);
                let fields = find_group(&self.groups, &item.discriminant).map(|group| {
                    let mut values = item.config.clone();
                    apply_defaults(&group.fields, &mut values);
                    render_group(&group.fields, &values, &prefix)
                });
                RenderedItem {
                    key: item.key(),
                    index,
                    title: format!("{} #{}", self.kind.title(), index + 1),
                    type_selector: TypeSelector {
                        id: format!("{}type", prefix),
                        label: format!("{} Type", self.kind.title()),
                        selected: item.discriminant.clone(),
                        options: options.clone(),
                    },
                    fields,
                }
            })
            .collect()
    }

    /// Check the list is fit for submission.
    ///
    /// Every item needs a type. Required fields of known types must be set.
    pub fn validate(&self) -> Result<(), FormError> {
        for (index, item) in self.items.iter().enumerate() {
            if item.discriminant.trim().is_empty() {
                return Err(FormError::MissingType {
                    item: self.kind.title().to_string(),
                    position: index + 1,
                });
            }
            if let Some(group) = find_group(&self.groups, &item.discriminant) {
                if let Some(name) = missing_required(&group.fields, &item.config).into_iter().next() {
                    return Err(FormError::MissingRequired(format!(
                        "{} #{} field '{}'",
                        self.kind.title(),
                        index + 1,
                        name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Items in wire form, configs serialized to JSON strings.
    pub fn to_wire(&self) -> Vec<Value> {
        self.items.iter().map(ConfigItem::to_wire).collect()
    }

    /// Config objects keyed by index, for inspection.
    pub fn configs(&self) -> Vec<&Map<String, Value>> {
        self.items.iter().map(|i| &i.config).collect()
    }

    fn check_index(&self, index: usize) -> Result<(), FormError> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(FormError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::legacy;
    use crate::forms::{Control, FieldDefinition};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn connectors() -> ConfigListEditor {
        ConfigListEditor::new(ItemKind::Connector, legacy::connector_groups())
    }

    #[test]
    fn add_appends_empty_item() {
        let mut editor = connectors();
        let key = editor.add();
        assert_eq!(editor.len(), 1);
        assert_eq!(editor.index_of(key), Some(0));
        assert_eq!(editor.to_wire(), vec![json!({"type": "", "config": "{}"})]);
    }

    #[test]
    fn remove_shifts_later_items() {
        let mut editor = connectors();
        editor.add();
        let second = editor.add();
        editor.add();
        editor.change_type(1, "slack").unwrap();

        editor.remove(0).unwrap();
        assert_eq!(editor.len(), 2);
        assert_eq!(editor.index_of(second), Some(0));
        assert_eq!(editor.items()[0].discriminant, "slack");

        assert!(matches!(
            editor.remove(5),
            Err(FormError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn remove_by_key_is_index_independent() {
        let mut editor = connectors();
        let a = editor.add();
        let b = editor.add();
        editor.remove_key(a).unwrap();
        assert_eq!(editor.index_of(b), Some(0));
        assert!(editor.remove_key(a).is_none());
    }

    #[test]
    fn fields_persist_across_type_switch() {
        let mut editor = connectors();
        editor.add();
        editor.change_type(0, "telegram").unwrap();
        editor.change_field(0, "token", "123:ABC").unwrap();

        editor.change_type(0, "slack").unwrap();
        editor.change_type(0, "telegram").unwrap();

        let wire = editor.to_wire();
        let config: Value = serde_json::from_str(wire[0]["config"].as_str().unwrap()).unwrap();
        assert_eq!(wire[0]["type"], "telegram");
        assert_eq!(config["token"], "123:ABC");
    }

    #[test]
    fn unknown_type_renders_selector_only_and_round_trips() {
        let wire = vec![json!({"type": "custom-bridge", "config": "{\"x\":1}"})];
        let editor = ConfigListEditor::from_wire(ItemKind::Connector, legacy::connector_groups(), &wire);

        let rendered = editor.render();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].fields.is_none());
        assert_eq!(rendered[0].type_selector.selected, "custom-bridge");
        assert_eq!(editor.to_wire(), wire);
    }

    #[test]
    fn selector_lists_placeholder_then_groups() {
        let mut editor = ConfigListEditor::new(
            ItemKind::Action,
            vec![FieldGroup::new("search", "Search", vec![]).unwrap()],
        );
        editor.add();
        let rendered = editor.render();
        let options = &rendered[0].type_selector.options;
        assert_eq!(options[0], FieldOption::new("", "Select a action type"));
        assert_eq!(options[1], FieldOption::new("search", "Search"));
        assert_eq!(rendered[0].title, "Action #1");
        assert!(rendered[0].fields.is_none());
    }

    #[test]
    fn change_field_coerces_by_definition_and_mode() {
        let groups = vec![FieldGroup::new(
            "irc",
            "IRC",
            vec![
                FieldDefinition::number("port", "Port"),
                FieldDefinition::checkbox("alwaysReply", "Always reply"),
            ],
        )
        .unwrap()];

        let mut typed = ConfigListEditor::new(ItemKind::Connector, groups.clone());
        typed.add();
        typed.change_type(0, "irc").unwrap();
        typed.change_field(0, "port", "6697").unwrap();
        typed.change_field(0, "alwaysReply", true).unwrap();
        assert_eq!(typed.items()[0].config["port"], json!(6697));
        assert_eq!(typed.items()[0].config["alwaysReply"], json!(true));

        let mut strings =
            ConfigListEditor::new(ItemKind::Connector, groups).with_mode(ValueMode::Strings);
        strings.add();
        strings.change_type(0, "irc").unwrap();
        strings.change_field(0, "port", "6697").unwrap();
        strings.change_field(0, "alwaysReply", false).unwrap();
        assert_eq!(strings.items()[0].config["port"], json!("6697"));
        assert_eq!(strings.items()[0].config["alwaysReply"], json!("false"));
    }

    #[test]
    fn checkbox_bound_to_string_true_renders_checked_then_toggles_false() {
        let groups = vec![FieldGroup::new(
            "slack",
            "Slack",
            vec![FieldDefinition::checkbox("alwaysReply", "Always reply")],
        )
        .unwrap()];
        let wire = vec![json!({"type": "slack", "config": "{\"alwaysReply\":\"true\"}"})];
        let mut editor = ConfigListEditor::from_wire(ItemKind::Connector, groups, &wire);

        let fields = editor.render()[0].fields.clone().unwrap();
        assert_eq!(fields[0].control, Control::Checkbox { checked: true });

        editor.change_field(0, "alwaysReply", false).unwrap();
        let config: Value =
            serde_json::from_str(editor.to_wire()[0]["config"].as_str().unwrap()).unwrap();
        assert_eq!(config["alwaysReply"], json!(false));
    }

    #[test]
    fn invalid_raw_config_leaves_state_unchanged() {
        let mut editor = connectors();
        editor.add();
        editor.change_field(0, "token", "keep").unwrap();
        let before = editor.items()[0].clone();

        assert!(matches!(
            editor.set_raw_config(0, "{oops"),
            Err(FormError::InvalidJson { .. })
        ));
        assert!(matches!(
            editor.set_raw_config(0, "\"text\""),
            Err(FormError::NotAnObject(_))
        ));
        assert_eq!(editor.items()[0], before);

        editor.set_raw_config(0, r#"{"token": "new"}"#).unwrap();
        assert_eq!(editor.items()[0].config["token"], "new");
    }

    #[test]
    fn validate_requires_type_selection() {
        let mut editor = connectors();
        editor.add();
        let err = editor.validate().unwrap_err();
        assert_eq!(err.to_string(), "Connector #1 has no type selected");

        editor.change_type(0, "custom").unwrap();
        assert!(editor.validate().is_ok());
    }

    #[test]
    fn type_change_fills_defaults_without_overwriting() {
        let mut editor = connectors();
        editor.add();
        editor.change_field(0, "pollInterval", "1h").unwrap();
        editor.change_type(0, "github-issues").unwrap();
        let config = &editor.items()[0].config;
        assert_eq!(config["pollInterval"], "1h");
        assert_eq!(config["replyIfNoReplies"], "false");
    }

    #[test]
    fn add_edit_remove_sequence_round_trips() {
        let mut editor = connectors();
        for (ty, token) in [("telegram", "t1"), ("discord", "d1"), ("telegram", "t2")] {
            let index = editor.len();
            editor.add();
            editor.change_type(index, ty).unwrap();
            editor.change_field(index, "token", token).unwrap();
        }
        editor.remove(1).unwrap();

        for (item, wire) in editor.items().iter().zip(editor.to_wire()) {
            let parsed: Value = serde_json::from_str(wire["config"].as_str().unwrap()).unwrap();
            assert_eq!(parsed, Value::Object(item.config.clone()));
        }
        let rebuilt =
            ConfigListEditor::from_wire(ItemKind::Connector, legacy::connector_groups(), &editor.to_wire());
        assert_eq!(rebuilt.configs(), editor.configs());
    }
}
