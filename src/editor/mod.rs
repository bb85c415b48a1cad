//! Editors for ordered lists of heterogeneous, typed configuration items.
//!
//! Connectors, actions, dynamic prompts and filters share one shape: a type
//! discriminant plus a free-form config object whose editable fields come from
//! the [`FieldGroup`](crate::forms::FieldGroup) matching the discriminant.

pub mod legacy;
mod list;

pub use list::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;
use uuid::Uuid;

// ============================================================================
// Item Kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Connector,
    Action,
    Prompt,
    Filter,
}

impl ItemKind {
    /// Wire field holding the discriminant.
    pub fn type_field(self) -> &'static str {
        match self {
            ItemKind::Action => "name",
            ItemKind::Connector | ItemKind::Prompt | ItemKind::Filter => "type",
        }
    }

    /// Lowercase noun used in labels ("Select a connector type").
    pub fn noun(self) -> &'static str {
        match self {
            ItemKind::Connector => "connector",
            ItemKind::Action => "action",
            ItemKind::Prompt => "dynamic prompt",
            ItemKind::Filter => "filter",
        }
    }

    /// Capitalised noun used in item titles ("Connector #1").
    pub fn title(self) -> &'static str {
        match self {
            ItemKind::Connector => "Connector",
            ItemKind::Action => "Action",
            ItemKind::Prompt => "Dynamic prompt",
            ItemKind::Filter => "Filter",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

// ============================================================================
// Config Item
// ============================================================================

/// Stable identity of an item within an editor, independent of its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemKey(Uuid);

impl ItemKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One connector, action, prompt block or filter.
///
/// The config is held as an object and only serialized to a JSON string at
/// the wire boundary ([`ConfigItem::to_wire`]).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigItem {
    key: ItemKey,
    pub kind: ItemKind,
    pub discriminant: String,
    pub config: Map<String, Value>,
}

impl ConfigItem {
    /// A fresh item: no type selected, empty config.
    pub fn empty(kind: ItemKind) -> Self {
        Self {
            key: ItemKey::new(),
            kind,
            discriminant: String::new(),
            config: Map::new(),
        }
    }

    pub fn new(kind: ItemKind, discriminant: impl Into<String>, config: Map<String, Value>) -> Self {
        Self {
            key: ItemKey::new(),
            kind,
            discriminant: discriminant.into(),
            config,
        }
    }

    pub fn key(&self) -> ItemKey {
        self.key
    }

    /// Decode an item as the backend stores it: `{"type": "...", "config": "<json>"}`.
    ///
    /// A config that is not valid JSON text, or not an object, is replaced by
    /// an empty object and logged.
    pub fn from_wire(kind: ItemKind, value: &Value) -> Self {
        let discriminant = value
            .get(kind.type_field())
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let config = match value.get("config") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(text)) => parse_config_text(kind, &discriminant, text),
            Some(other) => {
                warn!("Ignoring non-object {} config for '{}': {}", kind, discriminant, other);
                Map::new()
            }
        };

        Self::new(kind, discriminant, config)
    }

    /// Encode for submission, with `config` as a JSON string.
    pub fn to_wire(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            self.kind.type_field().to_string(),
            Value::String(self.discriminant.clone()),
        );
        obj.insert(
            "config".to_string(),
            Value::String(Value::Object(self.config.clone()).to_string()),
        );
        Value::Object(obj)
    }

    /// Config as the JSON text sent to the backend.
    pub fn config_text(&self) -> String {
        Value::Object(self.config.clone()).to_string()
    }

    pub(crate) fn with_discriminant(&self, discriminant: &str) -> Self {
        Self {
            discriminant: discriminant.to_string(),
            ..self.clone()
        }
    }

    pub(crate) fn with_config(&self, config: Map<String, Value>) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }
}

fn parse_config_text(kind: ItemKind, discriminant: &str, text: &str) -> Map<String, Value> {
    if text.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!("Ignoring non-object {} config for '{}': {}", kind, discriminant, other);
            Map::new()
        }
        Err(e) => {
            warn!("Error parsing {} config for '{}': {}", kind, discriminant, e);
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn wire_round_trip_preserves_config() {
        let config = json!({
            "token": "123:ABC",
            "nested": {"a": [1, 2, {"b": null}]},
            "flag": true,
            "ratio": 0.25
        });
        let item = ConfigItem::new(
            ItemKind::Connector,
            "telegram",
            config.as_object().cloned().unwrap(),
        );

        let wire = item.to_wire();
        assert_eq!(wire["type"], "telegram");
        let text = wire["config"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, config);

        let back = ConfigItem::from_wire(ItemKind::Connector, &wire);
        assert_eq!(back.discriminant, "telegram");
        assert_eq!(Value::Object(back.config), config);
    }

    #[test]
    fn actions_use_name_as_discriminant() {
        let wire = json!({"name": "search", "config": "{\"results\":3}"});
        let item = ConfigItem::from_wire(ItemKind::Action, &wire);
        assert_eq!(item.discriminant, "search");
        assert_eq!(item.config["results"], 3);
        assert_eq!(item.to_wire()["name"], "search");
    }

    #[test]
    fn invalid_config_text_recovers_to_empty_object() {
        let wire = json!({"type": "slack", "config": "{not json"});
        let item = ConfigItem::from_wire(ItemKind::Connector, &wire);
        assert_eq!(item.discriminant, "slack");
        assert!(item.config.is_empty());

        let wire = json!({"type": "slack", "config": "[1,2]"});
        assert!(ConfigItem::from_wire(ItemKind::Connector, &wire).config.is_empty());
    }

    #[test]
    fn object_config_accepted_directly() {
        let wire = json!({"type": "irc", "config": {"server": "irc.libera.chat"}});
        let item = ConfigItem::from_wire(ItemKind::Connector, &wire);
        assert_eq!(item.config["server"], "irc.libera.chat");
    }

    #[test]
    fn keys_are_unique() {
        let a = ConfigItem::empty(ItemKind::Filter);
        let b = ConfigItem::empty(ItemKind::Filter);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.to_wire(), json!({"type": "", "config": "{}"}));
    }
}
