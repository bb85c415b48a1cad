//! Metadata-driven form primitives.
//!
//! A [`FieldDefinition`] describes one configurable parameter. The backend
//! supplies them grouped into [`FieldGroup`]s (one group per connector,
//! action, prompt or filter type); legacy editors build the same types from
//! literals in [`crate::editor::legacy`].

mod field;
mod group;

pub use field::*;
pub use group::*;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ============================================================================
// Field Definition Model
// ============================================================================

/// Input kind of a field. Determines the control and how raw input is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Number,
    Checkbox,
    Select,
    Textarea,
    Password,
    Email,
    #[default]
    #[serde(other)]
    Text,
}

impl std::str::FromStr for FieldKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "checkbox" => Ok(Self::Checkbox),
            "select" => Ok(Self::Select),
            "textarea" => Ok(Self::Textarea),
            "password" => Ok(Self::Password),
            "email" => Ok(Self::Email),
            _ => Err(format!("invalid field kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FieldTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

/// One configurable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help_text: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default)]
    pub tags: FieldTags,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            default_value: None,
            placeholder: String::new(),
            help_text: String::new(),
            required: false,
            disabled: false,
            options: Vec::new(),
            min: None,
            max: None,
            step: None,
            tags: FieldTags::default(),
        }
    }

    pub fn text(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn password(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Password)
    }

    pub fn checkbox(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Checkbox)
    }

    pub fn number(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Number)
    }

    pub fn textarea(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(name, label, FieldKind::Textarea)
    }

    pub fn select(
        name: impl Into<String>,
        label: impl Into<String>,
        options: Vec<FieldOption>,
    ) -> Self {
        let mut def = Self::new(name, label, FieldKind::Select);
        def.options = options;
        def
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help_text = help.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    pub fn in_section(mut self, section: impl Into<String>) -> Self {
        self.tags.section = Some(section.into());
        self
    }

    /// The section this field is shown in, `"Other"` when untagged.
    pub fn section(&self) -> &str {
        self.tags
            .section
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Other")
    }
}

/// Editable fields for one connector/action/prompt/filter type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldGroup {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub fields: Vec<FieldDefinition>,
}

impl FieldGroup {
    /// Build a group, rejecting duplicate field names.
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Result<Self, FormError> {
        ensure_unique_names(&fields)?;
        Ok(Self {
            name: name.into(),
            label: label.into(),
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> Result<(), FormError> {
        ensure_unique_names(&self.fields)
    }
}

/// Find the group whose name equals `discriminant`. Empty never matches.
pub fn find_group<'a>(groups: &'a [FieldGroup], discriminant: &str) -> Option<&'a FieldGroup> {
    if discriminant.is_empty() {
        return None;
    }
    groups.iter().find(|g| g.name == discriminant)
}

/// Go backends encode nil slices as `null`; read those as empty lists.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn ensure_unique_names(fields: &[FieldDefinition]) -> Result<(), FormError> {
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field.name.as_str()) {
            return Err(FormError::DuplicateField(field.name.clone()));
        }
    }
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

/// Validation errors raised by form and editor operations.
///
/// State is never modified when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid JSON in {context}: {source}")]
    InvalidJson {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{item} #{position} has no type selected")]
    MissingType { item: String, position: usize },
    #[error("{0} is required")]
    MissingRequired(String),
    #[error("index {index} is out of range (list has {len} items)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),
    #[error("config for {0} must be a JSON object")]
    NotAnObject(String),
}
