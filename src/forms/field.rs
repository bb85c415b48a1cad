use super::{FieldDefinition, FieldKind, FieldOption};
use serde::Serialize;
use serde_json::Value;

/// Rows given to textarea controls.
pub const TEXTAREA_ROWS: u16 = 5;

/// How coerced values are stored in an item's config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueMode {
    /// Booleans for checkboxes, numbers for numeric fields.
    #[default]
    Typed,
    /// Every value is stored as a string (`"true"`/`"false"` for checkboxes).
    Strings,
}

impl ValueMode {
    pub fn from_flag(save_all_fields_as_string: bool) -> Self {
        if save_all_fields_as_string {
            Self::Strings
        } else {
            Self::Typed
        }
    }
}

/// A raw edit coming from a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Text(String),
    Checked(bool),
}

impl From<&str> for RawInput {
    fn from(s: &str) -> Self {
        RawInput::Text(s.to_string())
    }
}

impl From<String> for RawInput {
    fn from(s: String) -> Self {
        RawInput::Text(s)
    }
}

impl From<bool> for RawInput {
    fn from(b: bool) -> Self {
        RawInput::Checked(b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Password,
    Email,
}

/// The concrete control a field resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum Control {
    Checkbox {
        checked: bool,
    },
    Select {
        selected: String,
        options: Vec<FieldOption>,
    },
    Number {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Input {
        input_type: InputType,
        value: String,
        placeholder: String,
    },
    TextArea {
        value: String,
        placeholder: String,
        rows: u16,
    },
}

/// A field definition bound to its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedField {
    pub id: String,
    pub name: String,
    pub label: String,
    pub help_text: String,
    pub required: bool,
    pub disabled: bool,
    pub control: Control,
}

impl RenderedField {
    /// Text shown for the current value, regardless of control kind.
    pub fn display_value(&self) -> String {
        match &self.control {
            Control::Checkbox { checked } => checked.to_string(),
            Control::Select { selected, .. } => selected.clone(),
            Control::Number { value, .. }
            | Control::Input { value, .. }
            | Control::TextArea { value, .. } => value.clone(),
        }
    }
}

/// Resolve `def` and its current value into a control.
///
/// `current` of `None` or JSON null falls back to the field's default.
pub fn render_field(def: &FieldDefinition, current: Option<&Value>, id_prefix: &str) -> RenderedField {
    let value = current
        .filter(|v| !v.is_null())
        .or(def.default_value.as_ref());

    let control = match def.kind {
        FieldKind::Checkbox => Control::Checkbox {
            checked: is_checked(value),
        },
        FieldKind::Select => Control::Select {
            selected: resolve_selected(&def.options, value),
            options: def.options.clone(),
        },
        FieldKind::Number => Control::Number {
            value: value_text(value),
            min: def.min,
            max: def.max,
            step: def.step,
        },
        FieldKind::Textarea => Control::TextArea {
            value: value_text(value),
            placeholder: def.placeholder.clone(),
            rows: TEXTAREA_ROWS,
        },
        FieldKind::Password => input(InputType::Password, def, value),
        FieldKind::Email => input(InputType::Email, def, value),
        FieldKind::Text => input(InputType::Text, def, value),
    };

    RenderedField {
        id: format!("{id_prefix}{}", def.name),
        name: def.name.clone(),
        label: def.label.clone(),
        help_text: def.help_text.clone(),
        required: def.required,
        disabled: def.disabled,
        control,
    }
}

fn input(input_type: InputType, def: &FieldDefinition, value: Option<&Value>) -> Control {
    Control::Input {
        input_type,
        value: value_text(value),
        placeholder: def.placeholder.clone(),
    }
}

/// Coerce a raw edit into the value stored in config.
pub fn coerce_input(def: &FieldDefinition, raw: RawInput, mode: ValueMode) -> Value {
    coerce_for_kind(def.kind, raw, mode)
}

/// Coerce for a kind directly; unknown fields are treated as text.
pub fn coerce_for_kind(kind: FieldKind, raw: RawInput, mode: ValueMode) -> Value {
    match kind {
        FieldKind::Checkbox => {
            let checked = match raw {
                RawInput::Checked(b) => b,
                RawInput::Text(s) => s.trim().eq_ignore_ascii_case("true"),
            };
            match mode {
                ValueMode::Typed => Value::Bool(checked),
                ValueMode::Strings => Value::String(checked.to_string()),
            }
        }
        FieldKind::Number => match (raw, mode) {
            (RawInput::Text(s), ValueMode::Strings) => Value::String(s),
            (RawInput::Text(s), ValueMode::Typed) => parse_number(&s).unwrap_or(Value::String(s)),
            (RawInput::Checked(b), ValueMode::Typed) => Value::Bool(b),
            (RawInput::Checked(b), ValueMode::Strings) => Value::String(b.to_string()),
        },
        _ => match (raw, mode) {
            (RawInput::Text(s), _) => Value::String(s),
            (RawInput::Checked(b), ValueMode::Typed) => Value::Bool(b),
            (RawInput::Checked(b), ValueMode::Strings) => Value::String(b.to_string()),
        },
    }
}

/// Checked iff the value is `true` or the literal string `"true"`.
pub fn is_checked(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "true",
        _ => false,
    }
}

fn resolve_selected(options: &[FieldOption], value: Option<&Value>) -> String {
    let wanted = value_text(value);
    if options.iter().any(|o| o.value == wanted) {
        return wanted;
    }
    options.first().map(|o| o.value.clone()).unwrap_or_default()
}

/// Integers that do not fit `i64`/`u64` stay text rather than lose digits.
fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Ok(u) = trimmed.parse::<u64>() {
        return Some(Value::from(u));
    }
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Render any JSON value as the text an input would hold.
pub fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
