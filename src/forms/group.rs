use super::{render_field, FieldDefinition, RenderedField};
use serde_json::{Map, Value};

/// Render every field of a group, in definition order.
pub fn render_group(
    fields: &[FieldDefinition],
    values: &Map<String, Value>,
    id_prefix: &str,
) -> Vec<RenderedField> {
    fields
        .iter()
        .map(|field| render_field(field, values.get(&field.name), id_prefix))
        .collect()
}

/// Fill in defaults for fields that are absent from `config`.
///
/// Present keys are never overwritten. Returns whether anything was added.
pub fn apply_defaults(fields: &[FieldDefinition], config: &mut Map<String, Value>) -> bool {
    let mut changed = false;
    for field in fields {
        if let Some(default) = &field.default_value {
            if !config.contains_key(&field.name) {
                config.insert(field.name.clone(), default.clone());
                changed = true;
            }
        }
    }
    changed
}

/// Names of required fields whose value is missing or blank.
pub fn missing_required(fields: &[FieldDefinition], values: &Map<String, Value>) -> Vec<String> {
    fields
        .iter()
        .filter(|f| f.required)
        .filter(|f| match values.get(&f.name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .map(|f| f.name.clone())
        .collect()
}
