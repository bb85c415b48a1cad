use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Maximum size for a config file (1 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Parse a JSON5 configuration string. Plain JSON is valid JSON5.
pub fn parse_config_json5(content: &str) -> Result<Value> {
    let value: Value = json5::from_str(content)?;
    Ok(value)
}

/// Read a configuration file into a JSON value, choosing the parser by
/// extension (`yaml`/`yml`, `toml`, otherwise JSON5).
///
/// Files larger than `MAX_CONFIG_FILE_BYTES` are rejected.
pub fn read_config_file_snapshot(path: &Path) -> Result<Value> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat config file '{}'", path.display()))?;
    if !metadata.is_file() {
        bail!("Config path '{}' is not a file", path.display());
    }
    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let value = match ext {
        "yaml" | "yml" => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in '{}'", path.display()))?,
        "toml" => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in '{}'", path.display()))?,
        _ => parse_config_json5(&content)
            .with_context(|| format!("Invalid JSON in '{}'", path.display()))?,
    };

    // An empty YAML document parses as null.
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    })
}

/// Deep merge two JSON config values (source into target).
pub fn merge_config_values(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(ref mut target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                let entry = target_map.entry(key.clone()).or_insert(Value::Null);
                merge_config_values(entry, value);
            }
        }
        (target, source) => {
            *target = source.clone();
        }
    }
}

/// Compute a hash of a configuration snapshot for change detection.
pub fn resolve_config_snapshot_hash(value: &Value) -> String {
    use sha2::{Digest, Sha256};
    let canonical = serde_json::to_string(value).unwrap_or_default();
    let hash = Sha256::digest(canonical.as_bytes());
    hex::encode(hash)
}

/// Write configuration to a JSON file, creating parent directories.
pub fn write_config_file(path: &Path, config: &Value) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create '{}'", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
