//! Directory metadata inheritance.
//!
//! Each directory may carry a `meta.yaml`. Its keys are overlaid onto the
//! metadata accumulated from the ancestors and the result is handed to every
//! file and subdirectory below. Merging never mutates the parent mapping, so
//! sibling subtrees cannot observe each other's keys.

use std::path::Path;

use serde_json::Value;

use crate::LoadError;

/// Accumulated key/value metadata.
pub type Metadata = serde_json::Map<String, Value>;

/// Directory metadata filename.
pub const META_FILENAME: &str = "meta.yaml";

/// Merge `dir/meta.yaml` over `parent`.
///
/// A missing or unreadable file counts as absent and yields a copy of
/// `parent`. A file that does not parse as a YAML mapping is an error.
pub(crate) fn merge(parent: &Metadata, dir: &Path) -> Result<Metadata, LoadError> {
    let path = dir.join(META_FILENAME);
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Ok(parent.clone());
    };

    let local = parse(&content).map_err(|message| LoadError::MalformedMeta {
        path: path.clone(),
        message,
    })?;
    tracing::debug!(path = %path.display(), keys = local.len(), "Merged directory metadata");

    Ok(overlay(parent, local))
}

/// Overlay `overrides` onto a copy of `base`. Keys in `overrides` win.
#[must_use]
pub(crate) fn overlay(base: &Metadata, overrides: Metadata) -> Metadata {
    let mut merged = base.clone();
    merged.extend(overrides);
    merged
}

/// Parse a YAML mapping. Empty documents are an empty mapping.
pub(crate) fn parse(content: &str) -> Result<Metadata, String> {
    if content.trim().is_empty() {
        return Ok(Metadata::new());
    }
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Metadata::new()),
        Ok(other) => Err(format!("expected a mapping, found {}", kind_name(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
