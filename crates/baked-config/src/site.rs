//! Global site metadata from `site.yaml`.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ConfigError;

/// Name of the site metadata file at the content root.
pub const SITE_FILENAME: &str = "site.yaml";

/// Asset kind the serialised site metadata is stored under.
pub const SITE_KIND: &str = "json";

/// Global metadata describing the site.
///
/// The well-known keys are text. Numbers and booleans are accepted and kept
/// as their text (`title: 1984`). Anything else is kept in `extra` so
/// templates can reach custom keys through `site.<key>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteMetadata {
    #[serde(default, deserialize_with = "scalar_text", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "scalar_text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "scalar_text", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "scalar_text", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "scalar_text", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Custom keys.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Read a YAML scalar as text. Null is absent; lists and maps are rejected.
fn scalar_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(scalar @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(scalar.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected text, found {other}"
        ))),
    }
}

impl SiteMetadata {
    /// Parse site metadata from YAML text.
    ///
    /// Empty input yields default metadata.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Malformed {
            file: SITE_FILENAME.to_owned(),
            message: e.to_string(),
        })
    }

    /// Load `site.yaml` from a content root.
    ///
    /// A missing file is tolerated (logged, default metadata). An unreadable
    /// or malformed file is an error.
    pub fn load(content_root: &Path) -> Result<Self, ConfigError> {
        let path = content_root.join(SITE_FILENAME);
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "no site.yaml, using empty site metadata");
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Serialize to a JSON object for templates and storage.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
