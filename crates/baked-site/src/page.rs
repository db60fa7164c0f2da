//! Page view with structured metadata.

use baked_store::PageRecord;
use serde_json::{Map, Value, json};

use crate::BakeError;

/// A stored page with its metadata deserialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub slug: String,
    pub title: String,
    /// Pre-render HTML fragment.
    pub content: String,
    /// Template name as written in the page's metadata.
    pub template: String,
    pub metadata: Map<String, Value>,
    pub published_date: Option<String>,
}

impl Page {
    pub(crate) fn from_record(record: PageRecord) -> Result<Self, BakeError> {
        let metadata = if record.metadata.trim().is_empty() {
            Map::new()
        } else {
            serde_json::from_str(&record.metadata).map_err(|source| BakeError::Metadata {
                slug: record.slug.clone(),
                source,
            })?
        };

        Ok(Self {
            slug: record.slug,
            title: record.title,
            content: record.content,
            template: record.template,
            metadata,
            published_date: record.published_date,
        })
    }

    /// Template-facing representation.
    ///
    /// `data` is an alias of `metadata`.
    pub fn to_json(&self) -> Value {
        json!({
            "slug": self.slug,
            "title": self.title,
            "content": self.content,
            "template": self.template,
            "metadata": self.metadata,
            "data": self.metadata,
            "published_date": self.published_date,
        })
    }
}
