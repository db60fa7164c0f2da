//! Row types persisted by the store.

/// Asset kind under which templates are stored.
pub const TEMPLATES: &str = "templates";

/// A page row.
///
/// `metadata` is the JSON serialisation of the page's merged metadata and is
/// stored and returned verbatim; the store never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    /// Unique key derived from the source path (e.g. `"blog/first-post"`).
    pub slug: String,
    pub title: String,
    /// HTML fragment produced by the page's mixer, not yet rendered.
    pub content: String,
    /// Template name, resolved as an asset of kind [`TEMPLATES`].
    pub template: String,
    /// Opaque JSON object text.
    pub metadata: String,
    /// ISO-8601 timestamp, `None` for undated pages.
    pub published_date: Option<String>,
}

/// An asset row, unique per `(path, kind)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Path relative to the kind's directory (e.g. `"base.html"`).
    pub path: String,
    /// Content kind (`css`, `images`, `components`, `templates`, ...).
    pub kind: String,
    pub content: String,
}

impl AssetRecord {
    /// Create an asset record.
    pub fn new(
        path: impl Into<String>,
        kind: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
            content: content.into(),
        }
    }
}

/// A row of either table, as produced by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Page(PageRecord),
    Asset(AssetRecord),
}

impl Record {
    /// Human-readable key for diagnostics: the slug, or `kind:path`.
    pub fn key(&self) -> String {
        match self {
            Self::Page(page) => page.slug.clone(),
            Self::Asset(asset) => format!("{}:{}", asset.kind, asset.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key() {
        let page = Record::Page(PageRecord {
            slug: "blog/hello".to_owned(),
            title: "Hello".to_owned(),
            content: String::new(),
            template: "base.html".to_owned(),
            metadata: "{}".to_owned(),
            published_date: None,
        });
        assert_eq!(page.key(), "blog/hello");

        let asset = Record::Asset(AssetRecord::new("site.css", "css", "body{}"));
        assert_eq!(asset.key(), "css:site.css");
    }
}
