use baked_store::StoreError;
use baked_template::TemplateError;

/// Error returned by [`Baker`](crate::Baker) queries and renders.
#[derive(Debug, thiserror::Error)]
pub enum BakeError {
    /// No page with this slug.
    #[error("Page not found: {0}")]
    PageNotFound(String),
    /// No asset with this path and kind.
    #[error("Asset not found: {kind}:{path}")]
    AssetNotFound { path: String, kind: String },
    /// The page names a template that is not stored.
    #[error("Template {template:?} for page {slug:?} not found")]
    TemplateNotFound { slug: String, template: String },
    /// Template parsing or rendering failed for a page.
    #[error("Failed to render page {slug:?}: {source}")]
    Render {
        slug: String,
        #[source]
        source: TemplateError,
    },
    /// Stored metadata is not a JSON object.
    #[error("Invalid metadata for page {slug:?}: {source}")]
    Metadata {
        slug: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BakeError {
    /// Whether this is a lookup miss rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PageNotFound(_) | Self::AssetNotFound { .. } | Self::TemplateNotFound { .. }
        )
    }
}
