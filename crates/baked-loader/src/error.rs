//! Ingestion error type.

use std::path::PathBuf;

use baked_config::ConfigError;
use baked_store::StoreError;

/// Error returned by [`ingest`](crate::ingest).
///
/// Every variant aborts the run: a partially ingested store would break
/// slug uniqueness or silently drop content.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Content root does not exist or is not a directory.
    #[error("Content root not found: {}", .0.display())]
    MissingContentRoot(PathBuf),
    /// Malformed `site.yaml`.
    #[error("{0}")]
    Config(#[from] ConfigError),
    /// Malformed `meta.yaml`.
    #[error("Malformed metadata in {}: {message}", .path.display())]
    MalformedMeta {
        path: PathBuf,
        message: String,
    },
    /// Malformed front matter in a content file.
    #[error("Malformed front matter in {}: {message}", .path.display())]
    FrontMatter {
        path: PathBuf,
        message: String,
    },
    /// Front matter `date` could not be parsed.
    #[error("Invalid date {value:?} in {}", .path.display())]
    InvalidDate {
        path: PathBuf,
        value: String,
    },
    /// Content file could not be read or decoded.
    #[error("Cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Image could not be copied to the output directory.
    #[error("Cannot copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Two source files map to the same store key.
    #[error("Duplicate key {key:?}: {} and {}", .first.display(), .second.display())]
    DuplicateKey {
        key: String,
        first: PathBuf,
        second: PathBuf,
    },
    /// Store rejected the batch.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl LoadError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }
}
