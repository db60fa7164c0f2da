//! Content ingestion for baked.
//!
//! [`ingest`] walks a content tree and writes one row per source file into a
//! [`Store`]:
//!
//! ```text
//! <content root>/
//!   site.yaml             -> asset ("site.yaml", "json")
//!   pages/**              -> pages, keyed by slug
//!   assets/<kind>/**      -> assets, keyed by (relative path, kind)
//! ```
//!
//! Each directory's `meta.yaml` is merged over the metadata inherited from
//! its parents and handed to every file below it. Files are transformed by
//! a mixer picked from their extension (pages) or kind (assets).
//!
//! Ingestion is all-or-nothing: every record of the run is validated for key
//! collisions and then committed in a single transaction.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use baked_loader::{IngestOptions, ingest};
//! use baked_store::Store;
//!
//! let store = Store::create(Path::new("dist/site.db"))?;
//! let report = ingest(Path::new("site"), &store, &IngestOptions::default())?;
//! println!("{} pages, {} assets", report.pages, report.assets);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod meta;
mod mixer;
mod page;
mod source;
mod walker;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use baked_config::{SITE_FILENAME, SITE_KIND, SiteMetadata};
use baked_store::{AssetRecord, Record, Store};

pub use error::LoadError;
pub use meta::{META_FILENAME, Metadata};
pub use mixer::{IMAGES, MarkdownOptions};
pub use page::{DEFAULT_TEMPLATE, DRAFT_KEY};
pub use source::ROOT_SLUG;

use mixer::MixerConfig;
use walker::{Entry, Subtree, Traversal, Walked, Walker};

/// Directory holding pages, relative to the content root.
pub const PAGES_DIR: &str = "pages";

/// Directory holding one subdirectory per asset kind.
pub const ASSETS_DIR: &str = "assets";

/// Ingestion settings. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Ingest pages flagged `isDraft: true`.
    pub include_drafts: bool,
    /// Build output directory; images are copied below it.
    pub output_dir: PathBuf,
    /// URL prefix images are served under (e.g. `/images`).
    pub image_prefix: String,
    /// Markdown parser settings.
    pub markdown: MarkdownOptions,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            include_drafts: false,
            output_dir: PathBuf::from("dist"),
            image_prefix: "/images".to_owned(),
            markdown: MarkdownOptions::default(),
        }
    }
}

impl IngestOptions {
    /// Directory images are copied into: the prefix mapped below `output_dir`.
    #[must_use]
    pub fn image_dir(&self) -> PathBuf {
        self.output_dir
            .join(self.image_prefix.trim_matches('/'))
    }
}

/// Counts of what a run stored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub pages: usize,
    pub assets: usize,
    pub drafts_skipped: usize,
}

/// Ingest the content tree at `content_root` into `store`.
///
/// # Errors
///
/// Fails without writing anything, images included, if the content root is missing, if
/// `site.yaml`, a `meta.yaml` or front matter is malformed, if a file cannot
/// be read or copied, or if two files map to the same key.
pub fn ingest(
    content_root: &Path,
    store: &Store,
    options: &IngestOptions,
) -> Result<IngestReport, LoadError> {
    if !content_root.is_dir() {
        return Err(LoadError::MissingContentRoot(content_root.to_path_buf()));
    }

    let site = SiteMetadata::load(content_root)?;
    let mut entries = vec![Entry {
        source: content_root.join(SITE_FILENAME),
        record: Record::Asset(AssetRecord::new(
            SITE_FILENAME,
            SITE_KIND,
            site.to_json().to_string(),
        )),
    }];

    let config = MixerConfig {
        markdown: &options.markdown,
        image_prefix: &options.image_prefix,
    };

    let mut walked = Walked::default();
    let pages_dir = content_root.join(PAGES_DIR);
    if pages_dir.is_dir() {
        walked = walk(&pages_dir, Subtree::Pages, config, options.include_drafts)?;
    } else {
        tracing::warn!(dir = %pages_dir.display(), "No pages directory");
    }
    let drafts_skipped = walked.drafts_skipped;
    entries.append(&mut walked.entries);

    let assets_dir = content_root.join(ASSETS_DIR);
    if assets_dir.is_dir() {
        for kind_dir in walker::list_dir(&assets_dir)? {
            if !kind_dir.is_dir() {
                tracing::warn!(path = %kind_dir.display(), "Ignoring file outside an asset kind directory");
                continue;
            }
            let kind = kind_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut walked = walk(&kind_dir, Subtree::Assets(&kind), config, false)?;
            entries.append(&mut walked.entries);
        }
    }

    check_duplicates(&entries)?;
    copy_images(&entries, &options.image_dir())?;

    let records: Vec<Record> = entries.into_iter().map(|e| e.record).collect();
    let pages = records
        .iter()
        .filter(|r| matches!(r, Record::Page(_)))
        .count();
    let report = IngestReport {
        pages,
        assets: records.len() - pages,
        drafts_skipped,
    };

    store.insert_all(&records)?;
    tracing::info!(
        root = %content_root.display(),
        pages = report.pages,
        assets = report.assets,
        drafts_skipped = report.drafts_skipped,
        "Ingested content"
    );

    Ok(report)
}

fn walk(
    dir: &Path,
    subtree: Subtree<'_>,
    config: MixerConfig<'_>,
    include_drafts: bool,
) -> Result<Walked, LoadError> {
    let walker = Walker {
        subtree,
        config,
        include_drafts,
    };
    walker.walk(Traversal {
        dir: dir.to_path_buf(),
        root: dir,
        metadata: Metadata::new(),
    })
}

/// Copy every image entry into `image_dir`. Runs only after the run has
/// passed [`check_duplicates`].
fn copy_images(entries: &[Entry], image_dir: &Path) -> Result<(), LoadError> {
    for entry in entries {
        if let Record::Asset(asset) = &entry.record
            && asset.kind == IMAGES
        {
            mixer::copy_image(&entry.source, image_dir)?;
        }
    }
    Ok(())
}

/// Reject two entries sharing a key, naming both source files.
///
/// Images are also checked by file name, since they are copied flat into one
/// output directory.
fn check_duplicates(entries: &[Entry]) -> Result<(), LoadError> {
    let mut seen: HashMap<String, &Path> = HashMap::with_capacity(entries.len());

    for entry in entries {
        let mut keys = vec![entry.record.key()];
        if let Record::Asset(asset) = &entry.record
            && asset.kind == IMAGES
        {
            let file_name = asset.path.rsplit('/').next().unwrap_or(&asset.path);
            keys.push(format!("{IMAGES} output {file_name}"));
        }

        for key in keys {
            if let Some(first) = seen.insert(key.clone(), &entry.source) {
                return Err(LoadError::DuplicateKey {
                    key,
                    first: first.to_path_buf(),
                    second: entry.source.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn options(output: &Path) -> IngestOptions {
        IngestOptions {
            output_dir: output.to_path_buf(),
            ..IngestOptions::default()
        }
    }

    fn sample_site(root: &Path) {
        write(root, "site.yaml", "title: My Site\nurl: https://example.com\n");
        write(root, "pages/index.md", "---\ntitle: Home\n---\nWelcome\n");
        write(root, "pages/about.md", "---\ntitle: About\n---\nAbout us\n");
        write(
            root,
            "pages/blog/first.md",
            "---\ntitle: First\ndate: 2024-01-01\n---\n![Logo](logo.png)\n",
        );
        write(root, "assets/templates/base.html", "<html>{{ page.content }}</html>");
        write(root, "assets/css/site.css", "body { margin: 0 }");
        write(root, "assets/images/logo.png", "png");
    }

    #[test]
    fn test_ingest_sample_site() {
        let content = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        sample_site(content.path());
        let store = Store::open_in_memory().unwrap();

        let report = ingest(content.path(), &store, &options(output.path())).unwrap();

        assert_eq!(
            report,
            IngestReport {
                pages: 3,
                assets: 4,
                drafts_skipped: 0
            }
        );
        assert_eq!(store.list_slugs().unwrap(), vec!["about", "blog/first", "index"]);

        let first = store.get_page_by_slug("blog/first").unwrap().unwrap();
        assert_eq!(first.title, "First");
        assert_eq!(first.template, "base.html");
        assert_eq!(first.published_date.as_deref(), Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(
            first.content,
            "<p>{% image \"logo.png\", \"Logo\", \"\" %}</p>\n"
        );

        let site = store
            .get_asset_by_path_and_type(SITE_FILENAME, SITE_KIND)
            .unwrap()
            .unwrap();
        let site: Value = serde_json::from_str(&site.content).unwrap();
        assert_eq!(site["title"], json!("My Site"));

        let logo = store
            .get_asset_by_path_and_type("logo.png", IMAGES)
            .unwrap()
            .unwrap();
        assert_eq!(logo.content, r#"<img src="/images/logo.png" alt="logo.png">"#);
        assert!(output.path().join("images/logo.png").is_file());
    }

    #[test]
    fn test_missing_content_root() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();

        let err = ingest(&temp.path().join("nope"), &store, &options(temp.path())).unwrap_err();

        assert!(matches!(err, LoadError::MissingContentRoot(_)));
    }

    #[test]
    fn test_malformed_site_yaml_aborts() {
        let content = tempfile::tempdir().unwrap();
        write(content.path(), "site.yaml", "title: [broken\n");
        write(content.path(), "pages/a.md", "A");
        let store = Store::open_in_memory().unwrap();

        let err = ingest(content.path(), &store, &options(content.path())).unwrap_err();

        assert!(matches!(err, LoadError::Config(_)));
        assert_eq!(store.count_pages().unwrap(), 0);
    }

    #[test]
    fn test_missing_site_yaml_is_empty_metadata() {
        let content = tempfile::tempdir().unwrap();
        write(content.path(), "pages/a.md", "A");
        let store = Store::open_in_memory().unwrap();

        ingest(content.path(), &store, &options(content.path())).unwrap();

        let site = store
            .get_asset_by_path_and_type(SITE_FILENAME, SITE_KIND)
            .unwrap()
            .unwrap();
        assert_eq!(site.content, "{}");
    }

    #[test]
    fn test_duplicate_slug_is_an_error() {
        let content = tempfile::tempdir().unwrap();
        write(content.path(), "pages/post.md", "One");
        write(content.path(), "pages/post/index.md", "Two");
        let store = Store::open_in_memory().unwrap();

        let err = ingest(content.path(), &store, &options(content.path())).unwrap_err();

        match err {
            LoadError::DuplicateKey { key, first, second } => {
                assert_eq!(key, "post");
                // Directory `post` sorts before file `post.md`.
                assert!(first.ends_with("post/index.md"));
                assert!(second.ends_with("post.md"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.count_pages().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_image_file_name_is_an_error() {
        let content = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(content.path(), "assets/images/a/logo.png", "1");
        write(content.path(), "assets/images/b/logo.png", "2");
        let store = Store::open_in_memory().unwrap();

        let err = ingest(content.path(), &store, &options(output.path())).unwrap_err();

        assert!(matches!(err, LoadError::DuplicateKey { ref key, .. } if key == "images output logo.png"));
    }

    #[test]
    fn test_rejected_run_copies_no_images() {
        let content = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write(content.path(), "pages/post.md", "One");
        write(content.path(), "pages/post/index.md", "Two");
        write(content.path(), "assets/images/cat.png", "png");
        let store = Store::open_in_memory().unwrap();

        let err = ingest(content.path(), &store, &options(output.path())).unwrap_err();

        assert!(matches!(err, LoadError::DuplicateKey { .. }));
        assert!(!output.path().join("images").exists());
        assert_eq!(store.count_pages().unwrap(), 0);
    }

    #[test]
    fn test_draft_rows() {
        let content = tempfile::tempdir().unwrap();
        write(content.path(), "pages/wip.md", "---\nisDraft: true\n---\nWIP\n");

        let store = Store::open_in_memory().unwrap();
        let report = ingest(content.path(), &store, &options(content.path())).unwrap();
        assert_eq!(store.count_pages().unwrap(), 0);
        assert_eq!(report.drafts_skipped, 1);

        let store = Store::open_in_memory().unwrap();
        let with_drafts = IngestOptions {
            include_drafts: true,
            ..options(content.path())
        };
        ingest(content.path(), &store, &with_drafts).unwrap();
        assert_eq!(store.count_pages().unwrap(), 1);
    }

    #[test]
    fn test_unknown_asset_kind_uses_identity() {
        let content = tempfile::tempdir().unwrap();
        write(content.path(), "assets/fonts/readme.txt", "fonts here");
        write(content.path(), "assets/stray.txt", "ignored");
        let store = Store::open_in_memory().unwrap();

        let report = ingest(content.path(), &store, &options(content.path())).unwrap();

        assert_eq!(report.assets, 2);
        let asset = store
            .get_asset_by_path_and_type("readme.txt", "fonts")
            .unwrap()
            .unwrap();
        assert_eq!(asset.content, "fonts here");
    }

    #[test]
    fn test_image_dir() {
        let options = IngestOptions {
            output_dir: PathBuf::from("dist"),
            image_prefix: "/static/img/".to_owned(),
            ..IngestOptions::default()
        };
        assert_eq!(options.image_dir(), PathBuf::from("dist/static/img"));
    }
}
