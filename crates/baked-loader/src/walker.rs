//! Recursive content walk.
//!
//! A directory's `meta.yaml` is merged before any of its entries is mixed.
//! Entries of one directory are independent and are mixed in parallel; the
//! results are reassembled in sorted name order so the output does not depend
//! on scheduling.

use std::path::{Path, PathBuf};

use baked_store::{AssetRecord, Record};
use rayon::prelude::*;

use crate::LoadError;
use crate::meta::{self, META_FILENAME, Metadata};
use crate::mixer::{Mixer, MixerConfig};
use crate::page;
use crate::source::{asset_key, is_hidden, slug_for};

/// A record and the file it came from.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub source: PathBuf,
    pub record: Record,
}

/// Position in the walk. Each recursive step gets its own copy.
#[derive(Debug, Clone)]
pub(crate) struct Traversal<'a> {
    /// Directory being walked.
    pub dir: PathBuf,
    /// Root of the subtree; keys are relative to it.
    pub root: &'a Path,
    /// Metadata inherited from the ancestors of `dir`.
    pub metadata: Metadata,
}

/// What the walked subtree produces.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Subtree<'a> {
    /// `pages/`: page records keyed by slug.
    Pages,
    /// `assets/<kind>/`: asset records of that kind.
    Assets(&'a str),
}

/// Result of walking a subtree.
#[derive(Debug, Default)]
pub(crate) struct Walked {
    pub entries: Vec<Entry>,
    pub drafts_skipped: usize,
}

impl Walked {
    fn append(&mut self, other: Walked) {
        self.entries.extend(other.entries);
        self.drafts_skipped += other.drafts_skipped;
    }
}

/// Walks one subtree of the content root.
pub(crate) struct Walker<'a> {
    pub subtree: Subtree<'a>,
    pub config: MixerConfig<'a>,
    pub include_drafts: bool,
}

impl Walker<'_> {
    /// Walk `traversal.dir` and everything below it.
    pub fn walk(&self, traversal: Traversal<'_>) -> Result<Walked, LoadError> {
        let Traversal {
            dir,
            root,
            metadata: inherited,
        } = traversal;
        let metadata = meta::merge(&inherited, &dir)?;

        let children = list_dir(&dir)?;
        let results: Vec<Walked> = children
            .into_par_iter()
            .map(|path| {
                if path.is_dir() {
                    self.walk(Traversal {
                        dir: path,
                        root,
                        metadata: metadata.clone(),
                    })
                } else {
                    self.visit_file(&path, root, &metadata)
                }
            })
            .collect::<Result<_, _>>()?;

        let mut walked = Walked::default();
        for result in results {
            walked.append(result);
        }
        Ok(walked)
    }

    fn visit_file(
        &self,
        path: &Path,
        root: &Path,
        metadata: &Metadata,
    ) -> Result<Walked, LoadError> {
        let rel = path.strip_prefix(root).unwrap_or(path);

        let record = match self.subtree {
            Subtree::Pages => {
                let mixed = Mixer::for_page(path).mix(path, metadata, self.config)?;
                if page::is_draft(&mixed.metadata) && !self.include_drafts {
                    tracing::debug!(path = %path.display(), "Skipping draft");
                    return Ok(Walked {
                        entries: Vec::new(),
                        drafts_skipped: 1,
                    });
                }
                Record::Page(page::build(slug_for(rel), path, mixed)?)
            }
            Subtree::Assets(kind) => {
                let mixed = Mixer::for_kind(kind).mix(path, metadata, self.config)?;
                Record::Asset(AssetRecord::new(asset_key(rel), kind, mixed.content))
            }
        };
        tracing::debug!(path = %path.display(), key = %record.key(), "Mixed");

        Ok(Walked {
            entries: vec![Entry {
                source: path.to_path_buf(),
                record,
            }],
            drafts_skipped: 0,
        })
    }
}

/// Visible entries of `dir` other than `meta.yaml`, sorted by name.
pub(crate) fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let read = std::fs::read_dir(dir).map_err(|e| LoadError::unreadable(dir, e))?;

    let mut paths = Vec::new();
    for entry in read {
        let entry = entry.map_err(|e| LoadError::unreadable(dir, e))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_hidden(&name) || name == META_FILENAME {
            continue;
        }
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}
