//! Key derivation for source files.

use std::path::{Component, Path};

/// Slug of the root index page.
pub const ROOT_SLUG: &str = "index";

/// Whether a directory entry name is hidden (`.git`, `.DS_Store`, ...).
pub(crate) fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Derive a page slug from a path relative to the `pages/` directory.
///
/// The extension is stripped and `index` collapses into its directory:
///
/// - `"about.md"` → `"about"`
/// - `"blog/first-post.md"` → `"blog/first-post"`
/// - `"blog/index.md"` → `"blog"`
/// - `"index.md"` → `"index"`
#[must_use]
pub(crate) fn slug_for(rel_path: &Path) -> String {
    let stem = rel_path.with_extension("");
    let mut segments = to_segments(&stem);

    if segments.last().is_some_and(|s| s == "index") {
        segments.pop();
    }

    if segments.is_empty() {
        ROOT_SLUG.to_owned()
    } else {
        segments.join("/")
    }
}

/// `/`-joined relative path, used as the asset key.
#[must_use]
pub(crate) fn asset_key(rel_path: &Path) -> String {
    to_segments(rel_path).join("/")
}

fn to_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}
