//! Image mixer: emit an `<img>` tag; [`copy`] places the file in the output.

use std::path::Path;

use super::Mixed;
use crate::LoadError;
use crate::meta::Metadata;

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Describe the image at `path` with an `<img>` tag served from
/// `image_prefix`.
///
/// Images are flattened by file name. `alt` comes from the inherited `alt`
/// key and falls back to the file name. Nothing is written; the file is
/// copied by [`copy`] once the whole run has been validated.
pub(super) fn mix(path: &Path, metadata: &Metadata, image_prefix: &str) -> Mixed {
    let file_name = file_name(path);
    let alt = metadata
        .get("alt")
        .and_then(serde_json::Value::as_str)
        .filter(|a| !a.is_empty())
        .unwrap_or(&file_name);
    let src = format!("{}/{file_name}", image_prefix.trim_end_matches('/'));

    Mixed {
        content: format!(
            r#"<img src="{}" alt="{}">"#,
            html_escape::encode_double_quoted_attribute(&src),
            html_escape::encode_double_quoted_attribute(alt)
        ),
        metadata: metadata.clone(),
    }
}

/// Copy `path` to `image_dir/<file name>`.
pub(crate) fn copy(path: &Path, image_dir: &Path) -> Result<(), LoadError> {
    let target = image_dir.join(file_name(path));
    std::fs::create_dir_all(image_dir)
        .and_then(|()| std::fs::copy(path, &target))
        .map_err(|source| LoadError::Copy {
            from: path.to_path_buf(),
            to: target.clone(),
            source,
        })?;
    tracing::debug!(from = %path.display(), to = %target.display(), "Copied image");
    Ok(())
}
