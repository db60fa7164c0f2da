//! Content mixers.
//!
//! A mixer turns one source file plus its inherited metadata into normalised
//! `(content, metadata)`. Pages dispatch on the file extension, assets on the
//! kind directory they live in. The set of mixers is closed.

mod image;
mod markdown;

use std::path::Path;

pub(crate) use image::copy as copy_image;
pub use markdown::MarkdownOptions;

use crate::LoadError;
use crate::meta::Metadata;

/// Asset kind whose files go through the image mixer.
pub const IMAGES: &str = "images";

/// Static dispatch table for asset kinds. Kinds not listed use [`Mixer::Identity`].
const KIND_MIXERS: &[(&str, Mixer)] = &[
    (IMAGES, Mixer::Image),
    ("templates", Mixer::Identity),
    ("css", Mixer::Identity),
    ("components", Mixer::Identity),
];

/// Extensions handled by the Markdown mixer under `pages/`.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Transformation applied to a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mixer {
    /// Content and metadata pass through unchanged.
    Identity,
    /// Front matter split, Markdown to HTML, images as shortcodes.
    Markdown,
    /// Emit an `<img>` tag; the file is copied after validation.
    Image,
}

/// Mixer output.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Mixed {
    pub content: String,
    pub metadata: Metadata,
}

/// Settings shared by every mixer in a run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MixerConfig<'a> {
    pub markdown: &'a MarkdownOptions,
    /// URL prefix images are served under.
    pub image_prefix: &'a str,
}

impl Mixer {
    /// Mixer for a file under `pages/`.
    pub fn for_page(path: &Path) -> Self {
        let is_markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| {
                MARKDOWN_EXTENSIONS
                    .iter()
                    .any(|m| e.eq_ignore_ascii_case(m))
            });
        if is_markdown {
            Self::Markdown
        } else {
            Self::Identity
        }
    }

    /// Mixer for a file under `assets/<kind>/`.
    pub fn for_kind(kind: &str) -> Self {
        KIND_MIXERS
            .iter()
            .find(|(k, _)| *k == kind)
            .map_or(Self::Identity, |(_, mixer)| *mixer)
    }

    /// Run the mixer on `path` with its inherited metadata.
    pub fn mix(
        self,
        path: &Path,
        metadata: &Metadata,
        config: MixerConfig<'_>,
    ) -> Result<Mixed, LoadError> {
        match self {
            Self::Identity => Ok(Mixed {
                content: read_text(path)?,
                metadata: metadata.clone(),
            }),
            Self::Markdown => markdown::mix(path, &read_text(path)?, metadata, config.markdown),
            Self::Image => Ok(image::mix(path, metadata, config.image_prefix)),
        }
    }
}

fn read_text(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|e| LoadError::unreadable(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_page_dispatches_on_extension() {
        assert_eq!(Mixer::for_page(Path::new("a.md")), Mixer::Markdown);
        assert_eq!(Mixer::for_page(Path::new("a.markdown")), Mixer::Markdown);
        assert_eq!(Mixer::for_page(Path::new("A.MD")), Mixer::Markdown);
        assert_eq!(Mixer::for_page(Path::new("a.html")), Mixer::Identity);
        assert_eq!(Mixer::for_page(Path::new("README")), Mixer::Identity);
    }

    #[test]
    fn test_for_kind_ignores_extension() {
        assert_eq!(Mixer::for_kind("images"), Mixer::Image);
        assert_eq!(Mixer::for_kind("templates"), Mixer::Identity);
        assert_eq!(Mixer::for_kind("css"), Mixer::Identity);
        assert_eq!(Mixer::for_kind("fonts"), Mixer::Identity);
    }

    #[test]
    fn test_identity_passes_through() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("base.html");
        std::fs::write(&path, "<html>{{ page.title }}</html>").unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("k".to_owned(), "v".into());
        let options = MarkdownOptions::default();
        let config = MixerConfig {
            markdown: &options,
            image_prefix: "/images",
        };

        let mixed = Mixer::Identity.mix(&path, &metadata, config).unwrap();

        assert_eq!(mixed.content, "<html>{{ page.title }}</html>");
        assert_eq!(mixed.metadata, metadata);
    }

    #[test]
    fn test_identity_rejects_binary() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("blob.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let options = MarkdownOptions::default();
        let config = MixerConfig {
            markdown: &options,
            image_prefix: "/images",
        };

        let err = Mixer::Identity
            .mix(&path, &Metadata::new(), config)
            .unwrap_err();

        assert!(matches!(err, LoadError::Unreadable { .. }));
    }
}
