//! Page queries and rendering over a baked store.
//!
//! [`Baker`] is the read side of a build: it looks pages and assets up in a
//! [`Store`](baked_store::Store) filled by `baked-loader`, and renders pages
//! through their templates with `baked-template`.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use std::sync::Arc;
//! use baked_site::Baker;
//! use baked_store::Store;
//! use baked_template::RenderOptions;
//!
//! let store = Arc::new(Store::open(Path::new("dist/site.db"))?);
//! let baker = Baker::new(store, RenderOptions::default());
//!
//! let snapshot = baker.snapshot()?;
//! for page in snapshot.pages() {
//!     let html = baker.render_page_in(page, &snapshot)?;
//!     # let _ = html;
//! }
//! # Ok(())
//! # }
//! ```

mod baker;
mod error;
mod page;
mod snapshot;

pub use baker::Baker;
pub use error::BakeError;
pub use page::Page;
pub use snapshot::SiteSnapshot;

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use baked_loader::{IngestOptions, ingest};
    use baked_store::Store;
    use baked_template::RenderOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A small blog: a home page, two dated posts, a draft and an image.
    fn blog(root: &Path) {
        write(root, "site.yaml", b"title: My Blog\nurl: https://example.com\n");
        write(root, "pages/meta.yaml", b"author: Site Author\n");
        write(root, "pages/index.md", b"---\ntitle: Home\n---\n# Welcome\n");
        write(root, "pages/blog/meta.yaml", b"template: post.html\ncategory: blog\n");
        write(
            root,
            "pages/blog/first.md",
            b"---\ntitle: First Post\ndate: 2024-01-01\n---\nHello\n\n![A cat](cat.png)\n",
        );
        write(
            root,
            "pages/blog/second.md",
            b"---\ntitle: Fish & Chips\ndate: 2024-01-02\nauthor: Guest\n---\nSecond <em>post</em>\n",
        );
        write(
            root,
            "pages/blog/draft.md",
            b"---\ntitle: Unfinished\nisDraft: true\n---\nTODO\n",
        );
        write(
            root,
            "assets/templates/base.html",
            b"<html><head><title>{% block title %}{{ site.title }}{% endblock %}</title>{{ 'main.css' | css }}</head>\
<body>{% block content %}{{ page.content | safe }}{% endblock %}</body></html>",
        );
        write(
            root,
            "assets/templates/post.html",
            b"{% extends \"base.html\" %}{% block title %}{{ page.title }}{% endblock %}\
{% block content %}<article>{{ page.content | safe }}</article><p>{{ author }}</p>\
{% if prev_page %}<a href=\"/{{ prev_page.slug }}/\">older</a>{% endif %}{% endblock %}",
        );
        write(root, "assets/css/main.css", b"body{margin:0}");
        write(root, "assets/images/cat.png", b"\x89PNG fake");
    }

    fn build(include_drafts: bool) -> (TempDir, Baker) {
        build_with(include_drafts, &[])
    }

    fn build_with(include_drafts: bool, extra: &[(&str, &[u8])]) -> (TempDir, Baker) {
        let dir = TempDir::new().unwrap();
        let content = dir.path().join("site");
        blog(&content);
        for (rel, body) in extra {
            write(&content, rel, body);
        }

        let store = Store::open_in_memory().unwrap();
        let options = IngestOptions {
            include_drafts,
            output_dir: dir.path().join("dist"),
            ..IngestOptions::default()
        };
        ingest(&content, &store, &options).unwrap();

        (dir, Baker::new(Arc::new(store), RenderOptions::default()))
    }

    #[test]
    fn test_home_page_uses_base_template() {
        let (_dir, baker) = build(false);
        let html = baker.render_slug("index").unwrap();

        assert!(html.contains("<title>My Blog</title>"), "{html}");
        assert!(html.contains("<style>body{margin:0}</style>"), "{html}");
        assert!(html.contains("<h1>Welcome</h1>"), "{html}");
    }

    #[test]
    fn test_post_extends_base() {
        let (_dir, baker) = build(false);
        let html = baker.render_slug("blog/second").unwrap();

        assert!(html.starts_with("<html><head><title>Fish &amp; Chips</title>"), "{html}");
        assert!(html.contains("<article><p>Second <em>post</em></p>\n</article>"), "{html}");
        assert!(html.contains("<p>Guest</p>"), "{html}");
        assert!(html.contains(r#"<a href="/blog/first/">older</a>"#), "{html}");
    }

    #[test]
    fn test_image_shortcode_expands() {
        let (dir, baker) = build(false);
        let html = baker.render_slug("blog/first").unwrap();

        assert!(
            html.contains(r#"<p><img src="/images/cat.png" alt="A cat"></p>"#),
            "{html}"
        );
        assert!(dir.path().join("dist/images/cat.png").is_file());
    }

    #[test]
    fn test_template_syntax_in_markdown_is_literal() {
        let (_dir, baker) = build_with(
            false,
            &[(
                "pages/syntax.md",
                b"Use `format!(\"{{}}\", x)` and `{% if x %}`.\n\n```\n{{ site.url }} {# c #}\n```\n",
            )],
        );
        let html = baker.render_slug("syntax").unwrap();

        assert!(
            html.contains(r#"<code>format!("&#123;&#123;}}", x)</code>"#),
            "{html}"
        );
        assert!(html.contains("<code>&#123;% if x %}</code>"), "{html}");
        assert!(
            html.contains("<pre><code>&#123;&#123; site.url }} &#123;# c #}\n</code></pre>"),
            "{html}"
        );
    }

    #[test]
    fn test_metadata_inheritance() {
        let (_dir, baker) = build(false);

        let first = baker.get_page("blog/first").unwrap();
        assert_eq!(first.template, "post.html");
        assert_eq!(first.metadata.get("author"), Some(&json!("Site Author")));
        assert_eq!(first.metadata.get("category"), Some(&json!("blog")));
        assert_eq!(first.published_date.as_deref(), Some("2024-01-01T00:00:00.000Z"));

        let second = baker.get_page("blog/second").unwrap();
        assert_eq!(second.metadata.get("author"), Some(&json!("Guest")));

        let home = baker.get_page("index").unwrap();
        assert_eq!(home.template, "base.html");
        assert_eq!(home.metadata.get("category"), None);
    }

    #[test]
    fn test_drafts() {
        let (_dir, baker) = build(false);
        assert!(baker.get_page("blog/draft").unwrap_err().is_not_found());
        assert_eq!(baker.slugs().unwrap(), ["blog/first", "blog/second", "index"]);

        let (_dir, baker) = build(true);
        assert_eq!(baker.get_page("blog/draft").unwrap().title, "Unfinished");
    }

    #[test]
    fn test_latest_and_search() {
        let (_dir, baker) = build(false);

        let latest: Vec<String> = baker
            .get_latest_pages(2)
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(latest, ["blog/second", "blog/first"]);

        let found: Vec<String> = baker.search("WELCOME").unwrap().into_iter().map(|p| p.slug).collect();
        assert_eq!(found, ["index"]);
    }

    #[test]
    fn test_site_metadata() {
        let (_dir, baker) = build(false);
        assert_eq!(
            baker.site_metadata().unwrap(),
            json!({"title": "My Blog", "url": "https://example.com"})
        );
    }
}
