//! Markdown mixer.
//!
//! Splits the YAML front matter from the body, merges it over the inherited
//! metadata and renders the body to HTML. Images are emitted as
//! `{% image "src", "alt", "title" %}` shortcodes so the final URL is decided
//! at render time. No heading ids are generated.
//!
//! Stored content is rendered as a template, so `{` in text and code is
//! written as `&#123;`. The shortcodes are the only delimiters the output
//! carries.

use std::path::Path;
use std::sync::LazyLock;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};
use regex::Regex;

use super::Mixed;
use crate::LoadError;
use crate::meta::{self, Metadata};

/// Markdown parsing options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkdownOptions {
    /// Enable GitHub Flavored Markdown (tables, strikethrough, task lists).
    pub gfm: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl MarkdownOptions {
    fn parser_options(self) -> Options {
        if self.gfm {
            Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS
                | Options::ENABLE_GFM
        } else {
            Options::empty()
        }
    }
}

static FRONT_MATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)(.*)\z").unwrap()
});

/// Split `content` into front matter text (if any) and body.
fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    match FRONT_MATTER_RE.captures(content) {
        Some(caps) => {
            let yaml = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2).map_or("", |m| m.as_str());
            (Some(yaml), body)
        }
        None => (None, content),
    }
}

pub(super) fn mix(
    path: &Path,
    content: &str,
    inherited: &Metadata,
    options: &MarkdownOptions,
) -> Result<Mixed, LoadError> {
    let (front, body) = split_front_matter(content);

    let metadata = match front {
        Some(yaml) => {
            let local = meta::parse(yaml).map_err(|message| LoadError::FrontMatter {
                path: path.to_path_buf(),
                message,
            })?;
            meta::overlay(inherited, local)
        }
        None => inherited.clone(),
    };

    Ok(Mixed {
        content: render(body, *options),
        metadata,
    })
}

/// Render Markdown to HTML with images replaced by shortcodes.
pub(crate) fn render(markdown: &str, options: MarkdownOptions) -> String {
    let parser = Parser::new_ext(markdown, options.parser_options());
    let events = ImageShortcodes::new(parser).map(escape_braces);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Pending image while its alt text is collected.
struct PendingImage {
    src: String,
    title: String,
    alt: String,
}

/// Event adapter replacing `Tag::Image ... TagEnd::Image` with one inline
/// shortcode event.
struct ImageShortcodes<I> {
    inner: I,
}

impl<I> ImageShortcodes<I> {
    fn new(inner: I) -> Self {
        Self { inner }
    }
}

impl<'a, I: Iterator<Item = Event<'a>>> Iterator for ImageShortcodes<I> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.inner.next()?;
        let Event::Start(Tag::Image {
            dest_url, title, ..
        }) = event
        else {
            return Some(event);
        };

        let mut image = PendingImage {
            src: dest_url.into_string(),
            title: title.into_string(),
            alt: String::new(),
        };
        // Nested images are not valid alt text; track depth to find our end tag.
        let mut depth = 0usize;
        for inner in self.inner.by_ref() {
            match inner {
                Event::Start(Tag::Image { .. }) => depth += 1,
                Event::End(TagEnd::Image) if depth == 0 => break,
                Event::End(TagEnd::Image) => depth -= 1,
                Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
                Event::SoftBreak | Event::HardBreak => image.alt.push(' '),
                _ => {}
            }
        }

        Some(Event::InlineHtml(CowStr::from(shortcode(&image))))
    }
}

/// Write text and inline code containing `{` as pre-escaped HTML.
fn escape_braces(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Text(text) if text.contains('{') => Event::InlineHtml(encode_braces(&text).into()),
        Event::Code(code) if code.contains('{') => {
            Event::InlineHtml(format!("<code>{}</code>", encode_braces(&code)).into())
        }
        other => other,
    }
}

fn encode_braces(text: &str) -> String {
    html_escape::encode_text(text).replace('{', "&#123;")
}

fn shortcode(image: &PendingImage) -> String {
    format!(
        r#"{{% image "{}", "{}", "{}" %}}"#,
        quote(&image.src),
        quote(&image.alt),
        quote(&image.title)
    )
}

/// Escape a value for a double-quoted template string literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
