//! Template interpreter for baked.
//!
//! A small Jinja-like language evaluated against a read-only [`Context`]:
//!
//! - `{{ expr }}` interpolation, HTML-escaped unless piped through `safe`
//! - `{{ expr | filter }}` with `safe`, `escape`, `css`, `asset`, `upper`,
//!   `lower`, `length` and `date`
//! - `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}`
//! - `{% for item in items %}` with a `loop` object
//! - `{% extends "name" %}` with `{% block name %}` overrides
//! - `{% include "name" %}`
//! - `{% image src, alt, title %}` shortcodes
//! - `{# comments #}`
//!
//! Expressions are parsed into a small AST and interpreted; there is no
//! general-purpose evaluation. A failing expression renders as empty output
//! and is logged. Structural problems, missing templates and inheritance
//! cycles are returned as [`TemplateError`].
//!
//! Templates, assets and includes are resolved through a [`TemplateHost`].
//!
//! # Example
//!
//! ```
//! use baked_template::{Context, EmptyHost, RenderOptions, Template};
//! use serde_json::json;
//!
//! let template = Template::parse("page.html", "<h1>{{ page.title }}</h1>")?;
//! let mut context = Context::new();
//! context.insert("page", json!({"title": "Fish & Chips"}));
//!
//! let html = template.render(&context, &EmptyHost, &RenderOptions::default())?;
//! assert_eq!(html, "<h1>Fish &amp; Chips</h1>");
//! # Ok::<(), baked_template::TemplateError>(())
//! ```

mod error;
mod expr;
mod filters;
mod lexer;
mod parser;
mod render;
mod value;

use serde_json::{Map, Value};

pub use error::TemplateError;
pub use filters::{wrap_script, wrap_style};

use parser::Node;
use render::Renderer;

/// Lookups the interpreter needs from its environment.
pub trait TemplateHost {
    /// Source of the template `name`, for `extends` and `include`.
    fn load_template(&self, name: &str) -> Option<String>;

    /// Unprocessed asset content, for the `css` filter.
    fn raw_asset(&self, path: &str, kind: &str) -> Option<String>;

    /// Post-processed asset markup, for the `asset` filter.
    fn asset(&self, path: &str, kind: &str) -> Option<String>;
}

/// Host that resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyHost;

impl TemplateHost for EmptyHost {
    fn load_template(&self, _name: &str) -> Option<String> {
        None
    }

    fn raw_asset(&self, _path: &str, _kind: &str) -> Option<String> {
        None
    }

    fn asset(&self, _path: &str, _kind: &str) -> Option<String> {
        None
    }
}

/// Render settings, passed into every render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Escape interpolated values that are not marked safe.
    pub autoescape: bool,
    /// URL prefix relative `{% image %}` sources resolve under.
    pub image_prefix: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            autoescape: true,
            image_prefix: "/images".to_owned(),
        }
    }
}

/// Top-level variables visible to a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: Map<String, Value>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

impl From<Map<String, Value>> for Context {
    fn from(vars: Map<String, Value>) -> Self {
        Self { vars }
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source`. `name` identifies the template in diagnostics.
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            name: name.to_owned(),
            nodes: parser::parse(name, source)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent named by a top-level `{% extends %}`.
    pub fn extends(&self) -> Option<&str> {
        self.nodes.iter().find_map(|node| match node {
            Node::Extends { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Render against `context`, resolving parents and includes through `host`.
    pub fn render(
        &self,
        context: &Context,
        host: &dyn TemplateHost,
        options: &RenderOptions,
    ) -> Result<String, TemplateError> {
        let mut out = String::new();
        Renderer::new(context, host, options).render_template(self, &mut out)?;
        Ok(out)
    }
}

/// Parse and render in one step.
pub fn render(
    name: &str,
    source: &str,
    context: &Context,
    host: &dyn TemplateHost,
    options: &RenderOptions,
) -> Result<String, TemplateError> {
    Template::parse(name, source)?.render(context, host, options)
}
