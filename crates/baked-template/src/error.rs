//! Template error type.

/// Hard template failure. Aborts rendering of the current page.
///
/// Problems local to one expression (unknown variable, unknown filter,
/// unparsable expression, missing asset) are not errors: they render as empty
/// output and are logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// Malformed tag structure.
    #[error("{template}:{line}: {message}")]
    Syntax {
        template: String,
        line: usize,
        message: String,
    },
    /// Template referenced by `extends` or `include` does not exist.
    #[error("Template not found: {name} (via {})", .chain.join(" -> "))]
    NotFound { name: String, chain: Vec<String> },
    /// `extends` chain loops back on itself.
    #[error("Template inheritance cycle: {}", .chain.join(" -> "))]
    ExtendsCycle { chain: Vec<String> },
    /// `include` nesting exceeded the limit.
    #[error("Include depth limit reached at {name}")]
    IncludeDepth { name: String },
}

impl TemplateError {
    pub(crate) fn syntax(template: &str, line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            template: template.to_owned(),
            line,
            message: message.into(),
        }
    }
}
