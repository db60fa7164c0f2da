//! Built-in filters.

use std::fmt::Write;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use serde_json::Value;

use crate::TemplateHost;
use crate::value::to_text;

/// A value flowing through a filter pipeline.
///
/// `safe` values are emitted verbatim; everything else is escaped when
/// autoescaping is on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluated {
    pub value: Value,
    pub safe: bool,
}

impl Evaluated {
    pub fn plain(value: Value) -> Self {
        Self { value, safe: false }
    }

    pub fn markup(text: String) -> Self {
        Self {
            value: Value::String(text),
            safe: true,
        }
    }
}

/// Default format of the `date` filter.
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

static STYLE_CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</(style)").unwrap());
static SCRIPT_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(script)").unwrap());

/// Wrap CSS in a `<style>` element. Embedded `</style` sequences become
/// `<\/style` so they cannot close the element early.
pub fn wrap_style(css: &str) -> String {
    format!("<style>{}</style>", STYLE_CLOSE_RE.replace_all(css, r"<\/$1"))
}

/// Wrap JavaScript in a `<script>` element, neutralising embedded `</script`.
pub fn wrap_script(js: &str) -> String {
    format!(
        "<script>{}</script>",
        SCRIPT_CLOSE_RE.replace_all(js, r"<\/$1")
    )
}

/// Escape text for HTML content and quoted attributes.
pub(crate) fn escape(text: &str) -> String {
    html_escape::encode_quoted_attribute(text).into_owned()
}

/// Asset kind implied by a path's extension, for the `asset` filter.
pub(crate) fn kind_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "css" => "css",
        "js" => "js",
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" => "images",
        _ => "components",
    }
}

/// Apply filter `name` to `input`.
///
/// Errors are messages for the render log; the caller substitutes empty
/// output.
pub(crate) fn apply(
    name: &str,
    input: Evaluated,
    args: &[Value],
    host: &dyn TemplateHost,
) -> Result<Evaluated, String> {
    match name {
        "safe" => Ok(Evaluated {
            value: input.value,
            safe: true,
        }),
        "escape" | "e" => {
            if input.safe {
                Ok(input)
            } else {
                Ok(Evaluated::markup(escape(&to_text(&input.value))))
            }
        }
        "upper" => Ok(Evaluated {
            value: Value::String(to_text(&input.value).to_uppercase()),
            safe: input.safe,
        }),
        "lower" => Ok(Evaluated {
            value: Value::String(to_text(&input.value).to_lowercase()),
            safe: input.safe,
        }),
        "length" => {
            let len = match &input.value {
                Value::Null => 0,
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::String(s) => s.chars().count(),
                other => to_text(other).chars().count(),
            };
            Ok(Evaluated::plain(Value::from(len)))
        }
        "date" => {
            let format = match args.first() {
                Some(Value::String(f)) => f.as_str(),
                Some(_) => return Err("date format must be a string".to_owned()),
                None => DEFAULT_DATE_FORMAT,
            };
            format_date(&input.value, format).map(|s| Evaluated::plain(Value::String(s)))
        }
        "css" => {
            let path = to_text(&input.value);
            let css = host
                .raw_asset(&path, "css")
                .ok_or_else(|| format!("css asset {path:?} not found"))?;
            Ok(Evaluated::markup(wrap_style(&css)))
        }
        "asset" => {
            let path = to_text(&input.value);
            let kind = kind_for_path(&path);
            let content = host
                .asset(&path, kind)
                .ok_or_else(|| format!("{kind} asset {path:?} not found"))?;
            Ok(Evaluated::markup(content))
        }
        other => Err(format!("unknown filter {other:?}")),
    }
}

/// Format an ISO-8601 timestamp or `YYYY-MM-DD` date with a strftime format.
fn format_date(value: &Value, format: &str) -> Result<String, String> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date format {format:?}"));
    }

    let text = match value {
        Value::Null => return Ok(String::new()),
        Value::String(s) => s.trim(),
        _ => return Err(format!("cannot format {value} as a date")),
    };

    let dt = if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        dt
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc().fixed_offset())
            .ok_or_else(|| format!("cannot parse {text:?} as a date"))?
    };

    let mut out = String::new();
    write!(out, "{}", dt.format_with_items(items.iter()))
        .map_err(|_| format!("cannot format {text:?} with {format:?}"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EmptyHost;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct CssHost;

    impl TemplateHost for CssHost {
        fn load_template(&self, _name: &str) -> Option<String> {
            None
        }

        fn raw_asset(&self, path: &str, kind: &str) -> Option<String> {
            (path == "style.css" && kind == "css")
                .then(|| "body { color: red; } </style><script>alert(\"xss\")</script>".to_owned())
        }

        fn asset(&self, path: &str, kind: &str) -> Option<String> {
            (path == "nav.html" && kind == "components").then(|| "<nav></nav>".to_owned())
        }
    }

    fn run(name: &str, value: Value, args: &[Value]) -> Result<Evaluated, String> {
        apply(name, Evaluated::plain(value), args, &CssHost)
    }

    #[test]
    fn test_wrap_style_escapes_close_tag() {
        let wrapped = wrap_style("a{} </STYLE> b{}");
        assert_eq!(wrapped, "<style>a{} <\\/STYLE> b{}</style>");
        assert_eq!(wrapped.matches("</style>").count(), 1);
    }

    #[test]
    fn test_wrap_script() {
        assert_eq!(
            wrap_script("let s = '</script>';"),
            "<script>let s = '<\\/script>';</script>"
        );
    }

    #[test]
    fn test_css_filter() {
        let out = run("css", json!("style.css"), &[]).unwrap();
        let html = to_text(&out.value);

        assert!(out.safe);
        assert!(html.starts_with("<style>body { color: red; }"));
        assert!(html.contains("<\\/style><script>alert(\"xss\")</script>"));
        assert!(html.ends_with("</style>"));
        assert_eq!(html.matches("</style>").count(), 1);
    }

    #[test]
    fn test_css_filter_missing_asset() {
        let err = apply("css", Evaluated::plain(json!("x.css")), &[], &EmptyHost).unwrap_err();
        assert_eq!(err, "css asset \"x.css\" not found");
    }

    #[test]
    fn test_asset_filter_infers_kind() {
        let out = run("asset", json!("nav.html"), &[]).unwrap();
        assert_eq!(out, Evaluated::markup("<nav></nav>".to_owned()));
        assert_eq!(kind_for_path("logo.PNG"), "images");
        assert_eq!(kind_for_path("site.css"), "css");
        assert_eq!(kind_for_path("README"), "components");
    }

    #[test]
    fn test_escape_and_safe() {
        let escaped = run("escape", json!("<b>"), &[]).unwrap();
        assert_eq!(escaped, Evaluated::markup("&lt;b&gt;".to_owned()));

        let safe = run("safe", json!("<b>"), &[]).unwrap();
        assert!(safe.safe);
        assert_eq!(safe.value, json!("<b>"));
    }

    #[test]
    fn test_case_and_length() {
        assert_eq!(run("upper", json!("abc"), &[]).unwrap().value, json!("ABC"));
        assert_eq!(run("lower", json!("ÀB"), &[]).unwrap().value, json!("àb"));
        assert_eq!(run("length", json!([1, 2, 3]), &[]).unwrap().value, json!(3));
        assert_eq!(run("length", json!("héllo"), &[]).unwrap().value, json!(5));
        assert_eq!(run("length", Value::Null, &[]).unwrap().value, json!(0));
    }

    #[test]
    fn test_date_filter() {
        let iso = json!("2024-01-03T10:00:00.000Z");
        assert_eq!(run("date", iso.clone(), &[]).unwrap().value, json!("2024-01-03"));
        assert_eq!(
            run("date", iso, &[json!("%d/%m/%Y")]).unwrap().value,
            json!("03/01/2024")
        );
        assert_eq!(run("date", json!("2024-02-29"), &[]).unwrap().value, json!("2024-02-29"));
        assert_eq!(run("date", Value::Null, &[]).unwrap().value, json!(""));
        assert!(run("date", json!("soon"), &[]).is_err());
        assert!(run("date", json!("2024-01-01"), &[json!("%Q")]).is_err());
    }

    #[test]
    fn test_unknown_filter() {
        assert_eq!(
            run("shout", json!("x"), &[]).unwrap_err(),
            "unknown filter \"shout\""
        );
    }
}
