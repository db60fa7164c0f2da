//! Page record construction from mixer output.

use std::path::Path;

use baked_store::PageRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::LoadError;
use crate::meta::Metadata;
use crate::mixer::Mixed;

/// Template used when a page does not name one.
pub const DEFAULT_TEMPLATE: &str = "base.html";

/// Metadata key flagging a draft page.
pub const DRAFT_KEY: &str = "isDraft";

/// Whether merged metadata marks the page as a draft.
pub(crate) fn is_draft(metadata: &Metadata) -> bool {
    metadata.get(DRAFT_KEY).and_then(Value::as_bool) == Some(true)
}

/// Build the page row for `slug`.
///
/// A scalar `title` is kept as text (`title: 1984` gives `"1984"`); only an
/// absent or null title falls back to the file stem. `template` falls back
/// to [`DEFAULT_TEMPLATE`]. Every string in the stored metadata is
/// HTML-escaped. The title column keeps the raw value; templates escape it on
/// output.
pub(crate) fn build(slug: String, path: &Path, mixed: Mixed) -> Result<PageRecord, LoadError> {
    let Mixed { content, metadata } = mixed;

    let title = match metadata.get("title") {
        None | Some(Value::Null) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        Some(value) => value_text(value),
    };
    let template = metadata
        .get("template")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TEMPLATE)
        .to_owned();
    let published_date = match metadata.get("date") {
        None | Some(Value::Null) => None,
        Some(value) => Some(normalize_date(value).ok_or_else(|| LoadError::InvalidDate {
            path: path.to_path_buf(),
            value: value_text(value),
        })?),
    };

    let escaped = escape_strings(Value::Object(metadata));

    Ok(PageRecord {
        slug,
        title,
        content,
        template,
        metadata: escaped.to_string(),
        published_date,
    })
}

/// Normalise a front matter date to `YYYY-MM-DDTHH:MM:SS.sssZ`.
///
/// Accepts RFC 3339 timestamps, `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`
/// (taken as UTC) and plain `YYYY-MM-DD` (midnight UTC).
pub(crate) fn normalize_date(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();

    let utc: DateTime<Utc> = if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        dt.with_timezone(&Utc)
    } else if let Some(naive) = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        naive.and_utc()
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };

    Some(utc.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// HTML-escape every string in `value`, recursing into arrays and objects.
fn escape_strings(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(html_escape::encode_quoted_attribute(&s).into_owned()),
        Value::Array(items) => Value::Array(items.into_iter().map(escape_strings).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, escape_strings(v)))
                .collect(),
        ),
        other => other,
    }
}
