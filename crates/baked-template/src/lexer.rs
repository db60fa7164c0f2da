//! Template source tokenizer.
//!
//! Splits source text into literal text, `{{ output }}`, `{% tag %}` and
//! `{# comment #}` tokens. Closing delimiters inside quoted strings are not
//! treated as the end of the token, comments included.

use crate::TemplateError;

/// A lexed token. Bodies are trimmed and borrowed from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token<'a> {
    Text(&'a str),
    Output { body: &'a str, line: usize },
    Tag { body: &'a str, line: usize },
}

#[derive(Clone, Copy)]
enum Delim {
    Output,
    Tag,
    Comment,
}

impl Delim {
    fn close(self) -> &'static str {
        match self {
            Self::Output => "}}",
            Self::Tag => "%}",
            Self::Comment => "#}",
        }
    }
}

/// Tokenize `source`. `name` is used in error messages.
pub(crate) fn tokenize<'a>(name: &str, source: &'a str) -> Result<Vec<Token<'a>>, TemplateError> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut offset = 0;

    while let Some((start, delim)) = find_open(rest) {
        if start > 0 {
            tokens.push(Token::Text(&rest[..start]));
        }
        let line = line_at(source, offset + start);
        let inner = &rest[start + 2..];

        // Comments are prose, so an unbalanced apostrophe falls back to the
        // first `#}`.
        let end = match delim {
            Delim::Comment => find_close(inner, delim.close()).or_else(|| inner.find(delim.close())),
            Delim::Output | Delim::Tag => find_close(inner, delim.close()),
        }
        .ok_or_else(|| {
            TemplateError::syntax(name, line, format!("unclosed {}", &rest[start..start + 2]))
        })?;

        let body = inner[..end].trim();
        match delim {
            Delim::Output => tokens.push(Token::Output { body, line }),
            Delim::Tag => tokens.push(Token::Tag { body, line }),
            Delim::Comment => {}
        }

        let consumed = start + 2 + end + 2;
        rest = &rest[consumed..];
        offset += consumed;
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest));
    }
    Ok(tokens)
}

/// Position and kind of the next opening delimiter.
fn find_open(s: &str) -> Option<(usize, Delim)> {
    let bytes = s.as_bytes();
    let mut from = 0;
    while let Some(pos) = s[from..].find('{') {
        let at = from + pos;
        match bytes.get(at + 1) {
            Some(b'{') => return Some((at, Delim::Output)),
            Some(b'%') => return Some((at, Delim::Tag)),
            Some(b'#') => return Some((at, Delim::Comment)),
            _ => from = at + 1,
        }
    }
    None
}

/// Offset of `close` in `s`, skipping over quoted strings.
fn find_close(s: &str, close: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            _ if s[i..].starts_with(close) => return Some(i),
            _ => {}
        }
    }
    None
}

/// 1-based line number of byte offset `pos`.
fn line_at(source: &str, pos: usize) -> usize {
    source[..pos].bytes().filter(|&b| b == b'\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_mixed() {
        let tokens = tokenize("t", "<h1>{{ page.title }}</h1>{% if x %}y{% endif %}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("<h1>"),
                Token::Output {
                    body: "page.title",
                    line: 1
                },
                Token::Text("</h1>"),
                Token::Tag { body: "if x", line: 1 },
                Token::Text("y"),
                Token::Tag {
                    body: "endif",
                    line: 1
                },
            ]
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        let tokens = tokenize("t", "a{# {{ nothing }} #}b").unwrap();
        assert_eq!(tokens, vec![Token::Text("a"), Token::Text("b")]);
    }

    #[test]
    fn test_comment_close_inside_string_is_skipped() {
        let tokens = tokenize("t", r##"a{# {% set x = "#}" %} #}b"##).unwrap();
        assert_eq!(tokens, vec![Token::Text("a"), Token::Text("b")]);
    }

    #[test]
    fn test_comment_with_apostrophe() {
        let tokens = tokenize("t", "a{# don't render #}b{{ x }}").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Text("a"),
                Token::Text("b"),
                Token::Output { body: "x", line: 1 },
            ]
        );
    }

    #[test]
    fn test_unclosed_comment() {
        let err = tokenize("t", "{# never closed").unwrap_err();
        assert_eq!(err, TemplateError::syntax("t", 1, "unclosed {#"));
    }

    #[test]
    fn test_close_inside_string_is_skipped() {
        let tokens = tokenize("t", r#"{{ "a }} b" }}"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Output {
                body: r#""a }} b""#,
                line: 1
            }]
        );
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let tokens = tokenize("t", r#"{% image "a\"%}", "b" %}"#).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Tag {
                body: r#"image "a\"%}", "b""#,
                line: 1
            }]
        );
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("t", "a\nb\n{{ x }}").unwrap();
        assert_eq!(tokens[1], Token::Output { body: "x", line: 3 });
    }

    #[test]
    fn test_lone_braces_are_text() {
        let tokens = tokenize("t", "body { color: red }").unwrap();
        assert_eq!(tokens, vec![Token::Text("body { color: red }")]);
    }

    #[test]
    fn test_unclosed_output() {
        let err = tokenize("page.html", "ok\n{{ oops").unwrap_err();
        assert_eq!(
            err,
            TemplateError::syntax("page.html", 2, "unclosed {{")
        );
    }
}
