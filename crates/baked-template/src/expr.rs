//! Expression grammar.
//!
//! Expressions are restricted to literals, variable and attribute access,
//! subscripts, boolean logic, comparisons and filter calls:
//!
//! ```text
//! expr     := or
//! or       := and ("or" and)*
//! and      := not ("and" not)*
//! not      := "not" not | compare
//! compare  := filtered (("==" | "!=" | "<" | "<=" | ">" | ">=") filtered)?
//! filtered := postfix ("|" ident ("(" args ")")?)*
//! postfix  := primary ("." ident | "[" expr "]")*
//! primary  := string | number | "true" | "false" | "none" | ident | "(" expr ")"
//! ```

use serde_json::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Expression tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Var(String),
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Filter {
        expr: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(Value),
    Op(&'static str),
}

const OPERATORS: &[&str] = &[
    "==", "!=", "<=", ">=", "<", ">", ".", "|", "[", "]", "(", ")", ",",
];

fn lex(src: &str) -> Result<Vec<Tok>, String> {
    let mut toks = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '\'' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                match ch {
                    '\\' => match chars.next() {
                        Some((_, 'n')) => s.push('\n'),
                        Some((_, 't')) => s.push('\t'),
                        Some((_, other)) => s.push(other),
                        None => break,
                    },
                    _ if ch == c => {
                        closed = true;
                        break;
                    }
                    _ => s.push(ch),
                }
            }
            if !closed {
                return Err("unterminated string".to_owned());
            }
            toks.push(Tok::Str(s));
        } else if c.is_ascii_digit() {
            // After `.` a number is an index (`items.0.name`), never a float.
            let integer_only = toks.last() == Some(&Tok::Op("."));
            let mut end = i;
            while let Some(&(j, d)) = chars.peek() {
                if d.is_ascii_digit() || (d == '.' && !integer_only) {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &src[i..end];
            let num = if text.contains('.') {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            } else {
                text.parse::<i64>().ok().map(Value::from)
            };
            toks.push(Tok::Num(num.ok_or_else(|| format!("invalid number {text:?}"))?));
        } else if c.is_alphabetic() || c == '_' {
            let mut end = i;
            while let Some(&(j, d)) = chars.peek() {
                if d.is_alphanumeric() || d == '_' {
                    end = j + d.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            toks.push(Tok::Ident(src[i..end].to_owned()));
        } else if let Some(op) = OPERATORS.iter().find(|op| src[i..].starts_with(**op)) {
            for _ in 0..op.len() {
                chars.next();
            }
            toks.push(Tok::Op(*op));
        } else {
            return Err(format!("unexpected character {c:?}"));
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Ident(i)) if i == kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), String> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(format!("expected '{op}'"))
        }
    }

    fn ident(&mut self) -> Result<String, String> {
        match self.next() {
            Some(Tok::Ident(name)) => Ok(name),
            _ => Err("expected a name".to_owned()),
        }
    }

    fn expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.eat_keyword("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.not()?;
        while self.eat_keyword("and") {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, String> {
        if self.eat_keyword("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, String> {
        let left = self.filtered()?;
        let op = match self.peek() {
            Some(Tok::Op("==")) => CmpOp::Eq,
            Some(Tok::Op("!=")) => CmpOp::Ne,
            Some(Tok::Op("<")) => CmpOp::Lt,
            Some(Tok::Op("<=")) => CmpOp::Le,
            Some(Tok::Op(">")) => CmpOp::Gt,
            Some(Tok::Op(">=")) => CmpOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.filtered()?;
        Ok(Expr::Compare(op, Box::new(left), Box::new(right)))
    }

    fn filtered(&mut self) -> Result<Expr, String> {
        let mut expr = self.postfix()?;
        while self.eat_op("|") {
            let name = self.ident()?;
            let mut args = Vec::new();
            if self.eat_op("(") && !self.eat_op(")") {
                args = self.list()?;
                self.expect_op(")")?;
            }
            expr = Expr::Filter {
                expr: Box::new(expr),
                name,
                args,
            };
        }
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_op(".") {
                let name = match self.next() {
                    Some(Tok::Ident(name)) => name,
                    Some(Tok::Num(Value::Number(n))) if n.is_u64() => n.to_string(),
                    _ => return Err("expected an attribute name after '.'".to_owned()),
                };
                expr = Expr::Attr(Box::new(expr), name);
            } else if self.eat_op("[") {
                let key = self.expr()?;
                self.expect_op("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(key));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Num(n)) => Ok(Expr::Literal(n)),
            Some(Tok::Ident(name)) => Ok(match name.as_str() {
                "true" | "True" => Expr::Literal(Value::Bool(true)),
                "false" | "False" => Expr::Literal(Value::Bool(false)),
                "none" | "None" | "null" => Expr::Literal(Value::Null),
                _ => Expr::Var(name),
            }),
            Some(Tok::Op("(")) => {
                let inner = self.expr()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Some(Tok::Op(op)) => Err(format!("unexpected '{op}'")),
            None => Err("expected an expression".to_owned()),
        }
    }

    fn list(&mut self) -> Result<Vec<Expr>, String> {
        let mut items = vec![self.expr()?];
        while self.eat_op(",") {
            items.push(self.expr()?);
        }
        Ok(items)
    }

    fn finish(&self) -> Result<(), String> {
        match self.peek() {
            None => Ok(()),
            Some(tok) => Err(format!("unexpected trailing {}", describe(tok))),
        }
    }
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(name) => format!("'{name}'"),
        Tok::Str(s) => format!("string {s:?}"),
        Tok::Num(n) => format!("number {n}"),
        Tok::Op(op) => format!("'{op}'"),
    }
}

/// Parse a single expression.
pub(crate) fn parse(src: &str) -> Result<Expr, String> {
    let mut parser = Parser {
        toks: lex(src)?,
        pos: 0,
    };
    let expr = parser.expr()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a comma-separated list of expressions. Empty input is an empty list.
pub(crate) fn parse_list(src: &str) -> Result<Vec<Expr>, String> {
    let toks = lex(src)?;
    if toks.is_empty() {
        return Ok(Vec::new());
    }
    let mut parser = Parser { toks, pos: 0 };
    let items = parser.list()?;
    parser.finish()?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.to_owned()))
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse("page.data.title").unwrap(),
            Expr::Attr(
                Box::new(Expr::Attr(var("page"), "data".to_owned())),
                "title".to_owned()
            )
        );
    }

    #[test]
    fn test_parse_numeric_attribute_chain() {
        assert_eq!(
            parse("items.0.name").unwrap(),
            Expr::Attr(
                Box::new(Expr::Attr(var("items"), "0".to_owned())),
                "name".to_owned()
            )
        );
        assert_eq!(
            parse("rows.1.2").unwrap(),
            Expr::Attr(
                Box::new(Expr::Attr(var("rows"), "1".to_owned())),
                "2".to_owned()
            )
        );
        assert_eq!(
            parse("x == 0.5").unwrap(),
            Expr::Compare(CmpOp::Eq, var("x"), Box::new(Expr::Literal(json!(0.5))))
        );
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(
            parse("items[0]").unwrap(),
            Expr::Index(var("items"), Box::new(Expr::Literal(json!(0))))
        );
        assert_eq!(
            parse("m['k']").unwrap(),
            Expr::Index(var("m"), Box::new(Expr::Literal(json!("k"))))
        );
    }

    #[test]
    fn test_parse_filters_with_args() {
        assert_eq!(
            parse("d | date('%Y') | upper").unwrap(),
            Expr::Filter {
                expr: Box::new(Expr::Filter {
                    expr: var("d"),
                    name: "date".to_owned(),
                    args: vec![Expr::Literal(json!("%Y"))],
                }),
                name: "upper".to_owned(),
                args: Vec::new(),
            }
        );
    }

    #[test]
    fn test_precedence() {
        // not binds tighter than and, and tighter than or.
        assert_eq!(
            parse("a or not b and c == 1").unwrap(),
            Expr::Or(
                var("a"),
                Box::new(Expr::And(
                    Box::new(Expr::Not(var("b"))),
                    Box::new(Expr::Compare(
                        CmpOp::Eq,
                        var("c"),
                        Box::new(Expr::Literal(json!(1)))
                    )),
                )),
            )
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("true").unwrap(), Expr::Literal(json!(true)));
        assert_eq!(parse("none").unwrap(), Expr::Literal(Value::Null));
        assert_eq!(parse("1.5").unwrap(), Expr::Literal(json!(1.5)));
        assert_eq!(parse(r#""a\"b""#).unwrap(), Expr::Literal(json!("a\"b")));
    }

    #[test]
    fn test_parse_list() {
        let items = parse_list(r#""a.png", "A", "T""#).unwrap();
        assert_eq!(items.len(), 3);
        assert!(parse_list("").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_arbitrary_code() {
        assert!(parse("page.title; drop()").is_err());
        assert!(parse("a + b").is_err());
        assert!(parse("f(x)").is_err());
        assert!(parse("").is_err());
        assert!(parse("'open").is_err());
    }
}
