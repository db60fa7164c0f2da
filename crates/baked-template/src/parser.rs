//! Template structure parser: tokens to a node tree.

use crate::TemplateError;
use crate::expr::{self, Expr};
use crate::lexer::{Token, tokenize};

/// A parsed expression, kept with its source for diagnostics.
///
/// Parse failures are kept rather than raised: the expression renders as
/// empty output and a warning is logged.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expression {
    pub source: String,
    pub line: usize,
    pub parsed: Result<Expr, String>,
}

impl Expression {
    fn new(source: &str, line: usize) -> Self {
        Self {
            source: source.to_owned(),
            line,
            parsed: expr::parse(source),
        }
    }
}

/// Template node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Output(Expression),
    If {
        branches: Vec<(Expression, Vec<Node>)>,
        otherwise: Vec<Node>,
    },
    For {
        var: String,
        iter: Expression,
        body: Vec<Node>,
    },
    Block {
        name: String,
        body: Vec<Node>,
    },
    Extends {
        name: String,
    },
    Include {
        name: String,
        line: usize,
    },
    Image {
        args: Result<Vec<Expr>, String>,
        source: String,
        line: usize,
    },
}

/// Open construct awaiting its end tag.
enum Frame {
    Root,
    If {
        branches: Vec<(Expression, Vec<Node>)>,
        /// Condition of the branch being collected, `None` once in `else`.
        current: Option<Expression>,
        line: usize,
    },
    For {
        var: String,
        iter: Expression,
        line: usize,
    },
    Block {
        name: String,
        line: usize,
    },
}

impl Frame {
    fn describe(&self) -> &'static str {
        match self {
            Self::Root => "template",
            Self::If { .. } => "if",
            Self::For { .. } => "for",
            Self::Block { .. } => "block",
        }
    }

    fn line(&self) -> usize {
        match self {
            Self::Root => 1,
            Self::If { line, .. } | Self::For { line, .. } | Self::Block { line, .. } => *line,
        }
    }
}

/// Parse template source into nodes.
pub(crate) fn parse(name: &str, source: &str) -> Result<Vec<Node>, TemplateError> {
    let tokens = tokenize(name, source)?;
    let mut stack: Vec<(Frame, Vec<Node>)> = vec![(Frame::Root, Vec::new())];

    for token in tokens {
        match token {
            Token::Text(text) => push(&mut stack, Node::Text(text.to_owned())),
            Token::Output { body, line } => {
                push(&mut stack, Node::Output(Expression::new(body, line)));
            }
            Token::Tag { body, line } => tag(name, &mut stack, body, line)?,
        }
    }

    let (frame, nodes) = stack.pop().unwrap_or((Frame::Root, Vec::new()));
    match frame {
        Frame::Root => Ok(nodes),
        open => Err(TemplateError::syntax(
            name,
            open.line(),
            format!("unclosed {{% {} %}}", open.describe()),
        )),
    }
}

fn push(stack: &mut [(Frame, Vec<Node>)], node: Node) {
    if let Some((_, nodes)) = stack.last_mut() {
        nodes.push(node);
    }
}

fn tag(
    name: &str,
    stack: &mut Vec<(Frame, Vec<Node>)>,
    body: &str,
    line: usize,
) -> Result<(), TemplateError> {
    let (keyword, rest) = body
        .split_once(char::is_whitespace)
        .map_or((body, ""), |(k, r)| (k, r.trim()));

    match keyword {
        "if" => stack.push((
            Frame::If {
                branches: Vec::new(),
                current: Some(Expression::new(rest, line)),
                line,
            },
            Vec::new(),
        )),
        "elif" | "else" => {
            let Some((Frame::If { branches, current, .. }, nodes)) = stack.last_mut() else {
                return Err(TemplateError::syntax(
                    name,
                    line,
                    format!("{{% {keyword} %}} outside of {{% if %}}"),
                ));
            };
            let Some(finished) = current.take() else {
                return Err(TemplateError::syntax(
                    name,
                    line,
                    format!("{{% {keyword} %}} after {{% else %}}"),
                ));
            };
            branches.push((finished, std::mem::take(nodes)));
            if keyword == "elif" {
                *current = Some(Expression::new(rest, line));
            }
        }
        "endif" => match close(name, stack, "endif", line)? {
            (
                Frame::If {
                    mut branches,
                    current,
                    ..
                },
                nodes,
            ) => {
                let otherwise = match current {
                    Some(cond) => {
                        branches.push((cond, nodes));
                        Vec::new()
                    }
                    None => nodes,
                };
                push(stack, Node::If { branches, otherwise });
            }
            (frame, _) => return Err(mismatch(name, &frame, "endif", line)),
        },
        "for" => {
            let Some((var, iter)) = rest.split_once(" in ") else {
                return Err(TemplateError::syntax(
                    name,
                    line,
                    "expected {% for <name> in <expr> %}",
                ));
            };
            let var = var.trim();
            if !is_identifier(var) {
                return Err(TemplateError::syntax(
                    name,
                    line,
                    format!("invalid loop variable {var:?}"),
                ));
            }
            stack.push((
                Frame::For {
                    var: var.to_owned(),
                    iter: Expression::new(iter.trim(), line),
                    line,
                },
                Vec::new(),
            ));
        }
        "endfor" => match close(name, stack, "endfor", line)? {
            (Frame::For { var, iter, .. }, body) => push(stack, Node::For { var, iter, body }),
            (frame, _) => return Err(mismatch(name, &frame, "endfor", line)),
        },
        "block" => {
            if !is_identifier(rest) {
                return Err(TemplateError::syntax(
                    name,
                    line,
                    format!("invalid block name {rest:?}"),
                ));
            }
            stack.push((
                Frame::Block {
                    name: rest.to_owned(),
                    line,
                },
                Vec::new(),
            ));
        }
        "endblock" => match close(name, stack, "endblock", line)? {
            (Frame::Block { name: block, .. }, body) => {
                if !rest.is_empty() && rest != block {
                    return Err(TemplateError::syntax(
                        name,
                        line,
                        format!("{{% endblock {rest} %}} closes block {block:?}"),
                    ));
                }
                push(stack, Node::Block { name: block, body });
            }
            (frame, _) => return Err(mismatch(name, &frame, "endblock", line)),
        },
        "extends" => {
            if stack.len() > 1 {
                return Err(TemplateError::syntax(
                    name,
                    line,
                    "{% extends %} must be at the top level",
                ));
            }
            let parent = string_argument(name, rest, line, "extends")?;
            push(stack, Node::Extends { name: parent });
        }
        "include" => {
            let included = string_argument(name, rest, line, "include")?;
            push(stack, Node::Include { name: included, line });
        }
        "image" => push(
            stack,
            Node::Image {
                args: expr::parse_list(rest),
                source: rest.to_owned(),
                line,
            },
        ),
        other => {
            return Err(TemplateError::syntax(
                name,
                line,
                format!("unknown tag {other:?}"),
            ));
        }
    }
    Ok(())
}

/// Pop the innermost open construct for an end tag.
fn close(
    name: &str,
    stack: &mut Vec<(Frame, Vec<Node>)>,
    end: &str,
    line: usize,
) -> Result<(Frame, Vec<Node>), TemplateError> {
    if stack.len() < 2 {
        return Err(TemplateError::syntax(name, line, format!("unexpected {{% {end} %}}")));
    }
    stack
        .pop()
        .ok_or_else(|| TemplateError::syntax(name, line, format!("unexpected {{% {end} %}}")))
}

fn mismatch(name: &str, open: &Frame, end: &str, line: usize) -> TemplateError {
    TemplateError::syntax(
        name,
        line,
        format!(
            "{{% {end} %}} does not close {{% {} %}} opened on line {}",
            open.describe(),
            open.line()
        ),
    )
}

/// Parse the single string literal argument of `extends` / `include`.
fn string_argument(
    name: &str,
    rest: &str,
    line: usize,
    tag: &str,
) -> Result<String, TemplateError> {
    match expr::parse(rest) {
        Ok(Expr::Literal(serde_json::Value::String(s))) => Ok(s),
        _ => Err(TemplateError::syntax(
            name,
            line,
            format!("{{% {tag} %}} expects a quoted template name"),
        )),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}
