//! Tree-walking renderer.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value, json};

use crate::expr::{CmpOp, Expr};
use crate::filters::{self, Evaluated, escape};
use crate::parser::{Expression, Node};
use crate::value::{attr, compare, equals, index, is_truthy, to_text};
use crate::{Context, RenderOptions, Template, TemplateError, TemplateHost};

/// Maximum nesting of `{% include %}`.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Block body together with the template that defined it.
struct BlockDef {
    template: String,
    body: Vec<Node>,
}

pub(crate) struct Renderer<'a> {
    host: &'a dyn TemplateHost,
    options: &'a RenderOptions,
    globals: &'a Context,
    /// Loop scopes, innermost last.
    scopes: Vec<Map<String, Value>>,
    /// Effective block bodies of the template being rendered.
    blocks: HashMap<String, Rc<BlockDef>>,
    /// Template currently being rendered, for diagnostics.
    current: String,
    include_depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(
        globals: &'a Context,
        host: &'a dyn TemplateHost,
        options: &'a RenderOptions,
    ) -> Self {
        Self {
            host,
            options,
            globals,
            scopes: Vec::new(),
            blocks: HashMap::new(),
            current: String::new(),
            include_depth: 0,
        }
    }

    /// Render `template`, resolving its `extends` chain through the host.
    pub fn render_template(
        &mut self,
        template: &Template,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        let mut chain = vec![template.name.clone()];
        let mut blocks = HashMap::new();
        collect_blocks(&template.name, &template.nodes, &mut blocks);

        let mut root: Option<Template> = None;
        let mut parent = template.extends().map(str::to_owned);
        while let Some(name) = parent {
            if chain.contains(&name) {
                chain.push(name);
                return Err(TemplateError::ExtendsCycle { chain });
            }
            let loaded = self.load(&name, &chain)?;
            chain.push(name);
            collect_blocks(&loaded.name, &loaded.nodes, &mut blocks);
            parent = loaded.extends().map(str::to_owned);
            root = Some(loaded);
        }
        let root = root.as_ref().unwrap_or(template);

        let saved_blocks = std::mem::replace(&mut self.blocks, blocks);
        let saved_current = std::mem::replace(&mut self.current, root.name.clone());
        let result = self.render_nodes(&root.nodes, out);
        self.blocks = saved_blocks;
        self.current = saved_current;
        result
    }

    fn load(&self, name: &str, chain: &[String]) -> Result<Template, TemplateError> {
        let source = self
            .host
            .load_template(name)
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_owned(),
                chain: chain.to_vec(),
            })?;
        Template::parse(name, &source)
    }

    fn render_nodes(&mut self, nodes: &[Node], out: &mut String) -> Result<(), TemplateError> {
        for node in nodes {
            self.render_node(node, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node, out: &mut String) -> Result<(), TemplateError> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output(expression) => {
                if let Some(evaluated) = self.evaluate(expression) {
                    self.emit(&evaluated, out);
                }
            }
            Node::If {
                branches,
                otherwise,
            } => {
                let taken = branches.iter().find(|(cond, _)| {
                    self.evaluate(cond)
                        .is_some_and(|e| is_truthy(&e.value))
                });
                match taken {
                    Some((_, body)) => self.render_nodes(body, out)?,
                    None => self.render_nodes(otherwise, out)?,
                }
            }
            Node::For { var, iter, body } => {
                let items = match self.evaluate(iter) {
                    Some(Evaluated {
                        value: Value::Array(items),
                        ..
                    }) => items,
                    _ => Vec::new(),
                };
                let length = items.len();
                for (i, item) in items.into_iter().enumerate() {
                    let mut scope = Map::new();
                    scope.insert(var.clone(), item);
                    scope.insert(
                        "loop".to_owned(),
                        json!({
                            "index": i + 1,
                            "index0": i,
                            "first": i == 0,
                            "last": i + 1 == length,
                            "length": length,
                        }),
                    );
                    self.scopes.push(scope);
                    let result = self.render_nodes(body, out);
                    self.scopes.pop();
                    result?;
                }
            }
            Node::Block { name, body } => match self.blocks.get(name).map(Rc::clone) {
                Some(def) => {
                    let saved = std::mem::replace(&mut self.current, def.template.clone());
                    let result = self.render_nodes(&def.body, out);
                    self.current = saved;
                    result?;
                }
                None => self.render_nodes(body, out)?,
            },
            Node::Extends { .. } => {}
            Node::Include { name, line } => {
                if self.include_depth >= MAX_INCLUDE_DEPTH {
                    return Err(TemplateError::IncludeDepth { name: name.clone() });
                }
                tracing::trace!(template = %self.current, line, include = %name, "Including template");
                let included = self.load(name, std::slice::from_ref(&self.current))?;
                self.include_depth += 1;
                let result = self.render_template(&included, out);
                self.include_depth -= 1;
                result?;
            }
            Node::Image { args, source, line } => self.image(args, source, *line, out),
        }
        Ok(())
    }

    fn emit(&self, evaluated: &Evaluated, out: &mut String) {
        let text = to_text(&evaluated.value);
        if evaluated.safe || !self.options.autoescape {
            out.push_str(&text);
        } else {
            out.push_str(&escape(&text));
        }
    }

    /// `{% image src, alt, title %}`.
    fn image(&self, args: &Result<Vec<Expr>, String>, source: &str, line: usize, out: &mut String) {
        let values = args.as_ref().map_err(Clone::clone).and_then(|exprs| {
            exprs
                .iter()
                .map(|e| self.eval(e).map(|v| to_text(&v.value)))
                .collect::<Result<Vec<_>, _>>()
        });
        let values = match values {
            Ok(values) if values.first().is_some_and(|src| !src.is_empty()) => values,
            Ok(_) => {
                self.warn(line, source, "image needs a source");
                return;
            }
            Err(message) => {
                self.warn(line, source, &message);
                return;
            }
        };

        let src = &values[0];
        let file_name = src.rsplit('/').next().unwrap_or(src);
        let resolved = resolve_image_src(src, &self.options.image_prefix);
        let alt = values
            .get(1)
            .filter(|a| !a.is_empty())
            .map_or(file_name, String::as_str);

        out.push_str(&format!(
            r#"<img src="{}" alt="{}""#,
            escape(&resolved),
            escape(alt)
        ));
        if let Some(title) = values.get(2).filter(|t| !t.is_empty()) {
            out.push_str(&format!(r#" title="{}""#, escape(title)));
        }
        out.push('>');
    }

    /// Evaluate an expression, logging and discarding failures.
    fn evaluate(&self, expression: &Expression) -> Option<Evaluated> {
        let result = match &expression.parsed {
            Ok(expr) => self.eval(expr),
            Err(message) => Err(message.clone()),
        };
        match result {
            Ok(evaluated) => Some(evaluated),
            Err(message) => {
                self.warn(expression.line, &expression.source, &message);
                None
            }
        }
    }

    fn warn(&self, line: usize, source: &str, message: &str) {
        tracing::warn!(
            template = %self.current,
            line,
            expression = source,
            "Template expression failed: {message}"
        );
    }

    fn eval(&self, expr: &Expr) -> Result<Evaluated, String> {
        Ok(match expr {
            Expr::Literal(value) => Evaluated::plain(value.clone()),
            Expr::Var(name) => Evaluated::plain(self.lookup(name)),
            Expr::Attr(base, name) => Evaluated::plain(attr(&self.eval(base)?.value, name)),
            Expr::Index(base, key) => {
                let base = self.eval(base)?;
                let key = self.eval(key)?;
                Evaluated::plain(index(&base.value, &key.value))
            }
            Expr::Not(inner) => Evaluated::plain(Value::Bool(!is_truthy(&self.eval(inner)?.value))),
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if is_truthy(&left.value) {
                    self.eval(right)?
                } else {
                    left
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if is_truthy(&left.value) {
                    left
                } else {
                    self.eval(right)?
                }
            }
            Expr::Compare(op, left, right) => {
                let left = self.eval(left)?.value;
                let right = self.eval(right)?.value;
                let result = match op {
                    CmpOp::Eq => equals(&left, &right),
                    CmpOp::Ne => !equals(&left, &right),
                    CmpOp::Lt => compare(&left, &right).is_some_and(Ordering::is_lt),
                    CmpOp::Le => compare(&left, &right).is_some_and(Ordering::is_le),
                    CmpOp::Gt => compare(&left, &right).is_some_and(Ordering::is_gt),
                    CmpOp::Ge => compare(&left, &right).is_some_and(Ordering::is_ge),
                };
                Evaluated::plain(Value::Bool(result))
            }
            Expr::Filter { expr, name, args } => {
                let input = self.eval(expr)?;
                let args = args
                    .iter()
                    .map(|a| self.eval(a).map(|e| e.value))
                    .collect::<Result<Vec<_>, _>>()?;
                filters::apply(name, input, &args, self.host)?
            }
        })
    }

    fn lookup(&self, name: &str) -> Value {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// Record every block in `nodes` unless a more derived template already did.
fn collect_blocks(template: &str, nodes: &[Node], blocks: &mut HashMap<String, Rc<BlockDef>>) {
    for node in nodes {
        match node {
            Node::Block { name, body } => {
                blocks.entry(name.clone()).or_insert_with(|| {
                    Rc::new(BlockDef {
                        template: template.to_owned(),
                        body: body.clone(),
                    })
                });
                collect_blocks(template, body, blocks);
            }
            Node::If {
                branches,
                otherwise,
            } => {
                for (_, body) in branches {
                    collect_blocks(template, body, blocks);
                }
                collect_blocks(template, otherwise, blocks);
            }
            Node::For { body, .. } => collect_blocks(template, body, blocks),
            _ => {}
        }
    }
}

/// Resolve an image source against the image URL prefix.
///
/// Absolute paths, URLs and data URIs are kept; relative paths are flattened
/// to `{prefix}/{file name}`, matching where ingestion copies images.
pub(crate) fn resolve_image_src(src: &str, prefix: &str) -> String {
    if src.starts_with('/') || src.starts_with("data:") || src.contains("://") {
        return src.to_owned();
    }
    let file_name = src.rsplit('/').next().unwrap_or(src);
    format!("{}/{file_name}", prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_image_src() {
        assert_eq!(resolve_image_src("cat.png", "/images"), "/images/cat.png");
        assert_eq!(resolve_image_src("../images/cat.png", "/images/"), "/images/cat.png");
        assert_eq!(resolve_image_src("/static/cat.png", "/images"), "/static/cat.png");
        assert_eq!(
            resolve_image_src("https://example.com/cat.png", "/images"),
            "https://example.com/cat.png"
        );
    }
}
