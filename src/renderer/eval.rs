//! Tree-walking execution of compiled templates

use std::borrow::Cow;
use std::cmp::Ordering;

use thiserror::Error;

use crate::parser::ast::{BinaryOp, Expr, Literal, Node, Output, PathSegment};
use crate::LiquefyError;

use super::config::ExecutionOptions;
use super::filters;
use super::value::{Object, Value};
use super::NestedRenderer;

/// Errors raised while a template runs
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("template exceeded the limit of {limit} steps")]
    StepLimit { limit: usize },

    #[error("nested liquefy exceeded the depth limit of {limit}")]
    DepthLimit { limit: usize },

    #[error("unknown filter '{name}'")]
    UnknownFilter { name: String },

    #[error("filter '{filter}': {message}")]
    FilterArgument { filter: String, message: String },

    #[error("cannot iterate over a value of type {found}")]
    NotIterable { found: &'static str },

    #[error("liquefying '{type_name}' failed: {source}")]
    Nested {
        type_name: String,
        #[source]
        source: Box<LiquefyError>,
    },
}

/// Name of the loop helper variable inside `for` bodies
const FORLOOP: &str = "forloop";

/// Execution state for one render
pub(crate) struct Evaluator<'a> {
    options: &'a ExecutionOptions,
    nested: Option<&'a dyn NestedRenderer>,
    depth: usize,
    root: &'a Value,
    locals: Vec<(String, Value)>,
    steps: usize,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        options: &'a ExecutionOptions,
        root: &'a Value,
        nested: Option<&'a dyn NestedRenderer>,
        depth: usize,
    ) -> Self {
        Self {
            options,
            nested,
            depth,
            root,
            locals: Vec::new(),
            steps: 0,
        }
    }

    pub(crate) fn render(&mut self, nodes: &[Node], out: &mut String) -> Result<(), ExecutionError> {
        for node in nodes {
            self.step()?;
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(output) => {
                    let value = self.output(output)?;
                    out.push_str(&value.to_string());
                }
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for branch in branches {
                        if self.eval(&branch.condition)?.is_truthy() {
                            taken = Some(branch.body.as_slice());
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_deref()) {
                        self.render(body, out)?;
                    }
                }
                Node::For {
                    variable,
                    iterable,
                    body,
                } => self.render_loop(variable, iterable, body, out)?,
                Node::Liquefy(output) => {
                    let value = self.output(output)?;
                    self.liquefy(&value, out)?;
                }
            }
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), ExecutionError> {
        self.steps += 1;
        let limit = self.options.max_steps;
        if limit > 0 && self.steps > limit {
            return Err(ExecutionError::StepLimit { limit });
        }
        Ok(())
    }

    fn render_loop(
        &mut self,
        variable: &str,
        iterable: &Expr,
        body: &[Node],
        out: &mut String,
    ) -> Result<(), ExecutionError> {
        let items = match self.eval(iterable)? {
            Value::List(items) => items,
            Value::Nil => return Ok(()),
            other => {
                return Err(ExecutionError::NotIterable {
                    found: other.type_name(),
                })
            }
        };

        let length = items.len();
        for (index, item) in items.into_iter().enumerate() {
            let forloop = Object::new()
                .with_field("index", (index + 1) as i64)
                .with_field("index0", index as i64)
                .with_field("length", length as i64)
                .with_field("first", index == 0)
                .with_field("last", index + 1 == length);
            self.locals.push((variable.to_string(), item));
            self.locals.push((FORLOOP.to_string(), Value::Object(forloop)));
            let result = self.render(body, out);
            self.locals.truncate(self.locals.len() - 2);
            result?;
        }
        Ok(())
    }

    /// Write `value` using the template of its type when there is one
    fn liquefy(&self, value: &Value, out: &mut String) -> Result<(), ExecutionError> {
        match value {
            Value::List(items) => {
                for item in items {
                    self.liquefy(item, out)?;
                }
                Ok(())
            }
            Value::Object(object) => {
                if let (Some(identity), Some(nested)) = (object.identity(), self.nested) {
                    let depth = self.depth + 1;
                    if depth > self.options.max_depth {
                        return Err(ExecutionError::DepthLimit {
                            limit: self.options.max_depth,
                        });
                    }
                    let rendered = nested.render_nested(object, depth).map_err(|e| {
                        ExecutionError::Nested {
                            type_name: identity.qualified_name().to_string(),
                            source: Box::new(e),
                        }
                    })?;
                    if let Some(text) = rendered {
                        out.push_str(&text);
                        return Ok(());
                    }
                }
                out.push_str(&value.to_string());
                Ok(())
            }
            other => {
                out.push_str(&other.to_string());
                Ok(())
            }
        }
    }

    fn output(&self, output: &Output) -> Result<Value, ExecutionError> {
        let mut value = self.eval(&output.expr)?;
        for filter in &output.filters {
            let args = filter
                .args
                .iter()
                .map(|arg| self.eval(arg))
                .collect::<Result<Vec<_>, _>>()?;
            value = filters::apply(&filter.name, value, &args)?;
        }
        Ok(value)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ExecutionError> {
        Ok(match expr {
            Expr::Literal(literal) => literal_value(literal),
            Expr::Path(segments) => self.lookup(segments).unwrap_or_default(),
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => Value::Bool(self.eval(lhs)?.is_truthy() && self.eval(rhs)?.is_truthy()),
                BinaryOp::Or => Value::Bool(self.eval(lhs)?.is_truthy() || self.eval(rhs)?.is_truthy()),
                op => Value::Bool(compare(*op, &self.eval(lhs)?, &self.eval(rhs)?)),
            },
        })
    }

    /// Resolve a variable path; loop variables shadow fields of the context
    fn lookup(&self, segments: &[PathSegment]) -> Option<Value> {
        let (PathSegment::Field(head), rest) = segments.split_first()? else {
            return None;
        };
        let start = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| name == head)
            .map(|(_, value)| value)
            .or_else(|| self.root.as_object()?.get(head))?;

        let mut current = Cow::Borrowed(start);
        for segment in rest {
            current = match current {
                Cow::Borrowed(value) => descend(value, segment)?,
                Cow::Owned(value) => Cow::Owned(descend(&value, segment)?.into_owned()),
            };
        }
        Some(current.into_owned())
    }
}

fn descend<'v>(value: &'v Value, segment: &PathSegment) -> Option<Cow<'v, Value>> {
    match segment {
        PathSegment::Field(name) => value.member(name),
        PathSegment::Index(position) => value.index(*position).map(Cow::Borrowed),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Nil => Value::Nil,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Value::Int(*n as i64),
        Literal::Number(n) => Value::Float(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    let ordered = |accept: fn(Ordering) -> bool| lhs.loose_cmp(rhs).map(accept).unwrap_or(false);
    match op {
        BinaryOp::Equal => lhs.loose_eq(rhs),
        BinaryOp::NotEqual => !lhs.loose_eq(rhs),
        BinaryOp::Less => ordered(Ordering::is_lt),
        BinaryOp::LessOrEqual => ordered(Ordering::is_le),
        BinaryOp::Greater => ordered(Ordering::is_gt),
        BinaryOp::GreaterOrEqual => ordered(Ordering::is_ge),
        BinaryOp::Contains => match lhs {
            Value::String(s) => s.contains(&rhs.to_string()),
            Value::List(items) => items.iter().any(|item| item.loose_eq(rhs)),
            Value::Object(object) => rhs.as_str().is_some_and(|key| object.get(key).is_some()),
            _ => false,
        },
        BinaryOp::And | BinaryOp::Or => false,
    }
}
