//! Template engine: compiles source and executes it against a [`Value`]
//!
//! Compilation goes through the parser; execution walks the resulting tree.
//! Objects reached through `{% liquefy %}` are handed back to a
//! [`NestedRenderer`] so they can be rendered with their own templates.

pub mod config;
mod eval;
mod filters;
pub mod value;

pub use config::ExecutionOptions;
pub use eval::ExecutionError;
pub use value::{Object, Value, TYPE_TAG};

use crate::error::ParseError;
use crate::parser::{parse_with_options, ParserOptions, Template};
use crate::LiquefyError;

use eval::Evaluator;

/// Renders typed objects met during execution
pub trait NestedRenderer {
    /// Render `object` with the template for its type
    ///
    /// `Ok(None)` means no template exists, and the caller falls back to the
    /// object's default text.
    fn render_nested(&self, object: &Object, depth: usize) -> Result<Option<String>, LiquefyError>;
}

/// Liquid-style template engine
#[derive(Debug, Clone, Default)]
pub struct LiquidEngine {
    parser: ParserOptions,
    execution: ExecutionOptions,
}

impl LiquidEngine {
    pub fn new(parser: ParserOptions, execution: ExecutionOptions) -> Self {
        Self { parser, execution }
    }

    pub fn parser_options(&self) -> &ParserOptions {
        &self.parser
    }

    pub fn execution_options(&self) -> &ExecutionOptions {
        &self.execution
    }

    /// Compile template source
    pub fn compile(&self, source: &str) -> Result<Template, Vec<ParseError>> {
        parse_with_options(source, &self.parser)
    }

    /// Execute a compiled template with `context` as its root
    pub fn execute(&self, template: &Template, context: &Value) -> Result<String, ExecutionError> {
        self.execute_nested(template, context, None, 0)
    }

    /// Execute at nesting `depth`, sending `liquefy` targets to `nested`
    pub fn execute_nested(
        &self,
        template: &Template,
        context: &Value,
        nested: Option<&dyn NestedRenderer>,
        depth: usize,
    ) -> Result<String, ExecutionError> {
        let mut out = String::new();
        Evaluator::new(&self.execution, context, nested, depth).render(&template.nodes, &mut out)?;
        Ok(out)
    }
}
