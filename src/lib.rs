//! Object Liquefier - render objects with templates chosen by their type
//!
//! Templates live as flat files under one folder. For an object of type
//! `Shop.Model.Person` deriving from `Shop.Entity`, the first of
//! `shop.model.person.liquid`, `model.person.liquid`, `person.liquid`,
//! `shop.entity.liquid` and `entity.liquid` that exists is compiled, cached
//! under the type's name and executed with the object as its context.
//!
//! # Example
//!
//! ```rust
//! use object_liquefier::{Liquefier, Object, TypeIdentity};
//!
//! let liquefier = Liquefier::new();
//! let person = Object::typed(TypeIdentity::class("Shop.Person", None))
//!     .with_field("name", "Felipe");
//!
//! let text = liquefier.render(&person, Some("Hello {{ Name }}")).unwrap();
//! assert_eq!(text, "Hello Felipe");
//! ```

pub mod error;
pub mod liquefier;
pub mod parser;
pub mod renderer;
pub mod template;
pub mod types;

pub use error::ParseError;
pub use liquefier::{
    global, install, liquefy, Liquefiable, Liquefier, Settings, SettingsError,
    DEFAULT_TEMPLATE_FOLDER,
};
pub use parser::{parse, ParserOptions, Template};
pub use renderer::{ExecutionError, ExecutionOptions, LiquidEngine, NestedRenderer, Object, Value};
pub use template::{
    FileSystemStore, MemoryStore, NameMode, ObjectTemplateName, ResolvedTemplate, TemplateCache,
    TemplateError, TemplateResolver, TemplateStore,
};
pub use types::{TypeError, TypeIdentity, TypeKind, TypeRegistry};

use thiserror::Error;

/// Errors that can occur while rendering an object
#[derive(Debug, Error)]
pub enum LiquefyError {
    /// Template source failed to compile
    #[error("parse errors: {}", format_parse_errors(.0))]
    Syntax(Vec<ParseError>),

    /// Template could not be resolved or read
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Template failed while running
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Object could not be turned into a template context
    #[error("value error: {0}")]
    Value(#[from] serde_json::Error),
}

impl From<Vec<ParseError>> for LiquefyError {
    fn from(errors: Vec<ParseError>) -> Self {
        LiquefyError::Syntax(errors)
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
