//! Template resolution by type
//!
//! This module turns a [`TypeIdentity`](crate::types::TypeIdentity) into an
//! ordered list of candidate file names, finds the first one present in
//! storage, and caches what the engine compiles from it.
//!
//! # Example
//!
//! ```text
//! type    Shop.Model.Person : Shop.Entity
//! folder  liquefier/
//!
//! probed  liquefier/shop.model.person.liquid
//!         liquefier/model.person.liquid
//!         liquefier/person.liquid
//!         liquefier/shop.entity.liquid
//!         liquefier/entity.liquid
//! ```

mod cache;
mod name;
mod resolver;

use std::path::PathBuf;

use thiserror::Error;

pub use cache::TemplateCache;
pub use name::{NameMode, ObjectTemplateName, DEFAULT_EXTENSION};
pub use resolver::{FileSystemStore, MemoryStore, ResolvedTemplate, TemplateResolver, TemplateStore};

/// Errors that can occur during template resolution
#[derive(Debug, Error)]
pub enum TemplateError {
    /// No candidate exists in storage
    #[error("template not found: {name}")]
    NotFound { name: ObjectTemplateName },

    /// Type cannot have a template
    #[error("cannot derive template names for type '{type_name}': {reason}")]
    InvalidType { type_name: String, reason: String },

    /// Error reading a template that was found
    #[error("error reading template file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TemplateError {
    /// Create an invalid type error
    pub fn invalid_type(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidType {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Candidate names tried before giving up, if this is a not-found error
    pub fn attempted(&self) -> Option<&ObjectTemplateName> {
        match self {
            Self::NotFound { name } => Some(name),
            _ => None,
        }
    }
}
