//! Candidate template names derived from a type

use std::fmt;

use serde::Deserialize;

use crate::types::TypeIdentity;

use super::TemplateError;

/// File extension appended to every candidate name unless configured otherwise
pub const DEFAULT_EXTENSION: &str = ".liquid";

/// Separators that split a qualified type name into segments
const NAME_SEPARATORS: [char; 2] = ['.', '+'];

/// Which types contribute candidate names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMode {
    /// Only the object's own declared type
    SingleType,
    /// The object's type followed by every ancestor below the root
    #[default]
    Hierarchy,
}

/// The ordered set of template names that could render a type
///
/// `possible_names` runs from most to least specific: the fully qualified name
/// of the most derived type first, its bare leaf name after that, then the
/// next ancestor's fully qualified name, and so on. Duplicates are kept; the
/// resolver simply stops at the first one that exists.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectTemplateName {
    object_type: TypeIdentity,
    type_name: String,
    name_parts: Vec<String>,
    possible_names: Vec<String>,
}

impl ObjectTemplateName {
    /// Names for `ty` and its whole ancestry, using [`DEFAULT_EXTENSION`]
    pub fn new(ty: &TypeIdentity) -> Result<Self, TemplateError> {
        Self::with_options(ty, NameMode::Hierarchy, DEFAULT_EXTENSION)
    }

    /// Names for `ty` alone, ignoring its ancestry
    pub fn single_type(ty: &TypeIdentity) -> Result<Self, TemplateError> {
        Self::with_options(ty, NameMode::SingleType, DEFAULT_EXTENSION)
    }

    pub fn with_options(
        ty: &TypeIdentity,
        mode: NameMode,
        extension: &str,
    ) -> Result<Self, TemplateError> {
        if ty.is_root() {
            return Err(TemplateError::invalid_type(
                ty.qualified_name(),
                "no template can be chosen for the universal root type",
            ));
        }
        if ty.qualified_name().trim().is_empty() {
            return Err(TemplateError::invalid_type(
                ty.qualified_name(),
                "type has no qualified name",
            ));
        }

        let type_name = ty.qualified_name().to_lowercase();
        let name_parts = split_name(&type_name);
        let possible_names = match mode {
            NameMode::SingleType => suffix_names(&name_parts, extension),
            NameMode::Hierarchy => ty
                .ancestors()
                .flat_map(|t| suffix_names(&split_name(&t.qualified_name().to_lowercase()), extension))
                .collect(),
        };

        Ok(Self {
            object_type: ty.clone(),
            type_name,
            name_parts,
            possible_names,
        })
    }

    /// The type these names were derived from
    pub fn object_type(&self) -> &TypeIdentity {
        &self.object_type
    }

    /// Lower-cased qualified name of [`ObjectTemplateName::object_type`]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Segments of the type name, root to leaf
    pub fn name_parts(&self) -> &[String] {
        &self.name_parts
    }

    /// Every candidate in resolution order
    pub fn possible_names(&self) -> &[String] {
        &self.possible_names
    }
}

impl fmt::Display for ObjectTemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.possible_names.join(">"))
    }
}

/// Split a lower-cased qualified name on namespace and nesting separators
fn split_name(type_name: &str) -> Vec<String> {
    type_name
        .replace("::", ".")
        .split(NAME_SEPARATORS)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// `a.b.c` becomes `a.b.c`, `b.c`, `c`, each with the extension appended
fn suffix_names(parts: &[String], extension: &str) -> Vec<String> {
    (0..parts.len())
        .map(|i| format!("{}{}", parts[i..].join("."), extension))
        .collect()
}
