//! Registry of named type identities
//!
//! Type hierarchies can be declared in TOML so that data coming from outside
//! the process (JSON documents tagged with `"$type"`) can be rendered with the
//! same resolution rules as native values:
//!
//! ```toml
//! [[types]]
//! name = "Shop.Entity"
//!
//! [[types]]
//! name = "Shop.Person"
//! base = "Shop.Entity"
//!
//! [[types]]
//! name = "Shop.INamed"
//! kind = "interface"
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::identity::{TypeIdentity, ARRAY_TYPE_NAME, ROOT_TYPE_NAME};

/// Errors that can occur while building or querying a type registry
#[derive(Debug, Error)]
pub enum TypeError {
    /// Two declarations share a qualified name
    #[error("duplicate type definition: {name}")]
    Duplicate { name: String },

    /// Lookup of a name nobody registered
    #[error("unknown type: {name}")]
    UnknownType { name: String },

    /// A declaration names a base that is not declared anywhere
    #[error("type {name} derives from unknown type {base}")]
    UnknownBase { name: String, base: String },

    /// Base chain loops back on itself
    #[error("circular base type chain: {chain}")]
    CircularBase { chain: String },

    /// Interfaces cannot declare a base
    #[error("interface {name} cannot declare a base type")]
    InterfaceBase { name: String },

    #[error("failed to read type registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse type registry TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// TOML structure for deserializing registries
#[derive(Deserialize)]
struct TomlRegistry {
    #[serde(default)]
    types: Vec<TomlType>,
}

#[derive(Deserialize)]
struct TomlType {
    name: String,
    base: Option<String>,
    #[serde(default)]
    kind: TomlKind,
}

#[derive(Deserialize, Default, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
enum TomlKind {
    #[default]
    Class,
    Interface,
}

/// Type identities indexed by lower-cased qualified name
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    types: HashMap<String, TypeIdentity>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, TypeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a registry from a TOML string
    pub fn from_str(content: &str) -> Result<Self, TypeError> {
        let parsed: TomlRegistry = toml::from_str(content)?;
        let mut registry = Self::new();
        registry.extend_from_decls(&parsed.types)?;
        Ok(registry)
    }

    /// Register an identity built elsewhere
    pub fn register(&mut self, identity: TypeIdentity) -> Result<(), TypeError> {
        let key = identity.qualified_name().to_ascii_lowercase();
        if self.types.contains_key(&key) || is_builtin(&key) {
            return Err(TypeError::Duplicate {
                name: identity.qualified_name().to_string(),
            });
        }
        self.types.insert(key, identity);
        Ok(())
    }

    /// Look a type up by qualified name, ignoring case
    ///
    /// A trailing `[]` yields the array type of the named element type. The
    /// root and the abstract array type are always known.
    pub fn get(&self, name: &str) -> Option<TypeIdentity> {
        let key = name.trim().to_ascii_lowercase();
        if let Some(element) = key.strip_suffix("[]") {
            return self.get(element).map(|e| TypeIdentity::array_of(&e));
        }
        match key.as_str() {
            ROOT_TYPE_NAME => Some(TypeIdentity::root()),
            ARRAY_TYPE_NAME => Some(TypeIdentity::array_base()),
            _ => self.types.get(&key).cloned(),
        }
    }

    /// Like [`TypeRegistry::get`] but reports unknown names as errors
    pub fn require(&self, name: &str) -> Result<TypeIdentity, TypeError> {
        self.get(name).ok_or_else(|| TypeError::UnknownType {
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Qualified names of all registered types
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.values().map(|t| t.qualified_name())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn extend_from_decls(&mut self, decls: &[TomlType]) -> Result<(), TypeError> {
        let mut pending: HashMap<String, &TomlType> = HashMap::new();
        for decl in decls {
            let key = decl.name.trim().to_ascii_lowercase();
            if pending.contains_key(&key) || self.types.contains_key(&key) || is_builtin(&key) {
                return Err(TypeError::Duplicate {
                    name: decl.name.clone(),
                });
            }
            pending.insert(key, decl);
        }

        // Declarations may name bases that appear later in the file
        for decl in decls {
            let mut chain = Vec::new();
            self.define(&pending, &decl.name.trim().to_ascii_lowercase(), &mut chain)?;
        }
        Ok(())
    }

    fn define(
        &mut self,
        pending: &HashMap<String, &TomlType>,
        key: &str,
        chain: &mut Vec<String>,
    ) -> Result<TypeIdentity, TypeError> {
        if let Some(existing) = self.types.get(key) {
            return Ok(existing.clone());
        }
        let decl = pending.get(key).ok_or_else(|| TypeError::UnknownType {
            name: key.to_string(),
        })?;

        if chain.iter().any(|k| k == key) {
            chain.push(key.to_string());
            return Err(TypeError::CircularBase {
                chain: chain.join(" -> "),
            });
        }

        let identity = match (decl.kind, &decl.base) {
            (TomlKind::Interface, Some(_)) => {
                return Err(TypeError::InterfaceBase {
                    name: decl.name.clone(),
                })
            }
            (TomlKind::Interface, None) => TypeIdentity::interface(decl.name.trim()),
            (TomlKind::Class, None) => TypeIdentity::class(decl.name.trim(), None),
            (TomlKind::Class, Some(base)) => {
                let base_key = base.trim().to_ascii_lowercase();
                let base_identity = if pending.contains_key(&base_key) {
                    chain.push(key.to_string());
                    let resolved = self.define(pending, &base_key, chain)?;
                    chain.pop();
                    resolved
                } else {
                    self.get(&base_key).ok_or_else(|| TypeError::UnknownBase {
                        name: decl.name.clone(),
                        base: base.clone(),
                    })?
                };
                TypeIdentity::class(decl.name.trim(), Some(&base_identity))
            }
        };

        self.types.insert(key.to_string(), identity.clone());
        Ok(identity)
    }
}

fn is_builtin(key: &str) -> bool {
    key == ROOT_TYPE_NAME || key == ARRAY_TYPE_NAME
}
