//! Runtime type identities and the ancestry walk

use std::fmt;
use std::sync::{Arc, OnceLock};

/// Qualified name of the universal root type
pub const ROOT_TYPE_NAME: &str = "object";

/// Qualified name of the abstract base shared by every array type
pub const ARRAY_TYPE_NAME: &str = "array";

/// What kind of type an identity describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Concrete or abstract class, derives from a base class or the root
    Class,
    /// Interface, never has an ancestor of its own
    Interface,
    /// Array of some element type, derives from the abstract array type
    Array,
    /// The universal root every class eventually derives from
    Root,
}

#[derive(Debug)]
struct TypeNode {
    qualified_name: String,
    kind: TypeKind,
    ancestor: Option<TypeIdentity>,
}

/// Handle to a runtime type: qualified dotted name plus immediate ancestor
///
/// Cloning is cheap; all clones share one node. Two identities are equal when
/// their kinds match and their qualified names match ignoring ASCII case.
#[derive(Clone)]
pub struct TypeIdentity(Arc<TypeNode>);

impl TypeIdentity {
    /// The universal root type
    pub fn root() -> TypeIdentity {
        static ROOT: OnceLock<TypeIdentity> = OnceLock::new();
        ROOT.get_or_init(|| Self::from_node(ROOT_TYPE_NAME, TypeKind::Root, None))
            .clone()
    }

    /// The abstract base type of every array
    pub fn array_base() -> TypeIdentity {
        static ARRAY: OnceLock<TypeIdentity> = OnceLock::new();
        ARRAY
            .get_or_init(|| {
                Self::from_node(ARRAY_TYPE_NAME, TypeKind::Class, Some(Self::root()))
            })
            .clone()
    }

    /// A class deriving from `base`, or from the root when `base` is `None`
    pub fn class(name: impl Into<String>, base: Option<&TypeIdentity>) -> TypeIdentity {
        let ancestor = base.cloned().unwrap_or_else(Self::root);
        Self::from_node(name, TypeKind::Class, Some(ancestor))
    }

    /// An interface; interfaces have no ancestor even when they extend others
    pub fn interface(name: impl Into<String>) -> TypeIdentity {
        Self::from_node(name, TypeKind::Interface, None)
    }

    /// The array type whose elements are `element`
    pub fn array_of(element: &TypeIdentity) -> TypeIdentity {
        Self::from_node(
            format!("{}[]", element.qualified_name()),
            TypeKind::Array,
            Some(Self::array_base()),
        )
    }

    fn from_node(
        name: impl Into<String>,
        kind: TypeKind,
        ancestor: Option<TypeIdentity>,
    ) -> TypeIdentity {
        TypeIdentity(Arc::new(TypeNode {
            qualified_name: name.into(),
            kind,
            ancestor,
        }))
    }

    /// Fully qualified name as declared
    pub fn qualified_name(&self) -> &str {
        &self.0.qualified_name
    }

    pub fn kind(&self) -> TypeKind {
        self.0.kind
    }

    /// Immediate base type or base interface, if any
    pub fn ancestor(&self) -> Option<&TypeIdentity> {
        self.0.ancestor.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.0.kind == TypeKind::Root
    }

    /// Walk from this type up to, but excluding, the universal root
    ///
    /// The walk starts with the type itself. The root yields nothing.
    pub fn ancestors(&self) -> Ancestors {
        Ancestors {
            next: Some(self.clone()),
        }
    }

    /// True when `other` appears in this type's ancestry
    pub fn derives_from(&self, other: &TypeIdentity) -> bool {
        self.ancestors().any(|t| &t == other)
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.kind == other.0.kind
                && self
                    .0
                    .qualified_name
                    .eq_ignore_ascii_case(&other.0.qualified_name))
    }
}

impl Eq for TypeIdentity {}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeIdentity")
            .field("name", &self.0.qualified_name)
            .field("kind", &self.0.kind)
            .field("ancestor", &self.ancestor().map(|a| a.qualified_name()))
            .finish()
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.qualified_name)
    }
}

/// Iterator over a type's ancestry, most derived first, root excluded
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<TypeIdentity>,
}

impl Iterator for Ancestors {
    type Item = TypeIdentity;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take().filter(|t| !t.is_root())?;
        self.next = current.ancestor().cloned();
        Some(current)
    }
}

impl std::iter::FusedIterator for Ancestors {}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(ty: &TypeIdentity) -> Vec<String> {
        ty.ancestors()
            .map(|t| t.qualified_name().to_string())
            .collect()
    }

    #[test]
    fn test_root_has_empty_ancestry() {
        assert_eq!(TypeIdentity::root().ancestors().count(), 0);
    }

    #[test]
    fn test_class_chain_stops_before_root() {
        let entity = TypeIdentity::class("Shop.Entity", None);
        let person = TypeIdentity::class("Shop.Person", Some(&entity));
        let employee = TypeIdentity::class("Shop.Employee", Some(&person));

        assert_eq!(
            names(&employee),
            vec!["Shop.Employee", "Shop.Person", "Shop.Entity"]
        );
    }

    #[test]
    fn test_interface_is_its_own_ancestry() {
        let named = TypeIdentity::interface("Shop.INamed");
        assert_eq!(names(&named), vec!["Shop.INamed"]);
    }

    #[test]
    fn test_array_ancestry_includes_array_base() {
        let int = TypeIdentity::class("System.Int32", None);
        let ints = TypeIdentity::array_of(&int);

        assert_eq!(names(&ints), vec!["System.Int32[]", ARRAY_TYPE_NAME]);
        assert_eq!(ints.kind(), TypeKind::Array);
    }

    #[test]
    fn test_ancestry_is_restartable() {
        let base = TypeIdentity::class("A.Base", None);
        let derived = TypeIdentity::class("A.Derived", Some(&base));

        let walk = derived.ancestors();
        let first: Vec<_> = walk.clone().collect();
        let second: Vec<_> = walk.collect();
        assert_eq!(first, second);
        assert_eq!(first, derived.ancestors().collect::<Vec<_>>());
    }

    #[test]
    fn test_equality_ignores_case() {
        let a = TypeIdentity::class("Shop.Person", None);
        let b = TypeIdentity::class("shop.person", None);
        assert_eq!(a, b);
        assert_ne!(a, TypeIdentity::interface("Shop.Person"));
    }

    #[test]
    fn test_derives_from() {
        let base = TypeIdentity::class("A.Base", None);
        let derived = TypeIdentity::class("A.Derived", Some(&base));
        assert!(derived.derives_from(&base));
        assert!(!base.derives_from(&derived));
    }
}
