//! Type identities, their ancestry, and a registry for named types
//!
//! Templates are chosen by type, so everything upstream of resolution needs a
//! way to answer two questions about a value: what is its qualified name, and
//! what does it derive from. [`TypeIdentity`] answers both without relying on
//! compiler reflection; [`TypeRegistry`] maps names back to identities.

mod identity;
mod registry;

pub use identity::{Ancestors, TypeIdentity, TypeKind, ARRAY_TYPE_NAME, ROOT_TYPE_NAME};
pub use registry::{TypeError, TypeRegistry};
