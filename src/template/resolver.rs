//! Template resolution - probes storage for the first candidate that exists

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::types::TypeIdentity;

use super::name::{NameMode, ObjectTemplateName, DEFAULT_EXTENSION};
use super::TemplateError;

/// Read access to wherever templates live
pub trait TemplateStore: Send + Sync {
    /// Whether a template exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Full contents of the template at `path`
    fn read(&self, path: &Path) -> std::io::Result<String>;
}

/// Templates stored as plain files
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemStore;

impl TemplateStore for FileSystemStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Templates held in memory, keyed by path
#[derive(Debug, Default)]
pub struct MemoryStore {
    templates: DashMap<PathBuf, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `source` at `path`, replacing anything already there
    pub fn insert(&self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.templates.insert(path.into(), source.into());
    }

    pub fn remove(&self, path: &Path) -> Option<String> {
        self.templates.remove(path).map(|(_, source)| source)
    }
}

impl TemplateStore for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.templates.contains_key(path)
    }

    fn read(&self, path: &Path) -> std::io::Result<String> {
        self.templates
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string()))
    }
}

/// Outcome of probing storage for a set of candidate names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTemplate {
    Found(PathBuf),
    NotFound,
}

impl ResolvedTemplate {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found(path) => Some(path),
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Finds the most specific template for a type under one folder
///
/// Nothing is cached here: every call probes storage again.
#[derive(Clone)]
pub struct TemplateResolver {
    folder: PathBuf,
    extension: String,
    store: Arc<dyn TemplateStore>,
}

impl TemplateResolver {
    /// Resolver over plain files in `folder`
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self::with_store(folder, Arc::new(FileSystemStore))
    }

    /// Resolver over an arbitrary store
    pub fn with_store(folder: impl Into<PathBuf>, store: Arc<dyn TemplateStore>) -> Self {
        Self {
            folder: folder.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            store,
        }
    }

    /// Use `extension` for candidates built by the type-driven methods
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Return the first candidate in `name` that exists in storage
    #[tracing::instrument(level = "trace", skip_all, fields(ty = %name.object_type()))]
    pub fn resolve(&self, name: &ObjectTemplateName) -> ResolvedTemplate {
        for candidate in name.possible_names() {
            let path = self.folder.join(candidate);
            if self.store.exists(&path) {
                tracing::trace!(path = %path.display(), "template candidate found");
                return ResolvedTemplate::Found(path);
            }
        }
        ResolvedTemplate::NotFound
    }

    /// Resolve the template for `ty` and all of its ancestors
    pub fn resolve_type(&self, ty: &TypeIdentity) -> Result<ResolvedTemplate, TemplateError> {
        self.resolve_type_with_mode(ty, NameMode::Hierarchy)
    }

    pub fn resolve_type_with_mode(
        &self,
        ty: &TypeIdentity,
        mode: NameMode,
    ) -> Result<ResolvedTemplate, TemplateError> {
        let name = ObjectTemplateName::with_options(ty, mode, &self.extension)?;
        Ok(self.resolve(&name))
    }

    /// Like [`TemplateResolver::resolve`] but a miss is an error
    pub fn resolve_template(&self, name: &ObjectTemplateName) -> Result<PathBuf, TemplateError> {
        match self.resolve(name) {
            ResolvedTemplate::Found(path) => Ok(path),
            ResolvedTemplate::NotFound => Err(TemplateError::NotFound { name: name.clone() }),
        }
    }

    /// Like [`TemplateResolver::resolve_type`] but a miss is an error
    pub fn resolve_template_for(&self, ty: &TypeIdentity) -> Result<PathBuf, TemplateError> {
        let name = ObjectTemplateName::with_options(ty, NameMode::Hierarchy, &self.extension)?;
        self.resolve_template(&name)
    }

    /// Read the source of a resolved template
    pub fn read(&self, path: &Path) -> Result<String, TemplateError> {
        self.store.read(path).map_err(|e| TemplateError::Read {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl std::fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("folder", &self.folder)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn path_type() -> TypeIdentity {
        TypeIdentity::class("System.IO.Path", None)
    }

    fn write_all_candidates(dir: &Path, name: &ObjectTemplateName) {
        for candidate in name.possible_names() {
            fs::write(dir.join(candidate), candidate).expect("Should write template");
        }
    }

    #[test]
    fn test_resolve_fully_qualified_first() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let resolver = TemplateResolver::new(dir.path());
        let name = ObjectTemplateName::new(&path_type()).expect("Should build");
        write_all_candidates(dir.path(), &name);

        let resolved = resolver.resolve(&name);
        assert_eq!(
            resolved,
            ResolvedTemplate::Found(dir.path().join(&name.possible_names()[0]))
        );
    }

    #[test]
    fn test_resolve_falls_through_missing_candidates() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let resolver = TemplateResolver::new(dir.path());
        let name = ObjectTemplateName::new(&path_type()).expect("Should build");
        write_all_candidates(dir.path(), &name);

        for (deleted, candidate) in name.possible_names().iter().enumerate() {
            fs::remove_file(dir.path().join(candidate)).expect("Should delete template");
            let expected = match name.possible_names().get(deleted + 1) {
                Some(next) => ResolvedTemplate::Found(dir.path().join(next)),
                None => ResolvedTemplate::NotFound,
            };
            assert_eq!(resolver.resolve(&name), expected);
        }
    }

    #[test]
    fn test_resolve_subclass_falls_back_to_base() {
        let store = Arc::new(MemoryStore::new());
        store.insert("tpl/entity.liquid", "base");
        let resolver = TemplateResolver::with_store("tpl", store);

        let entity = TypeIdentity::class("Shop.Entity", None);
        let person = TypeIdentity::class("Shop.Person", Some(&entity));
        let resolved = resolver.resolve_type(&person).expect("Should resolve");
        assert_eq!(resolved.path(), Some(Path::new("tpl/entity.liquid")));

        let single = resolver
            .resolve_type_with_mode(&person, NameMode::SingleType)
            .expect("Should resolve");
        assert_eq!(single, ResolvedTemplate::NotFound);
    }

    #[test]
    fn test_strict_resolution_carries_candidates() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let resolver = TemplateResolver::new(dir.path());

        match resolver.resolve_template_for(&path_type()) {
            Err(TemplateError::NotFound { name }) => {
                assert_eq!(name.possible_names().len(), 3);
                assert!(TemplateError::NotFound { name }
                    .to_string()
                    .contains("system.io.path.liquid>io.path.liquid>path.liquid"));
            }
            other => panic!("Expected not found, got {:?}", other),
        }
    }

    #[test]
    fn test_all_resolve_forms_are_equivalent() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let resolver = TemplateResolver::new(dir.path());
        let name = ObjectTemplateName::new(&path_type()).expect("Should build");
        write_all_candidates(dir.path(), &name);

        let by_name = resolver.resolve_template(&name).expect("Should resolve");
        let by_type = resolver.resolve_template_for(&path_type()).expect("Should resolve");
        let probed = resolver.resolve_type(&path_type()).expect("Should resolve");
        assert_eq!(by_name, by_type);
        assert_eq!(probed.path(), Some(by_name.as_path()));
    }

    #[test]
    fn test_root_type_is_rejected() {
        let resolver = TemplateResolver::new("unused");
        assert!(matches!(
            resolver.resolve_type(&TypeIdentity::root()),
            Err(TemplateError::InvalidType { .. })
        ));
    }

    #[test]
    fn test_read_missing_template_is_error() {
        let resolver = TemplateResolver::with_store("tpl", Arc::new(MemoryStore::new()));
        let result = resolver.read(Path::new("tpl/none.liquid"));
        assert!(matches!(result, Err(TemplateError::Read { .. })));
    }

    #[test]
    fn test_custom_extension() {
        let store = Arc::new(MemoryStore::new());
        store.insert("tpl/path.tmpl", "x");
        let resolver = TemplateResolver::with_store("tpl", store).with_extension(".tmpl");
        let resolved = resolver.resolve_type(&path_type()).expect("Should resolve");
        assert!(resolved.is_found());
    }
}
