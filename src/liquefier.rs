//! Rendering objects with the template of their type
//!
//! A [`Liquefier`] owns one [`Settings`] snapshot, one template engine and
//! one cache of compiled templates. Rendering an object looks its cache key
//! up first; on a miss the template is either the ad-hoc text supplied by the
//! caller or the most specific file found for the object's type hierarchy.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, trace};
use xxhash_rust::xxh3::xxh3_128;

use crate::parser::{ParserOptions, Template};
use crate::renderer::{ExecutionOptions, LiquidEngine, NestedRenderer, Object, Value};
use crate::template::{
    FileSystemStore, NameMode, ObjectTemplateName, ResolvedTemplate, TemplateCache,
    TemplateError, TemplateResolver, TemplateStore, DEFAULT_EXTENSION,
};
use crate::types::TypeIdentity;
use crate::LiquefyError;

/// Folder templates are looked up in unless configured otherwise
pub const DEFAULT_TEMPLATE_FOLDER: &str = "liquefier";

/// Errors that can occur loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Per-instance configuration of a [`Liquefier`]
///
/// ```toml
/// template_folder = "templates"
/// extension = ".liquid"
/// name_mode = "hierarchy"
///
/// [parser]
/// liquefy_tag = true
///
/// [execution]
/// max_steps = 10000
/// max_depth = 8
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder holding the template files
    pub template_folder: PathBuf,

    /// Appended to every candidate template name
    pub extension: String,

    /// Whether ancestors of a type contribute candidate names
    pub name_mode: NameMode,

    /// Passed to the template engine when compiling
    pub parser: ParserOptions,

    /// Passed to the template engine when executing
    pub execution: ExecutionOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_folder: PathBuf::from(DEFAULT_TEMPLATE_FOLDER),
            extension: DEFAULT_EXTENSION.to_string(),
            name_mode: NameMode::default(),
            parser: ParserOptions::default(),
            execution: ExecutionOptions::default(),
        }
    }
}

impl Settings {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load settings from a TOML string
    pub fn from_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_template_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.template_folder = folder.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_name_mode(mut self, mode: NameMode) -> Self {
        self.name_mode = mode;
        self
    }

    pub fn with_parser(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionOptions) -> Self {
        self.execution = execution;
        self
    }
}

/// Something that can be rendered by the template of its runtime type
pub trait Liquefiable {
    /// The runtime type, used to pick templates and as the cache key
    fn type_identity(&self) -> TypeIdentity;

    /// The context templates are executed against
    fn to_value(&self) -> Result<Value, LiquefyError>;
}

impl Liquefiable for Object {
    /// Untyped objects report the root type
    fn type_identity(&self) -> TypeIdentity {
        self.identity().cloned().unwrap_or_else(TypeIdentity::root)
    }

    fn to_value(&self) -> Result<Value, LiquefyError> {
        Ok(Value::Object(self.clone()))
    }
}

impl Liquefiable for Value {
    fn type_identity(&self) -> TypeIdentity {
        match self {
            Value::Object(object) => object.type_identity(),
            _ => TypeIdentity::root(),
        }
    }

    fn to_value(&self) -> Result<Value, LiquefyError> {
        Ok(self.clone())
    }
}

/// Outcome of finding a compiled template for a render
enum Lookup {
    Ready(Arc<Template>),
    Missing(ObjectTemplateName),
}

/// Renders objects with templates chosen by their type
#[derive(Debug)]
pub struct Liquefier {
    settings: Settings,
    engine: LiquidEngine,
    resolver: TemplateResolver,
    cache: TemplateCache<Template>,
}

impl Default for Liquefier {
    fn default() -> Self {
        Self::new()
    }
}

impl Liquefier {
    /// A liquefier with default settings reading from the file system
    pub fn new() -> Self {
        Self::from_settings(Settings::default())
    }

    /// Default settings adjusted by `configure`
    pub fn with_config(configure: impl FnOnce(&mut Settings)) -> Self {
        Self::with_factory(Settings::default, configure)
    }

    /// Settings produced by `factory`, then adjusted by `configure`
    ///
    /// Each call runs the factory again, so instances never share settings.
    pub fn with_factory(
        factory: impl FnOnce() -> Settings,
        configure: impl FnOnce(&mut Settings),
    ) -> Self {
        let mut settings = factory();
        configure(&mut settings);
        Self::from_settings(settings)
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self::with_store(settings, Arc::new(FileSystemStore))
    }

    /// Read templates from `store` instead of the file system
    pub fn with_store(settings: Settings, store: Arc<dyn TemplateStore>) -> Self {
        let resolver = TemplateResolver::with_store(settings.template_folder.clone(), store)
            .with_extension(settings.extension.clone());
        let engine = LiquidEngine::new(settings.parser.clone(), settings.execution.clone());
        Self {
            settings,
            engine,
            resolver,
            cache: TemplateCache::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &LiquidEngine {
        &self.engine
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &TemplateCache<Template> {
        &self.cache
    }

    /// Drop every compiled template; later renders resolve and compile again
    pub fn clear_cache(&self) {
        debug!(entries = self.cache.len(), "clearing template cache");
        self.cache.clear();
    }

    /// Candidate template names for `ty` under the configured mode and extension
    pub fn template_names(&self, ty: &TypeIdentity) -> Result<ObjectTemplateName, TemplateError> {
        ObjectTemplateName::with_options(ty, self.settings.name_mode, &self.settings.extension)
    }

    /// Cache key of an ad-hoc template
    ///
    /// The leading `#` keeps these keys apart from type names.
    pub fn ad_hoc_key(text: &str) -> String {
        format!("#{:032x}", xxh3_128(text.as_bytes()))
    }

    /// Cache key of a type's template: its qualified name, lower-cased
    ///
    /// Identities that compare equal share one entry.
    pub fn type_key(ty: &TypeIdentity) -> String {
        ty.qualified_name().to_lowercase()
    }

    /// Render `object`, or return an empty string when no template exists
    ///
    /// With `template` the given text is used instead of a template file.
    pub fn render<T: Liquefiable + ?Sized>(
        &self,
        object: &T,
        template: Option<&str>,
    ) -> Result<String, LiquefyError> {
        Ok(self.try_render(object, template)?.unwrap_or_default())
    }

    /// Render `object`, or `None` when no template exists
    pub fn try_render<T: Liquefiable + ?Sized>(
        &self,
        object: &T,
        template: Option<&str>,
    ) -> Result<Option<String>, LiquefyError> {
        match self.lookup(&object.type_identity(), template)? {
            Lookup::Ready(compiled) => self.execute(&compiled, object, 0).map(Some),
            Lookup::Missing(_) => Ok(None),
        }
    }

    /// Render `object`, failing with the attempted names when no template exists
    pub fn render_strict<T: Liquefiable + ?Sized>(
        &self,
        object: &T,
        template: Option<&str>,
    ) -> Result<String, LiquefyError> {
        match self.lookup(&object.type_identity(), template)? {
            Lookup::Ready(compiled) => self.execute(&compiled, object, 0),
            Lookup::Missing(name) => Err(TemplateError::NotFound { name }.into()),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(ty = %ty, ad_hoc = ad_hoc.is_some()))]
    fn lookup(&self, ty: &TypeIdentity, ad_hoc: Option<&str>) -> Result<Lookup, LiquefyError> {
        let key = match ad_hoc {
            Some(text) => Self::ad_hoc_key(text),
            None => Self::type_key(ty),
        };
        if let Some(compiled) = self.cache.get(&key) {
            trace!(%key, "template cache hit");
            return Ok(Lookup::Ready(compiled));
        }

        let source = match ad_hoc {
            Some(text) => Cow::Borrowed(text),
            None => {
                let names = self.template_names(ty)?;
                match self.resolver.resolve(&names) {
                    ResolvedTemplate::Found(path) => {
                        debug!(path = %path.display(), "compiling template");
                        Cow::Owned(self.resolver.read(&path)?)
                    }
                    ResolvedTemplate::NotFound => {
                        debug!(candidates = names.possible_names().len(), "no template found");
                        return Ok(Lookup::Missing(names));
                    }
                }
            }
        };

        let compiled = Arc::new(self.engine.compile(&source).map_err(LiquefyError::Syntax)?);
        self.cache.insert(key, Arc::clone(&compiled));
        Ok(Lookup::Ready(compiled))
    }

    fn execute<T: Liquefiable + ?Sized>(
        &self,
        template: &Template,
        object: &T,
        depth: usize,
    ) -> Result<String, LiquefyError> {
        let context = object.to_value()?;
        let nested: &dyn NestedRenderer = self;
        Ok(self
            .engine
            .execute_nested(template, &context, Some(nested), depth)?)
    }
}

impl NestedRenderer for Liquefier {
    fn render_nested(&self, object: &Object, depth: usize) -> Result<Option<String>, LiquefyError> {
        let ty = object.type_identity();
        if ty.is_root() {
            return Ok(None);
        }
        match self.lookup(&ty, None)? {
            Lookup::Ready(compiled) => self.execute(&compiled, object, depth).map(Some),
            Lookup::Missing(_) => Ok(None),
        }
    }
}

static GLOBAL: OnceLock<Liquefier> = OnceLock::new();

/// Make `liquefier` the process-wide instance
///
/// Succeeds only once, and only before [`global`] has been called; otherwise
/// the rejected instance is handed back.
pub fn install(liquefier: Liquefier) -> Result<(), Liquefier> {
    GLOBAL.set(liquefier)
}

/// The process-wide instance, created with default settings on first use
pub fn global() -> &'static Liquefier {
    GLOBAL.get_or_init(Liquefier::new)
}

/// Render `object` with the process-wide instance
pub fn liquefy<T: Liquefiable + ?Sized>(
    object: &T,
    template: Option<&str>,
) -> Result<String, LiquefyError> {
    global().render(object, template)
}
