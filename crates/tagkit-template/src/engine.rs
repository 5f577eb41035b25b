//! Template engine: loading, parsing, and rendering templates.
//!
//! The [`Engine`] owns the settings, the template loaders, the library
//! registry that `{% load %}` consults, and the model registry that
//! query-driven tags read from. It is immutable once built and can be
//! shared between threads.

use std::sync::Arc;

use tagkit_core::{Settings, TagkitError, TagkitResult};
use tagkit_db::ModelRegistry;

use crate::context::Context;
use crate::library::LibraryRegistry;
use crate::loaders::{FileSystemLoader, StringLoader, TemplateLoader};
use crate::parser::{self, Template};

/// What a tag sees of the engine while rendering.
///
/// Breaks the dependency between nodes and the concrete [`Engine`].
pub trait TemplateRenderer: Send + Sync {
    /// Renders a named template with the given context.
    fn render_template(&self, name: &str, context: &mut Context) -> TagkitResult<String>;

    /// Returns the engine settings.
    fn settings(&self) -> &Settings;

    /// Returns the registered models.
    fn models(&self) -> &ModelRegistry;
}

/// The template engine.
///
/// ```
/// use tagkit_template::context::{Context, ContextValue};
/// use tagkit_template::engine::Engine;
///
/// let engine = Engine::default();
/// engine.add_string_template("hello.html", "Hello {{ name }}!");
///
/// let mut ctx = Context::new();
/// ctx.set("name", ContextValue::from("World"));
/// assert_eq!(engine.render_to_string("hello.html", &mut ctx).unwrap(), "Hello World!");
/// ```
pub struct Engine {
    settings: Settings,
    string_loader: StringLoader,
    loaders: Vec<Box<dyn TemplateLoader>>,
    libraries: Arc<LibraryRegistry>,
    models: Arc<ModelRegistry>,
}

impl Engine {
    /// Creates an engine from settings. A filesystem loader is added when
    /// `template_dirs` is non-empty.
    pub fn new(settings: Settings) -> Self {
        let mut loaders: Vec<Box<dyn TemplateLoader>> = Vec::new();
        if !settings.template_dirs.is_empty() {
            loaders.push(Box::new(FileSystemLoader::new(settings.template_dirs.clone())));
        }
        Self {
            settings,
            string_loader: StringLoader::new(),
            loaders,
            libraries: Arc::new(LibraryRegistry::new()),
            models: Arc::new(ModelRegistry::new()),
        }
    }

    /// Replaces the library registry.
    #[must_use]
    pub fn with_libraries(mut self, libraries: impl Into<Arc<LibraryRegistry>>) -> Self {
        self.libraries = libraries.into();
        self
    }

    /// Replaces the model registry.
    #[must_use]
    pub fn with_models(mut self, models: impl Into<Arc<ModelRegistry>>) -> Self {
        self.models = models.into();
        self
    }

    /// Appends a template loader, searched after the earlier ones.
    pub fn add_loader(&mut self, loader: Box<dyn TemplateLoader>) {
        self.loaders.push(loader);
    }

    /// Adds an in-memory template. In-memory templates win over loaders.
    pub fn add_string_template(&self, name: &str, source: &str) {
        self.string_loader.add(name, source);
    }

    /// Returns the library registry.
    pub fn libraries(&self) -> &LibraryRegistry {
        &self.libraries
    }

    /// Asks the in-memory loader, then each configured loader. A loader
    /// error other than "not found" stops the search.
    fn load_source(&self, name: &str) -> TagkitResult<String> {
        match self.string_loader.load(name) {
            Err(TagkitError::TemplateDoesNotExist(_)) => {}
            other => return other,
        }
        for loader in &self.loaders {
            match loader.load(name) {
                Err(TagkitError::TemplateDoesNotExist(_)) => {}
                other => return other,
            }
        }
        Err(TagkitError::TemplateDoesNotExist(name.to_string()))
    }

    /// Loads and parses a template by name.
    pub fn get_template(&self, name: &str) -> TagkitResult<Template> {
        let source = self.load_source(name)?;
        parser::parse(name, &source, &self.libraries)
    }

    /// Parses a template from source.
    pub fn from_string(&self, source: &str) -> TagkitResult<Template> {
        parser::parse("<string>", source, &self.libraries)
    }

    /// Renders a template by name, applying the autoescape setting.
    pub fn render_to_string(&self, name: &str, context: &mut Context) -> TagkitResult<String> {
        context.set_auto_escape(self.settings.auto_escape);
        self.get_template(name)?.render(context, self)
    }

    /// Parses and renders a template from source.
    pub fn render_string(&self, source: &str, context: &mut Context) -> TagkitResult<String> {
        context.set_auto_escape(self.settings.auto_escape);
        self.from_string(source)?.render(context, self)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("libraries", &self.libraries.names())
            .field("models", &self.models.len())
            .field("loaders", &(self.loaders.len() + 1))
            .finish_non_exhaustive()
    }
}

impl TemplateRenderer for Engine {
    fn render_template(&self, name: &str, context: &mut Context) -> TagkitResult<String> {
        self.get_template(name)?.render(context, self)
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    fn models(&self) -> &ModelRegistry {
        &self.models
    }
}
