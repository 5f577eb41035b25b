//! Template loaders.
//!
//! The [`TemplateLoader`] trait finds template source by name. The engine
//! asks its in-memory [`StringLoader`] first and then every configured
//! loader in order, typically a [`FileSystemLoader`] over the settings'
//! template directories.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tagkit_core::{TagkitError, TagkitResult};

/// Loads template source text by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template source with the given name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateDoesNotExist` if the template cannot be found.
    fn load(&self, name: &str) -> TagkitResult<String>;
}

/// Loads templates from one or more directories on the filesystem.
///
/// Searches each configured directory in order and returns the first match.
/// Names that would escape a directory (absolute paths, `..`) are rejected.
#[derive(Debug, Clone)]
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
}

impl FileSystemLoader {
    /// Creates a new `FileSystemLoader` with the given search directories.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// Returns the search directories.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

fn is_contained(name: &str) -> bool {
    Path::new(name)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> TagkitResult<String> {
        if !is_contained(name) {
            return Err(TagkitError::SuspiciousOperation(format!(
                "Template name '{name}' is outside the template directories"
            )));
        }
        for dir in &self.dirs {
            let path = dir.join(name);
            if path.is_file() {
                tracing::debug!(template = name, path = %path.display(), "loaded template from disk");
                return Ok(std::fs::read_to_string(&path)?);
            }
        }
        Err(TagkitError::TemplateDoesNotExist(name.to_string()))
    }
}

/// Loads templates from an in-memory map of name to source strings.
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    /// Creates a new empty `StringLoader`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `StringLoader` from a map of template names to sources.
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), source.into());
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> TagkitResult<String> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| TagkitError::TemplateDoesNotExist(name.to_string()))
    }
}
