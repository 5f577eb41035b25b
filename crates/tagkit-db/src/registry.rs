//! Model lookup by label.
//!
//! [`ModelRegistry`] is the counterpart of Django's `apps.get_model`: it maps
//! `"app_label.ModelName"` labels to a registered table and its managers.
//! The registry is built once at startup and only read afterwards.

use std::sync::Arc;

use indexmap::IndexMap;
use tagkit_core::{TagkitError, TagkitResult};

use crate::manager::{Manager, DEFAULT_MANAGER};
use crate::model::{ModelMeta, Table};
use crate::query::QuerySet;

/// A registered model: its table and its managers.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    table: Arc<dyn Table>,
    managers: IndexMap<String, Manager>,
}

impl ModelEntry {
    fn new(table: Arc<dyn Table>) -> Self {
        let mut managers = IndexMap::new();
        managers.insert(DEFAULT_MANAGER.to_string(), Manager::default());
        Self { table, managers }
    }

    /// Returns the model metadata.
    pub fn meta(&self) -> &'static ModelMeta {
        self.table.meta()
    }

    /// Returns a query set from the manager called `name`.
    pub fn manager(&self, name: &str) -> TagkitResult<QuerySet> {
        self.managers
            .get(name)
            .map(|manager| manager.get_queryset(Arc::clone(&self.table)))
            .ok_or_else(|| {
                TagkitError::LookupError(format!(
                    "Model '{}' has no manager '{name}'",
                    self.meta().label()
                ))
            })
    }

    /// Returns a query set from the `objects` manager.
    pub fn objects(&self) -> TagkitResult<QuerySet> {
        self.manager(DEFAULT_MANAGER)
    }

    /// Returns the registered manager names.
    pub fn manager_names(&self) -> impl Iterator<Item = &str> {
        self.managers.keys().map(String::as_str)
    }
}

/// The set of models templates can query.
///
/// ```
/// use std::sync::Arc;
/// use tagkit_db::{Filter, Manager, MemoryTable, ModelMeta, ModelRegistry};
///
/// static ARTICLE: ModelMeta = ModelMeta {
///     app_label: "blog",
///     object_name: "Article",
///     ordering: &[],
/// };
///
/// let mut registry = ModelRegistry::new();
/// registry.register(Arc::new(MemoryTable::new(&ARTICLE)));
/// registry
///     .add_manager("blog.Article", Manager::new("published").with_filter(Filter::exact("published", true)))
///     .unwrap();
///
/// let entry = registry.get_model("blog.article").unwrap();
/// assert!(entry.manager("published").is_ok());
/// assert!(registry.get_model("blog.Missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelEntry>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table. Registering a second table for the same model
    /// replaces the first and drops its extra managers.
    pub fn register(&mut self, table: Arc<dyn Table>) -> &mut Self {
        let key = table.meta().label_lower();
        tracing::debug!(model = %key, "registered model");
        self.models.insert(key, ModelEntry::new(table));
        self
    }

    /// Adds a manager to a registered model.
    pub fn add_manager(&mut self, label: &str, manager: Manager) -> TagkitResult<&mut Self> {
        let key = normalize_label(label)?;
        let entry = self
            .models
            .get_mut(&key)
            .ok_or_else(|| not_registered(label))?;
        entry.managers.insert(manager.name().to_string(), manager);
        Ok(self)
    }

    /// Looks a model up by `"app_label.ModelName"`.
    ///
    /// The model name is matched case-insensitively. Malformed and unknown
    /// labels are a [`TagkitError::LookupError`].
    pub fn get_model(&self, label: &str) -> TagkitResult<&ModelEntry> {
        let key = normalize_label(label)?;
        self.models.get(&key).ok_or_else(|| not_registered(label))
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

fn normalize_label(label: &str) -> TagkitResult<String> {
    match label.trim().split_once('.') {
        Some((app, model)) if !app.is_empty() && !model.is_empty() && !model.contains('.') => {
            Ok(format!("{app}.{}", model.to_lowercase()))
        }
        _ => Err(TagkitError::LookupError(format!(
            "Model label '{label}' must be of the form 'app_label.ModelName'"
        ))),
    }
}

fn not_registered(label: &str) -> TagkitError {
    TagkitError::LookupError(format!("No installed model with label '{label}'"))
}
