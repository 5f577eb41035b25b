//! Models, records, and the tables that hold them.
//!
//! A [`Model`] is a host type that can describe itself: its [`ModelMeta`],
//! its primary key, and its field values. Templates never see the host type
//! directly; they see [`Record`]s, the materialised form of an instance.
//! A [`Table`] supplies the records of one model to query sets.

use std::fmt;

use indexmap::IndexMap;
use tagkit_core::TagkitResult;

use crate::value::Value;

/// Static metadata for a model, the equivalent of Django's `class Meta`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMeta {
    /// The application the model belongs to (e.g. `"blog"`).
    pub app_label: &'static str,
    /// The model's class name (e.g. `"Article"`).
    pub object_name: &'static str,
    /// Default ordering, `-` prefixed for descending (e.g. `&["-published"]`).
    pub ordering: &'static [&'static str],
}

impl ModelMeta {
    /// Returns the lowercased model name (e.g. `"article"`).
    pub fn model_name(&self) -> String {
        self.object_name.to_lowercase()
    }

    /// Returns `"app_label.ObjectName"`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.object_name)
    }

    /// Returns `"app_label.modelname"`, the form used in serialized output.
    pub fn label_lower(&self) -> String {
        format!("{}.{}", self.app_label, self.model_name())
    }
}

/// A host type that can be listed by templates.
///
/// ```
/// use tagkit_db::{Model, ModelMeta, Value};
///
/// struct Article {
///     id: i64,
///     title: String,
/// }
///
/// impl Model for Article {
///     fn meta() -> &'static ModelMeta {
///         static META: ModelMeta = ModelMeta {
///             app_label: "blog",
///             object_name: "Article",
///             ordering: &["title"],
///         };
///         &META
///     }
///
///     fn pk(&self) -> Value {
///         Value::Int(self.id)
///     }
///
///     fn field_values(&self) -> Vec<(&'static str, Value)> {
///         vec![("title", Value::from(self.title.as_str()))]
///     }
/// }
///
/// let record = Article { id: 1, title: "Hello".into() }.to_record();
/// assert_eq!(record.label(), "blog.article");
/// assert_eq!(record.get("title"), Some(&Value::from("Hello")));
/// ```
pub trait Model: Send + Sync + 'static {
    /// Returns the static metadata for this model type.
    fn meta() -> &'static ModelMeta
    where
        Self: Sized;

    /// Returns the primary key value.
    fn pk(&self) -> Value;

    /// Returns the non-primary-key fields in declaration order.
    fn field_values(&self) -> Vec<(&'static str, Value)>;

    /// Materialises this instance as a [`Record`].
    fn to_record(&self) -> Record
    where
        Self: Sized,
    {
        Record::new(Self::meta(), self.pk(), self.field_values())
    }
}

/// A materialised model instance: the model's metadata, its primary key,
/// and its field values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    meta: &'static ModelMeta,
    pk: Value,
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Creates a record.
    pub fn new<I, K>(meta: &'static ModelMeta, pk: Value, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            meta,
            pk,
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Returns the model metadata.
    pub const fn meta(&self) -> &'static ModelMeta {
        self.meta
    }

    /// Returns `"app_label.modelname"`.
    pub fn label(&self) -> String {
        self.meta.label_lower()
    }

    /// Returns the primary key.
    pub const fn pk(&self) -> &Value {
        &self.pk
    }

    /// Returns the non-primary-key fields.
    pub const fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Looks up a field by name. `pk` and `id` resolve to the primary key
    /// unless a field of that name exists.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or(match name {
            "pk" | "id" => Some(&self.pk),
            _ => None,
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} object ({})", self.meta.object_name, self.pk)
    }
}

/// The source of a model's records.
pub trait Table: Send + Sync + fmt::Debug {
    /// Returns the metadata of the model this table holds.
    fn meta(&self) -> &'static ModelMeta;

    /// Returns every record, in storage order.
    fn records(&self) -> TagkitResult<Vec<Record>>;
}

/// A [`Table`] backed by a vector of records.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    meta: &'static ModelMeta,
    records: Vec<Record>,
}

impl MemoryTable {
    /// Creates an empty table for the model described by `meta`.
    pub const fn new(meta: &'static ModelMeta) -> Self {
        Self {
            meta,
            records: Vec::new(),
        }
    }

    /// Creates a table holding the given instances.
    pub fn from_models<M: Model>(instances: &[M]) -> Self {
        Self {
            meta: M::meta(),
            records: instances.iter().map(Model::to_record).collect(),
        }
    }

    /// Adds a record.
    #[must_use]
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }
}

impl Table for MemoryTable {
    fn meta(&self) -> &'static ModelMeta {
        self.meta
    }

    fn records(&self) -> TagkitResult<Vec<Record>> {
        Ok(self.records.clone())
    }
}
