//! # tagkit-db
//!
//! A read-only model layer for templates. Hosts register a [`Table`] per
//! model plus any named [`Manager`]s, and tags look models up by their
//! `"app_label.ModelName"` label through the [`ModelRegistry`].
//!
//! Query sets evaluate in memory: a single equality filter, ordering, and a
//! row limit are all a listing widget needs.
//!
//! ## Modules
//!
//! - [`value`] - Field values
//! - [`model`] - The [`Model`] trait, [`ModelMeta`], and materialised [`Record`]s
//! - [`query`] - Filters, ordering, and [`QuerySet`]
//! - [`manager`] - Named entry points with base filters
//! - [`registry`] - Model lookup by label
//! - [`serializers`] - Django-style JSON serialization of records

pub mod manager;
pub mod model;
pub mod query;
pub mod registry;
pub mod serializers;
pub mod value;

pub use manager::{Manager, DEFAULT_MANAGER};
pub use model::{MemoryTable, Model, ModelMeta, Record, Table};
pub use query::{Filter, Lookup, OrderBy, QuerySet};
pub use registry::{ModelEntry, ModelRegistry};
pub use value::Value;
