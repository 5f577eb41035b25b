//! Named query entry points.
//!
//! Every model gets an `objects` manager that returns all records. Hosts
//! may register more, such as a `published_objects` manager whose base
//! filter hides drafts.

use std::sync::Arc;

use crate::model::Table;
use crate::query::{Filter, QuerySet};

/// The name of the manager every model has.
pub const DEFAULT_MANAGER: &str = "objects";

/// A named entry point with optional base filters.
#[derive(Debug, Clone, PartialEq)]
pub struct Manager {
    name: String,
    base_filters: Vec<Filter>,
}

impl Manager {
    /// Creates a manager with no base filters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_filters: Vec::new(),
        }
    }

    /// Adds a filter applied to every query set this manager returns.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.base_filters.push(filter);
        self
    }

    /// Returns the manager name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns a query set over `table` with the base filters applied.
    pub fn get_queryset(&self, table: Arc<dyn Table>) -> QuerySet {
        self.base_filters
            .iter()
            .cloned()
            .fold(QuerySet::new(table), QuerySet::filter)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(DEFAULT_MANAGER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryTable, ModelMeta, Record};
    use crate::value::Value;

    static META: ModelMeta = ModelMeta {
        app_label: "news",
        object_name: "Entry",
        ordering: &[],
    };

    fn table() -> Arc<dyn Table> {
        Arc::new(
            MemoryTable::new(&META)
                .with_record(Record::new(&META, Value::Int(1), [("published", Value::Bool(true))]))
                .with_record(Record::new(&META, Value::Int(2), [("published", Value::Bool(false))])),
        )
    }

    #[test]
    fn test_default_manager_returns_all() {
        let manager = Manager::default();
        assert_eq!(manager.name(), "objects");
        assert_eq!(manager.get_queryset(table()).count().unwrap(), 2);
    }

    #[test]
    fn test_base_filter_applies() {
        let manager =
            Manager::new("published_objects").with_filter(Filter::exact("published", true));
        let records = manager.get_queryset(table()).fetch().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pk(), &Value::Int(1));
    }
}
