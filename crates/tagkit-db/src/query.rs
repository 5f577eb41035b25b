//! In-memory query sets.
//!
//! A [`QuerySet`] is a lazy description of "records of one table matching
//! these filters, in this order, at most this many". Nothing is read from
//! the [`Table`] until [`QuerySet::fetch`] or [`QuerySet::count`] runs.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use tagkit_core::{TagkitError, TagkitResult};

use crate::model::{Record, Table};
use crate::value::Value;

/// A comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Equality. A `String` operand is coerced to the field's kind.
    Exact(Value),
    /// Case-insensitive equality on the display text.
    IExact(String),
    /// `true` matches null fields, `false` matches everything else.
    IsNull(bool),
}

impl Lookup {
    /// Tests a field value against this lookup.
    pub fn matches(&self, field_value: &Value) -> TagkitResult<bool> {
        match self {
            Self::Exact(Value::String(raw)) if !matches!(field_value, Value::String(_)) => {
                if field_value.is_null() {
                    return Ok(false);
                }
                Ok(field_value.coerce(raw)? == *field_value)
            }
            Self::Exact(expected) => Ok(expected == field_value),
            Self::IExact(expected) => {
                Ok(!field_value.is_null() && field_value.to_string().to_lowercase() == expected.to_lowercase())
            }
            Self::IsNull(wanted) => Ok(field_value.is_null() == *wanted),
        }
    }
}

/// A lookup bound to a field name, e.g. `status__iexact="Draft"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// The field to test.
    pub field: String,
    /// The comparison.
    pub lookup: Lookup,
}

impl Filter {
    /// Creates an exact-match filter.
    pub fn exact(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            lookup: Lookup::Exact(value.into()),
        }
    }

    /// Parses a single `field=value` clause.
    ///
    /// The clause must contain exactly one `=`. The field may carry a
    /// `__exact`, `__iexact` or `__isnull` suffix.
    ///
    /// ```
    /// use tagkit_db::{Filter, Lookup, Value};
    ///
    /// let filter = Filter::parse("status=published").unwrap();
    /// assert_eq!(filter.field, "status");
    /// assert_eq!(filter.lookup, Lookup::Exact(Value::from("published")));
    /// assert!(Filter::parse("a=b=c").is_err());
    /// ```
    pub fn parse(clause: &str) -> TagkitResult<Self> {
        let parts: Vec<&str> = clause.split('=').collect();
        let [key, raw] = parts.as_slice() else {
            return Err(TagkitError::ValueError(format!(
                "Filter '{clause}' must be a single 'field=value' pair"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(TagkitError::ValueError(format!(
                "Filter '{clause}' has no field name"
            )));
        }

        let (field, suffix) = key.split_once("__").unwrap_or((key, "exact"));
        let lookup = match suffix {
            "exact" => Lookup::Exact(Value::from(*raw)),
            "iexact" => Lookup::IExact((*raw).to_string()),
            "isnull" => Lookup::IsNull(matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "true" | "1"
            )),
            other => {
                return Err(TagkitError::ValueError(format!(
                    "Unsupported lookup '{other}' in filter '{clause}'"
                )))
            }
        };
        Ok(Self {
            field: field.to_string(),
            lookup,
        })
    }

    fn matches(&self, record: &Record) -> TagkitResult<bool> {
        let value = record.get(&self.field).ok_or_else(|| unknown_field(record, &self.field))?;
        self.lookup.matches(value)
    }
}

/// One ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// The field to order by.
    pub field: String,
    /// Whether to sort in descending order.
    pub descending: bool,
}

impl OrderBy {
    /// Creates an ascending order.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Creates a descending order.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parses `"field"` or `"-field"`. Surrounding whitespace is ignored.
    pub fn parse(term: &str) -> Self {
        let term = term.trim();
        term.strip_prefix('-')
            .map_or_else(|| Self::asc(term), Self::desc)
    }

    /// Parses a comma-separated list of terms, skipping empty ones.
    pub fn parse_list(terms: &str) -> Vec<Self> {
        terms
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(Self::parse)
            .collect()
    }
}

/// A lazy query over one [`Table`].
#[derive(Clone)]
pub struct QuerySet {
    table: Arc<dyn Table>,
    filters: Vec<Filter>,
    ordering: Option<Vec<OrderBy>>,
    limit: Option<usize>,
}

impl fmt::Debug for QuerySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySet")
            .field("model", &self.table.meta().label())
            .field("filters", &self.filters)
            .field("ordering", &self.ordering)
            .field("limit", &self.limit)
            .finish()
    }
}

impl QuerySet {
    /// Creates a query set over every record of `table`.
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self {
            table,
            filters: Vec::new(),
            ordering: None,
            limit: None,
        }
    }

    /// Returns `"app_label.modelname"` for the queried model.
    pub fn label(&self) -> String {
        self.table.meta().label_lower()
    }

    /// Adds a filter. All filters must match.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replaces the ordering. An empty list keeps storage order.
    #[must_use]
    pub fn order_by(mut self, ordering: Vec<OrderBy>) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Caps the number of records returned.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates the query.
    ///
    /// Without an explicit [`order_by`](Self::order_by) the model's default
    /// ordering applies. Unknown fields in filters or ordering are a
    /// [`TagkitError::LookupError`].
    pub fn fetch(&self) -> TagkitResult<Vec<Record>> {
        let mut records = Vec::new();
        for record in self.table.records()? {
            if self.matches_all(&record)? {
                records.push(record);
            }
        }

        let ordering = self.ordering.clone().unwrap_or_else(|| {
            self.table
                .meta()
                .ordering
                .iter()
                .map(|term| OrderBy::parse(term))
                .collect()
        });
        if !ordering.is_empty() {
            if let Some(record) = records.first() {
                for term in &ordering {
                    if record.get(&term.field).is_none() {
                        return Err(unknown_field(record, &term.field));
                    }
                }
            }
            records.sort_by(|a, b| compare_records(a, b, &ordering));
        }

        if let Some(limit) = self.limit {
            records.truncate(limit);
        }
        tracing::debug!(model = %self.label(), rows = records.len(), "queryset evaluated");
        Ok(records)
    }

    /// Returns the number of records [`fetch`](Self::fetch) would return.
    pub fn count(&self) -> TagkitResult<usize> {
        self.fetch().map(|records| records.len())
    }

    fn matches_all(&self, record: &Record) -> TagkitResult<bool> {
        for filter in &self.filters {
            if !filter.matches(record)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn compare_records(a: &Record, b: &Record, ordering: &[OrderBy]) -> Ordering {
    for term in ordering {
        let (Some(left), Some(right)) = (a.get(&term.field), b.get(&term.field)) else {
            continue;
        };
        let ord = left.sort_cmp(right);
        let ord = if term.descending { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn unknown_field(record: &Record, field: &str) -> TagkitError {
    TagkitError::LookupError(format!(
        "Cannot resolve keyword '{field}' into field of {}",
        record.meta().label()
    ))
}
