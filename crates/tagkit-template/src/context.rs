//! Template context for variable resolution and rendering.
//!
//! Provides [`Context`] for holding template variables in a stack-based scope,
//! and [`ContextValue`] for representing dynamic template values, including
//! model records, lazy query sets, and the current request.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tagkit_core::{TagkitError, TagkitResult};
use tagkit_db::serializers::SerializedRecord;
use tagkit_db::{QuerySet, Record, Value};
use tagkit_http::HttpRequest;

/// A dynamic value in a template context.
#[derive(Debug, Clone)]
pub enum ContextValue {
    /// A string that will be escaped on output when autoescaping is on.
    String(String),
    /// A string marked as safe; autoescaping leaves it alone.
    SafeString(String),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit floating point number.
    Float(f64),
    /// An exact decimal number.
    Decimal(Decimal),
    /// A boolean value.
    Bool(bool),
    /// A calendar date.
    Date(NaiveDate),
    /// A date and time without time zone.
    DateTime(NaiveDateTime),
    /// An ordered list of values.
    List(Vec<ContextValue>),
    /// An insertion-ordered mapping.
    Dict(IndexMap<String, ContextValue>),
    /// A model instance.
    Record(Record),
    /// A lazy query; evaluated when iterated, counted, or printed.
    QuerySet(QuerySet),
    /// The request being rendered for.
    Request(Arc<HttpRequest>),
    /// The absence of a value (Python's `None`).
    None,
}

impl ContextValue {
    /// Returns `true` if this value is "truthy" in template logic.
    ///
    /// `None`, `False`, zero, and empty strings and collections are falsy.
    /// A query set is truthy when it matches at least one record.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Decimal(d) => !d.is_zero(),
            Self::String(s) | Self::SafeString(s) => !s.is_empty(),
            Self::List(l) => !l.is_empty(),
            Self::Dict(d) => !d.is_empty(),
            Self::QuerySet(qs) => qs.count().is_ok_and(|n| n > 0),
            Self::Date(_) | Self::DateTime(_) | Self::Record(_) | Self::Request(_) => true,
        }
    }

    /// Converts this value to a display string (without HTML escaping).
    pub fn to_display_string(&self) -> String {
        match self {
            Self::String(s) | Self::SafeString(s) => s.clone(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Decimal(d) => d.to_string(),
            Self::Bool(b) => python_bool(*b).to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::List(_) | Self::Dict(_) => self.to_repr(),
            Self::Record(record) => record.to_string(),
            Self::QuerySet(qs) => {
                let inner = qs.fetch().map_or_else(
                    |_| String::new(),
                    |records| {
                        records
                            .iter()
                            .map(|r| format!("<{}: {r}>", r.meta().object_name))
                            .collect::<Vec<_>>()
                            .join(", ")
                    },
                );
                format!("<QuerySet [{inner}]>")
            }
            Self::Request(request) => {
                format!("<HttpRequest: {} '{}'>", request.method(), request.get_full_path())
            }
            Self::None => String::new(),
        }
    }

    /// Returns a Python-like repr string.
    fn to_repr(&self) -> String {
        match self {
            Self::String(s) | Self::SafeString(s) => format!("'{s}'"),
            Self::None => "None".to_string(),
            Self::List(items) => {
                let inner: Vec<String> = items.iter().map(Self::to_repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Self::Dict(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("'{k}': {}", v.to_repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            other => other.to_display_string(),
        }
    }

    /// Returns the Python type name, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "str",
            Self::SafeString(_) => "SafeString",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "Decimal",
            Self::Bool(_) => "bool",
            Self::Date(_) => "date",
            Self::DateTime(_) => "datetime",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Record(_) => "Model",
            Self::QuerySet(_) => "QuerySet",
            Self::Request(_) => "HttpRequest",
            Self::None => "NoneType",
        }
    }

    /// Returns `true` if this value is a safe string.
    pub const fn is_safe(&self) -> bool {
        matches!(self, Self::SafeString(_))
    }

    /// Marks a string value as safe.
    #[must_use]
    pub fn mark_safe(self) -> Self {
        match self {
            Self::String(s) => Self::SafeString(s),
            other => other,
        }
    }

    /// Resolves one segment of a dotted path on this value.
    ///
    /// Dictionaries are looked up by key first, then `items`, `keys` and
    /// `values`. Lists and query sets accept an index. Records expose their
    /// fields, requests a read-only set of attributes.
    pub fn resolve_attr(&self, key: &str) -> Option<Cow<'_, Self>> {
        match self {
            Self::Dict(map) => map.get(key).map(Cow::Borrowed).or_else(|| {
                let view = match key {
                    "items" => map
                        .iter()
                        .map(|(k, v)| Self::List(vec![Self::String(k.clone()), v.clone()]))
                        .collect(),
                    "keys" => map.keys().cloned().map(Self::String).collect(),
                    "values" => map.values().cloned().collect(),
                    _ => return None,
                };
                Some(Cow::Owned(Self::List(view)))
            }),
            Self::List(list) => key.parse::<usize>().ok().and_then(|i| list.get(i)).map(Cow::Borrowed),
            Self::Record(record) => record.get(key).cloned().map(|v| Cow::Owned(v.into())),
            Self::QuerySet(qs) => match key {
                "count" => qs.count().ok().map(|n| Cow::Owned(Self::from(n))),
                "all" => Some(Cow::Owned(self.clone())),
                _ => {
                    let index = key.parse::<usize>().ok()?;
                    let record = qs.fetch().ok()?.into_iter().nth(index)?;
                    Some(Cow::Owned(Self::Record(record)))
                }
            },
            Self::Request(request) => request_attr(request, key).map(Cow::Owned),
            Self::Date(d) => date_attr(d, key).map(|n| Cow::Owned(Self::Integer(n))),
            Self::DateTime(dt) => date_attr(dt, key)
                .or_else(|| match key {
                    "hour" => Some(i64::from(dt.hour())),
                    "minute" => Some(i64::from(dt.minute())),
                    "second" => Some(i64::from(dt.second())),
                    _ => None,
                })
                .map(|n| Cow::Owned(Self::Integer(n))),
            _ => None,
        }
    }

    /// Returns the length of a string, collection, or query set.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::String(s) | Self::SafeString(s) => Some(s.chars().count()),
            Self::List(l) => Some(l.len()),
            Self::Dict(d) => Some(d.len()),
            Self::QuerySet(qs) => qs.count().ok(),
            _ => None,
        }
    }

    /// Returns `true` if this is an empty collection or empty string.
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|l| l == 0)
    }

    /// Attempts to convert this value to an i64.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => Some(*f as i64),
            Self::Decimal(d) => d.trunc().to_i64(),
            Self::String(s) | Self::SafeString(s) => s.trim().parse::<i64>().ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            Self::Decimal(d) => d.to_f64(),
            Self::String(s) | Self::SafeString(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Returns the string contents if this is a String or SafeString.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::SafeString(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the items a `{% for %}` loop would visit.
    ///
    /// Dictionaries yield their keys, strings their characters, and query
    /// sets are evaluated. `None` yields nothing.
    pub fn iter_values(&self) -> TagkitResult<Vec<Self>> {
        match self {
            Self::List(items) => Ok(items.clone()),
            Self::Dict(map) => Ok(map.keys().cloned().map(Self::String).collect()),
            Self::QuerySet(qs) => Ok(qs.fetch()?.into_iter().map(Self::Record).collect()),
            Self::String(s) | Self::SafeString(s) => {
                Ok(s.chars().map(|c| Self::String(c.to_string())).collect())
            }
            Self::None => Ok(Vec::new()),
            other => Err(TagkitError::ValueError(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }
}

const fn python_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn date_attr(d: &impl Datelike, key: &str) -> Option<i64> {
    match key {
        "year" => Some(i64::from(d.year())),
        "month" => Some(i64::from(d.month())),
        "day" => Some(i64::from(d.day())),
        _ => None,
    }
}

fn request_attr(request: &HttpRequest, key: &str) -> Option<ContextValue> {
    let value = match key {
        "path" => request.path().into(),
        "path_info" => request.path_info().into(),
        "method" => request.method().as_str().into(),
        "scheme" => request.scheme().into(),
        "get_full_path" => request.get_full_path().into(),
        "get_host" => request.get_host().into(),
        "is_secure" => request.is_secure().into(),
        "GET" => ContextValue::Dict(
            request
                .get()
                .items()
                .map(|(k, v)| (k.to_string(), v.into()))
                .collect(),
        ),
        "META" => ContextValue::Dict(
            request
                .meta()
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().into()))
                .collect(),
        ),
        _ => return None,
    };
    Some(value)
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl PartialEq for ContextValue {
    #[allow(clippy::cast_precision_loss)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a) | Self::SafeString(a), Self::String(b) | Self::SafeString(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Decimal(d), Self::Integer(i)) | (Self::Integer(i), Self::Decimal(d)) => {
                *d == Decimal::from(*i)
            }
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::None, Self::None) => true,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Dict(a), Self::Dict(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Request(a), Self::Request(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Serialize for ContextValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) | Self::SafeString(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Decimal(d) => Value::Decimal(*d).serialize(serializer),
            Self::Date(d) => Value::Date(*d).serialize(serializer),
            Self::DateTime(dt) => Value::DateTime(*dt).serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Dict(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            Self::Record(record) => SerializedRecord::from(record).serialize(serializer),
            Self::QuerySet(qs) => {
                let records = qs.fetch().map_err(S::Error::custom)?;
                let objects: Vec<SerializedRecord<'_>> = records.iter().map(SerializedRecord::from).collect();
                objects.serialize(serializer)
            }
            Self::Request(_) => Err(S::Error::custom(
                "Object of type HttpRequest is not JSON serializable",
            )),
            Self::None => serializer.serialize_unit(),
        }
    }
}

// -- From implementations --

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i32> for ContextValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for ContextValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<usize> for ContextValue {
    fn from(i: usize) -> Self {
        Self::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ContextValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Decimal> for ContextValue {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<NaiveDate> for ContextValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for ContextValue {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl From<Record> for ContextValue {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<QuerySet> for ContextValue {
    fn from(qs: QuerySet) -> Self {
        Self::QuerySet(qs)
    }
}

impl From<HttpRequest> for ContextValue {
    fn from(request: HttpRequest) -> Self {
        Self::Request(Arc::new(request))
    }
}

impl From<Arc<HttpRequest>> for ContextValue {
    fn from(request: Arc<HttpRequest>) -> Self {
        Self::Request(request)
    }
}

impl<T: Into<Self>> From<Vec<T>> for ContextValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Self>> From<IndexMap<String, T>> for ContextValue {
    fn from(m: IndexMap<String, T>) -> Self {
        Self::Dict(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Self>> From<Option<T>> for ContextValue {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::None, Into::into)
    }
}

impl From<Value> for ContextValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Bool(b) => Self::Bool(b),
            Value::Int(i) => Self::Integer(i),
            Value::Float(f) => Self::Float(f),
            Value::Decimal(d) => Self::Decimal(d),
            Value::String(s) => Self::String(s),
            Value::Date(d) => Self::Date(d),
            Value::DateTime(dt) => Self::DateTime(dt),
            Value::Json(j) => j.into(),
        }
    }
}

impl From<serde_json::Value> for ContextValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::None,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::None),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Dict(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

/// A template context that holds variables in a stack of scopes.
///
/// The bottom scope holds the `True`, `False` and `None` literals. Lookup
/// searches from the top of the stack downward, so `{% for %}` and
/// `{% with %}` bindings shadow outer ones until their scope is popped.
///
/// ```
/// use tagkit_template::context::{Context, ContextValue};
///
/// let mut ctx = Context::new();
/// ctx.set("name", ContextValue::from("tagkit"));
/// ctx.push();
/// ctx.set("name", ContextValue::from("inner"));
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "inner");
/// ctx.pop();
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "tagkit");
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    stack: Vec<HashMap<String, ContextValue>>,
    auto_escape: bool,
}

impl Context {
    /// Creates a new context with a single, empty user scope.
    pub fn new() -> Self {
        let builtins = HashMap::from([
            ("True".to_string(), ContextValue::Bool(true)),
            ("False".to_string(), ContextValue::Bool(false)),
            ("None".to_string(), ContextValue::None),
        ]);
        Self {
            stack: vec![builtins, HashMap::new()],
            auto_escape: true,
        }
    }

    /// Pushes a new scope onto the context stack.
    pub fn push(&mut self) {
        self.stack.push(HashMap::new());
    }

    /// Pops the top scope. The outermost user scope is never popped.
    pub fn pop(&mut self) {
        if self.stack.len() > 2 {
            self.stack.pop();
        }
    }

    /// Sets a variable in the current (top) scope.
    pub fn set(&mut self, key: impl Into<String>, value: ContextValue) {
        if let Some(top) = self.stack.last_mut() {
            top.insert(key.into(), value);
        }
    }

    /// Looks up a variable by dotted path, e.g. `user.name` or `items.0`.
    pub fn get(&self, path: &str) -> Option<Cow<'_, ContextValue>> {
        let mut parts = path.split('.');
        let root_key = parts.next()?;
        let root = self.stack.iter().rev().find_map(|scope| scope.get(root_key))?;

        parts.try_fold(Cow::Borrowed(root), |current, part| match current {
            Cow::Borrowed(value) => value.resolve_attr(part),
            Cow::Owned(value) => value.resolve_attr(part).map(|v| Cow::Owned(v.into_owned())),
        })
    }

    /// Returns a mutable reference to a stored value by dotted path.
    ///
    /// Only dictionary keys and list indexes can be traversed; computed
    /// attributes of records, query sets and requests are read-only.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut ContextValue> {
        let mut parts = path.split('.');
        let root_key = parts.next()?;
        let root = self
            .stack
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(root_key))?;

        parts.try_fold(root, |current, part| match current {
            ContextValue::Dict(map) => map.get_mut(part),
            ContextValue::List(list) => part.parse::<usize>().ok().and_then(|i| list.get_mut(i)),
            _ => None,
        })
    }

    /// Returns `true` if a variable of this name is bound in any scope.
    pub fn contains(&self, key: &str) -> bool {
        self.stack.iter().any(|scope| scope.contains_key(key))
    }

    /// Returns the `request` variable if one is bound.
    pub fn request(&self) -> Option<Arc<HttpRequest>> {
        match self.get("request")?.as_ref() {
            ContextValue::Request(request) => Some(Arc::clone(request)),
            _ => None,
        }
    }

    /// Returns whether auto-escaping is enabled.
    pub const fn auto_escape(&self) -> bool {
        self.auto_escape
    }

    /// Sets whether auto-escaping is enabled.
    pub fn set_auto_escape(&mut self, enabled: bool) {
        self.auto_escape = enabled;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Escapes HTML special characters in a string.
///
/// Replaces `&`, `<`, `>`, `"`, and `'` with their HTML entity equivalents.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes a value unless it is already safe, returning a safe string.
pub fn conditional_escape(value: &ContextValue) -> ContextValue {
    match value {
        ContextValue::SafeString(_) => value.clone(),
        other => ContextValue::SafeString(escape_html(&other.to_display_string())),
    }
}

#[cfg(test)]
mod tests {
    use tagkit_db::{MemoryTable, ModelMeta};

    use super::*;

    static BOOK: ModelMeta = ModelMeta {
        app_label: "library",
        object_name: "Book",
        ordering: &["title"],
    };

    fn books() -> QuerySet {
        let table = MemoryTable::new(&BOOK)
            .with_record(Record::new(&BOOK, Value::Int(1), [("title", Value::from("Dune"))]))
            .with_record(Record::new(&BOOK, Value::Int(2), [("title", Value::from("Babel"))]));
        QuerySet::new(Arc::new(table))
    }

    #[test]
    fn test_truthiness() {
        assert!(!ContextValue::None.is_truthy());
        assert!(!ContextValue::from("").is_truthy());
        assert!(!ContextValue::Integer(0).is_truthy());
        assert!(!ContextValue::Decimal(Decimal::ZERO).is_truthy());
        assert!(ContextValue::from(vec![1]).is_truthy());
        assert!(ContextValue::QuerySet(books()).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(ContextValue::Float(2.0).to_display_string(), "2.0");
        assert_eq!(ContextValue::Bool(true).to_display_string(), "True");
        assert_eq!(
            ContextValue::from(vec![ContextValue::from("a"), ContextValue::Integer(1)]).to_string(),
            "['a', 1]"
        );
        assert_eq!(
            ContextValue::QuerySet(books()).to_string(),
            "<QuerySet [<Book: Book object (2)>, <Book: Book object (1)>]>"
        );
    }

    #[test]
    fn test_dict_keeps_insertion_order() {
        let mut map = IndexMap::new();
        map.insert("z".to_string(), ContextValue::Integer(1));
        map.insert("a".to_string(), ContextValue::Integer(2));
        let value = ContextValue::Dict(map);
        assert_eq!(value.to_string(), "{'z': 1, 'a': 2}");
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn test_resolve_dict_views() {
        let mut map = IndexMap::new();
        map.insert("k".to_string(), ContextValue::from("v"));
        let value = ContextValue::Dict(map);
        let items = value.resolve_attr("items").unwrap().into_owned();
        assert_eq!(
            items,
            ContextValue::from(vec![ContextValue::from(vec!["k", "v"])])
        );
    }

    #[test]
    fn test_resolve_record_and_queryset() {
        let mut ctx = Context::new();
        ctx.set("books", ContextValue::QuerySet(books()));
        assert_eq!(ctx.get("books.count").unwrap().as_integer(), Some(2));
        assert_eq!(ctx.get("books.0.title").unwrap().to_string(), "Babel");
        assert_eq!(ctx.get("books.1.pk").unwrap().as_integer(), Some(1));
        assert!(ctx.get("books.5").is_none());
    }

    #[test]
    fn test_resolve_request_attributes() {
        let request = HttpRequest::builder()
            .path("/shop/")
            .query_string("page=2")
            .header("host", "example.com")
            .build();
        let mut ctx = Context::new();
        ctx.set("request", request.into());
        assert_eq!(ctx.get("request.path").unwrap().to_string(), "/shop/");
        assert_eq!(ctx.get("request.GET.page").unwrap().to_string(), "2");
        assert_eq!(ctx.get("request.get_host").unwrap().to_string(), "example.com");
        assert!(ctx.request().is_some());
    }

    #[test]
    fn test_builtin_literals() {
        let ctx = Context::new();
        assert_eq!(ctx.get("True").unwrap().as_ref(), &ContextValue::Bool(true));
        assert_eq!(ctx.get("None").unwrap().as_ref(), &ContextValue::None);
    }

    #[test]
    fn test_pop_keeps_user_scope() {
        let mut ctx = Context::new();
        ctx.set("a", 1.into());
        ctx.pop();
        ctx.pop();
        assert!(ctx.contains("a"));
    }

    #[test]
    fn test_get_mut_nested() {
        let mut field = IndexMap::new();
        field.insert("name".to_string(), ContextValue::from("email"));
        let mut form = IndexMap::new();
        form.insert("email".to_string(), ContextValue::Dict(field));
        let mut ctx = Context::new();
        ctx.set("form", ContextValue::Dict(form));

        if let Some(ContextValue::Dict(map)) = ctx.get_mut("form.email") {
            map.insert("widget_type".to_string(), ContextValue::from("TextInput"));
        }
        assert_eq!(ctx.get("form.email.widget_type").unwrap().to_string(), "TextInput");
        assert!(ctx.get_mut("form.missing").is_none());
    }

    #[test]
    fn test_iter_values() {
        assert_eq!(ContextValue::QuerySet(books()).iter_values().unwrap().len(), 2);
        assert_eq!(ContextValue::from("ab").iter_values().unwrap().len(), 2);
        assert!(ContextValue::Integer(3).iter_values().is_err());
    }

    #[test]
    fn test_serialize_record_like_django() {
        let record = Record::new(&BOOK, Value::Int(7), [("title", Value::from("Emma"))]);
        assert_eq!(
            serde_json::to_string(&ContextValue::Record(record)).unwrap(),
            r#"{"model":"library.book","pk":7,"fields":{"title":"Emma"}}"#
        );
        let request = ContextValue::from(HttpRequest::builder().build());
        assert!(serde_json::to_string(&request).is_err());
    }

    #[test]
    fn test_serialize_nested_records_keep_field_order() {
        let record = Record::new(
            &BOOK,
            Value::Int(3),
            [("title", Value::from("Emma")), ("author", Value::from("Austen"))],
        );
        let mut map = IndexMap::new();
        map.insert("book".to_string(), ContextValue::Record(record));
        assert_eq!(
            serde_json::to_string(&ContextValue::Dict(map)).unwrap(),
            r#"{"book":{"model":"library.book","pk":3,"fields":{"title":"Emma","author":"Austen"}}}"#
        );
        assert_eq!(
            serde_json::to_string(&ContextValue::QuerySet(books())).unwrap(),
            r#"[{"model":"library.book","pk":2,"fields":{"title":"Babel"}},{"model":"library.book","pk":1,"fields":{"title":"Dune"}}]"#
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;");
        assert_eq!(
            conditional_escape(&ContextValue::SafeString("<b>".into())),
            ContextValue::SafeString("<b>".into())
        );
    }
}
