//! Django-style JSON serialization of records.
//!
//! Output matches the shape of Django's `serializers.serialize("json", qs)`:
//!
//! ```text
//! [{"model": "blog.article", "pk": 1, "fields": {"title": "Hello"}}]
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use tagkit_core::{TagkitError, TagkitResult};

use crate::model::Record;
use crate::value::Value;

/// The serialized form of one record. Fields keep their declaration order.
#[derive(Debug, Serialize)]
pub struct SerializedRecord<'a> {
    model: String,
    pk: &'a Value,
    fields: &'a IndexMap<String, Value>,
}

impl<'a> From<&'a Record> for SerializedRecord<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            model: record.label(),
            pk: record.pk(),
            fields: record.fields(),
        }
    }
}

/// Serializes records to a compact JSON array.
///
/// ```
/// use tagkit_db::{serializers, ModelMeta, Record, Value};
///
/// static TAG: ModelMeta = ModelMeta { app_label: "blog", object_name: "Tag", ordering: &[] };
///
/// let records = vec![Record::new(&TAG, Value::Int(1), [("name", Value::from("rust"))])];
/// assert_eq!(
///     serializers::serialize_json(&records).unwrap(),
///     r#"[{"model":"blog.tag","pk":1,"fields":{"name":"rust"}}]"#
/// );
/// ```
pub fn serialize_json(records: &[Record]) -> TagkitResult<String> {
    let objects: Vec<SerializedRecord<'_>> = records.iter().map(SerializedRecord::from).collect();
    serde_json::to_string(&objects).map_err(|e| TagkitError::SerializationError(e.to_string()))
}
