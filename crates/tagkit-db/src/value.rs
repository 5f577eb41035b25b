//! Field values.
//!
//! [`Value`] is what a [`Model`](crate::Model) hands out for each field.
//! Values serialize to natural JSON: dates and datetimes as ISO 8601
//! strings, decimals as strings so no precision is lost.

use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use tagkit_core::{TagkitError, TagkitResult};

/// A model field value.
///
/// ```
/// use tagkit_db::Value;
///
/// assert_eq!(Value::from(42_i64), Value::Int(42));
/// assert_eq!(Value::from("hello"), Value::String("hello".to_string()));
/// assert_eq!(Value::Int(7).coerce("12").unwrap(), Value::Int(12));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value.
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit floating-point number.
    Float(f64),
    /// A fixed-point decimal.
    Decimal(Decimal),
    /// A UTF-8 string.
    String(String),
    /// A date without time.
    Date(NaiveDate),
    /// A date and time without timezone.
    DateTime(NaiveDateTime),
    /// Arbitrary JSON.
    Json(serde_json::Value),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "None"),
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::DateTime(dt) => write!(f, "{}", iso_datetime(dt)),
            Self::Json(j) => write!(f, "{j}"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Decimal(d) => serializer.serialize_str(&d.to_string()),
            Self::String(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => serializer.serialize_str(&iso_datetime(dt)),
            Self::Json(j) => j.serialize(serializer),
        }
    }
}

/// ISO 8601 with millisecond precision, omitted when zero.
fn iso_datetime(dt: &NaiveDateTime) -> String {
    if dt.and_utc().timestamp_subsec_millis() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }
}

// ── From implementations ───────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl Value {
    /// Returns `true` if this value is `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the string slice of a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer of an `Int` value.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Converts the value to JSON using the same rules as serialization.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(v) => serde_json::Number::from_f64(*v)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::Json(j) => j.clone(),
            other => serde_json::Value::String(other.to_string()),
        }
    }

    /// Parses `raw` into a value of the same kind as `self`.
    ///
    /// Filter arguments arrive from templates as text; this gives them the
    /// type of the field they are compared with.
    pub fn coerce(&self, raw: &str) -> TagkitResult<Self> {
        let invalid = |kind: &str| {
            TagkitError::ValueError(format!("Field expected {kind} but got '{raw}'"))
        };
        let trimmed = raw.trim();
        Ok(match self {
            Self::Null | Self::String(_) => Self::String(raw.to_string()),
            Self::Bool(_) => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "t" => Self::Bool(true),
                "false" | "0" | "f" => Self::Bool(false),
                _ => return Err(invalid("a boolean")),
            },
            Self::Int(_) => Self::Int(trimmed.parse().map_err(|_| invalid("a number"))?),
            Self::Float(_) => Self::Float(trimmed.parse().map_err(|_| invalid("a number"))?),
            Self::Decimal(_) => {
                Self::Decimal(trimmed.parse().map_err(|_| invalid("a decimal number"))?)
            }
            Self::Date(_) => Self::Date(
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid("a date"))?,
            ),
            Self::DateTime(_) => Self::DateTime(
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
                    .map_err(|_| invalid("a datetime"))?,
            ),
            Self::Json(_) => serde_json::from_str(trimmed)
                .map_or_else(|_| Self::String(raw.to_string()), Self::Json),
        })
    }

    /// Total order used when sorting records. `Null` sorts first; numbers
    /// compare numerically across kinds; other mixed kinds compare by their
    /// display text.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => self.to_string().cmp(&other.to_string()),
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "None");
        assert_eq!(Value::Bool(true).to_string(), "True");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::from("x").to_string(), "x");
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Some(5_i64)), Value::Int(5));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_json_dates_and_decimals() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let dt = date.and_hms_milli_opt(10, 5, 0, 250).unwrap();
        let dec: Decimal = "12.50".parse().unwrap();

        assert_eq!(Value::Date(date).to_json(), serde_json::json!("2024-03-09"));
        assert_eq!(
            Value::DateTime(dt).to_json(),
            serde_json::json!("2024-03-09T10:05:00.250")
        );
        assert_eq!(
            serde_json::to_string(&Value::Decimal(dec)).unwrap(),
            "\"12.50\""
        );
    }

    #[test]
    fn test_coerce_by_kind() {
        assert_eq!(Value::Int(0).coerce(" 42 ").unwrap(), Value::Int(42));
        assert_eq!(Value::Bool(false).coerce("True").unwrap(), Value::Bool(true));
        assert_eq!(
            Value::Date(NaiveDate::default()).coerce("2024-01-02").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
        );
        assert_eq!(Value::Null.coerce("x").unwrap(), Value::from("x"));
    }

    #[test]
    fn test_coerce_rejects_bad_input() {
        let err = Value::Int(0).coerce("abc").unwrap_err();
        assert!(matches!(err, TagkitError::ValueError(_)));
        assert!(Value::Bool(true).coerce("maybe").is_err());
    }

    #[test]
    fn test_sort_cmp() {
        assert_eq!(Value::Null.sort_cmp(&Value::Int(1)), Ordering::Less);
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(
            Value::from("apple").sort_cmp(&Value::from("banana")),
            Ordering::Less
        );
    }
}
