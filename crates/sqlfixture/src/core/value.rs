//! In-memory cell values for dataset tables.
//!
//! [`Value`] is the canonical representation every column type casts into.
//! It is distinct from [`SqlValue`](super::wire::SqlValue), which is the typed
//! parameter form bound into prepared statements.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::wire::SqlValue;

/// A single table cell.
///
/// `Null` is an explicit SQL NULL. `Unset` means the producing dataset gave no
/// value for the cell at all: it is never compared and never bound into a
/// statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    /// Explicit SQL NULL.
    Null,

    /// No value provided for this cell.
    Unset,

    /// Boolean value.
    Bool(bool),

    /// Exact integer (all integer widths).
    Int(i64),

    /// Approximate numeric (real/double).
    Float(f64),

    /// Exact decimal/numeric.
    Decimal(Decimal),

    /// Character data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone.
    Timestamp(NaiveDateTime),

    /// Timestamp with timezone offset.
    TimestampTz(DateTime<FixedOffset>),

    /// UUID/GUID value.
    Uuid(Uuid),
}

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub(crate) const TIMESTAMP_TZ_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S%.f";

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this cell was left unset by its producer.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Short name of the variant, used in cast error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Unset => "unset",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Uuid(_) => "uuid",
        }
    }

    /// Canonical text rendering, or `None` for NULL and unset cells.
    ///
    /// Binary data renders as base64 so that it casts back to the same bytes.
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        let text = match self {
            Value::Null | Value::Unset => return None,
            Value::Bool(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Text(v) => v.clone(),
            Value::Bytes(v) => BASE64_STANDARD.encode(v),
            Value::Date(v) => v.format(DATE_FORMAT).to_string(),
            Value::Time(v) => v.format(TIME_FORMAT).to_string(),
            Value::Timestamp(v) => v.format(TIMESTAMP_FORMAT).to_string(),
            Value::TimestampTz(v) => v.format(TIMESTAMP_TZ_FORMAT).to_string(),
            Value::Uuid(v) => v.to_string(),
        };
        Some(text)
    }

    /// Borrow the text content if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Unset => write!(f, "<unset>"),
            Value::Text(s) => write!(f, "{}", s),
            other => match other.to_text() {
                Some(text) => write!(f, "{}", text),
                None => Ok(()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::TimestampTz(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<SqlValue<'_>> for Value {
    fn from(v: SqlValue<'_>) -> Self {
        match v {
            SqlValue::Null(_) => Value::Null,
            SqlValue::Bool(v) => Value::Bool(v),
            SqlValue::I16(v) => Value::Int(v as i64),
            SqlValue::I32(v) => Value::Int(v as i64),
            SqlValue::I64(v) => Value::Int(v),
            SqlValue::F32(v) => Value::Float(v as f64),
            SqlValue::F64(v) => Value::Float(v),
            SqlValue::Text(v) => Value::Text(v.into_owned()),
            SqlValue::Bytes(v) => Value::Bytes(v.into_owned()),
            SqlValue::Uuid(v) => Value::Uuid(v),
            SqlValue::Decimal(v) => Value::Decimal(v),
            SqlValue::DateTime(v) => Value::Timestamp(v),
            SqlValue::DateTimeOffset(v) => Value::TimestampTz(v),
            SqlValue::Date(v) => Value::Date(v),
            SqlValue::Time(v) => Value::Time(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_null_and_unset_are_distinct() {
        assert!(Value::Null.is_null());
        assert!(!Value::Null.is_unset());
        assert!(Value::Unset.is_unset());
        assert_ne!(Value::Null, Value::Unset);
    }

    #[test]
    fn test_to_text_renderings() {
        assert_eq!(Value::Int(42).to_text().as_deref(), Some("42"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).to_text().as_deref(), Some("AQID"));
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(
            Value::Timestamp(ts).to_text().as_deref(),
            Some("2024-01-02 03:04:05")
        );
        assert_eq!(Value::Null.to_text(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Unset.to_string(), "<unset>");
        assert_eq!(Value::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_from_option() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some(7i64)), Value::Int(7));
    }

    #[test]
    fn test_from_wire_value() {
        assert_eq!(Value::from(SqlValue::I16(5)), Value::Int(5));
        assert_eq!(
            Value::from(SqlValue::Text(Cow::Borrowed("x"))),
            Value::Text("x".to_string())
        );
    }
}
