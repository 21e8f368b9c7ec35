//! Statement parameter values.
//!
//! [`SqlValue`] is what the executor binds into prepared statements and what
//! connections hand back from queries. Column types convert between it and
//! the in-memory [`Value`](super::value::Value); see
//! [`ColumnType::to_wire`](super::types::ColumnType::to_wire).

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Parameter type a NULL is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// Typed statement parameter or result cell.
///
/// Text and binary payloads may borrow from a driver buffer; parameters
/// queued in a batch are always `'static`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    Null(SqlNullType),
    Bool(bool),
    /// TINYINT and SMALLINT.
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    Uuid(Uuid),
    /// DECIMAL and NUMERIC.
    Decimal(Decimal),
    DateTime(NaiveDateTime),
    DateTimeOffset(DateTime<FixedOffset>),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl SqlValue<'_> {
    /// Detach from any borrowed buffer.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Null(t) => SqlValue::Null(t),
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::I16(v) => SqlValue::I16(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::DateTimeOffset(v) => SqlValue::DateTimeOffset(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_owned_detaches_borrowed_payloads() {
        let buffer = String::from("hello");
        let bytes = vec![1u8, 2];
        let owned: Vec<SqlValue<'static>> = vec![
            SqlValue::Text(Cow::Borrowed(buffer.as_str())),
            SqlValue::Bytes(Cow::Borrowed(bytes.as_slice())),
            SqlValue::Null(SqlNullType::Date),
        ]
        .into_iter()
        .map(SqlValue::into_owned)
        .collect();
        drop(buffer);

        assert_eq!(owned[0], SqlValue::Text(Cow::Owned("hello".to_string())));
        assert_eq!(owned[1], SqlValue::Bytes(Cow::Owned(vec![1, 2])));
        assert_eq!(owned[2], SqlValue::Null(SqlNullType::Date));
    }
}
