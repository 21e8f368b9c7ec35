//! Canonical column types and their cast/compare/wire contracts.
//!
//! Every column resolves to one [`ColumnType`]. A column type knows how to:
//!
//! - cast any [`Value`] into its canonical in-memory form ([`ColumnType::cast`])
//! - order two values of that type ([`ColumnType::compare`])
//! - convert to and from the statement parameter form
//!   ([`ColumnType::to_wire`], [`ColumnType::from_wire`])
//!
//! Casting is idempotent: `T.cast(T.cast(v)?)? == T.cast(v)?`.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::{Value, DATE_FORMAT, TIMESTAMP_TZ_FORMAT};
use super::wire::{SqlNullType, SqlValue};
use crate::error::CastError;

/// Canonical SQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Numeric,
    Char,
    Varchar,
    LongVarchar,
    Clob,
    Binary,
    VarBinary,
    Blob,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    /// Unrecognised type; values are handled as opaque text.
    Unknown,
}

/// Broad grouping of column types sharing cast rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Boolean,
    Integer,
    Float,
    Exact,
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Unknown,
}

impl ColumnType {
    /// Every column type, in declaration order.
    pub const ALL: [ColumnType; 22] = [
        ColumnType::Boolean,
        ColumnType::TinyInt,
        ColumnType::SmallInt,
        ColumnType::Integer,
        ColumnType::BigInt,
        ColumnType::Real,
        ColumnType::Double,
        ColumnType::Decimal,
        ColumnType::Numeric,
        ColumnType::Char,
        ColumnType::Varchar,
        ColumnType::LongVarchar,
        ColumnType::Clob,
        ColumnType::Binary,
        ColumnType::VarBinary,
        ColumnType::Blob,
        ColumnType::Date,
        ColumnType::Time,
        ColumnType::Timestamp,
        ColumnType::TimestampTz,
        ColumnType::Uuid,
        ColumnType::Unknown,
    ];

    /// Standard SQL name of the type.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::TinyInt => "TINYINT",
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Real => "REAL",
            ColumnType::Double => "DOUBLE",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Char => "CHAR",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::LongVarchar => "LONGVARCHAR",
            ColumnType::Clob => "CLOB",
            ColumnType::Binary => "BINARY",
            ColumnType::VarBinary => "VARBINARY",
            ColumnType::Blob => "BLOB",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::TimestampTz => "TIMESTAMP_WITH_TIMEZONE",
            ColumnType::Uuid => "UUID",
            ColumnType::Unknown => "UNKNOWN",
        }
    }

    /// Numeric type code as reported by JDBC-style metadata (`java.sql.Types`).
    pub fn type_code(self) -> i32 {
        match self {
            ColumnType::Boolean => 16,
            ColumnType::TinyInt => -6,
            ColumnType::SmallInt => 5,
            ColumnType::Integer => 4,
            ColumnType::BigInt => -5,
            ColumnType::Real => 7,
            ColumnType::Double => 8,
            ColumnType::Decimal => 3,
            ColumnType::Numeric => 2,
            ColumnType::Char => 1,
            ColumnType::Varchar => 12,
            ColumnType::LongVarchar => -1,
            ColumnType::Clob => 2005,
            ColumnType::Binary => -2,
            ColumnType::VarBinary => -3,
            ColumnType::Blob => 2004,
            ColumnType::Date => 91,
            ColumnType::Time => 92,
            ColumnType::Timestamp => 93,
            ColumnType::TimestampTz => 2014,
            ColumnType::Uuid | ColumnType::Unknown => 1111,
        }
    }

    /// Resolve a metadata type code; unrecognised codes map to `Unknown`.
    pub fn from_type_code(code: i32) -> ColumnType {
        match code {
            16 | -7 => ColumnType::Boolean,
            -6 => ColumnType::TinyInt,
            5 => ColumnType::SmallInt,
            4 => ColumnType::Integer,
            -5 => ColumnType::BigInt,
            7 => ColumnType::Real,
            6 | 8 => ColumnType::Double,
            3 => ColumnType::Decimal,
            2 => ColumnType::Numeric,
            1 | -15 => ColumnType::Char,
            12 | -9 => ColumnType::Varchar,
            -1 | -16 => ColumnType::LongVarchar,
            2005 | 2011 => ColumnType::Clob,
            -2 => ColumnType::Binary,
            -3 => ColumnType::VarBinary,
            -4 | 2004 => ColumnType::Blob,
            91 => ColumnType::Date,
            92 => ColumnType::Time,
            93 => ColumnType::Timestamp,
            2014 => ColumnType::TimestampTz,
            _ => ColumnType::Unknown,
        }
    }

    /// Family sharing cast and compare rules.
    pub fn family(self) -> TypeFamily {
        match self {
            ColumnType::Boolean => TypeFamily::Boolean,
            ColumnType::TinyInt
            | ColumnType::SmallInt
            | ColumnType::Integer
            | ColumnType::BigInt => TypeFamily::Integer,
            ColumnType::Real | ColumnType::Double => TypeFamily::Float,
            ColumnType::Decimal | ColumnType::Numeric => TypeFamily::Exact,
            ColumnType::Char | ColumnType::Varchar | ColumnType::LongVarchar | ColumnType::Clob => {
                TypeFamily::Text
            }
            ColumnType::Binary | ColumnType::VarBinary | ColumnType::Blob => TypeFamily::Binary,
            ColumnType::Date => TypeFamily::Date,
            ColumnType::Time => TypeFamily::Time,
            ColumnType::Timestamp => TypeFamily::Timestamp,
            ColumnType::TimestampTz => TypeFamily::TimestampTz,
            ColumnType::Uuid => TypeFamily::Uuid,
            ColumnType::Unknown => TypeFamily::Unknown,
        }
    }

    /// Whether values of this type compare numerically.
    pub fn is_numeric(self) -> bool {
        matches!(
            self.family(),
            TypeFamily::Integer | TypeFamily::Float | TypeFamily::Exact
        )
    }

    /// Whether values of this type compare as instants or times of day.
    pub fn is_temporal(self) -> bool {
        matches!(
            self.family(),
            TypeFamily::Date | TypeFamily::Time | TypeFamily::Timestamp | TypeFamily::TimestampTz
        )
    }

    /// NULL type hint used when binding NULL for this column type.
    pub fn null_type(self) -> SqlNullType {
        match self {
            ColumnType::Boolean => SqlNullType::Bool,
            ColumnType::TinyInt | ColumnType::SmallInt => SqlNullType::I16,
            ColumnType::Integer => SqlNullType::I32,
            ColumnType::BigInt => SqlNullType::I64,
            ColumnType::Real => SqlNullType::F32,
            ColumnType::Double => SqlNullType::F64,
            ColumnType::Decimal | ColumnType::Numeric => SqlNullType::Decimal,
            ColumnType::Binary | ColumnType::VarBinary | ColumnType::Blob => SqlNullType::Bytes,
            ColumnType::Date => SqlNullType::Date,
            ColumnType::Time => SqlNullType::Time,
            ColumnType::Timestamp => SqlNullType::DateTime,
            ColumnType::TimestampTz => SqlNullType::DateTimeOffset,
            ColumnType::Uuid => SqlNullType::Uuid,
            ColumnType::Char
            | ColumnType::Varchar
            | ColumnType::LongVarchar
            | ColumnType::Clob
            | ColumnType::Unknown => SqlNullType::String,
        }
    }

    /// Cast a value into this type's canonical form.
    ///
    /// NULL and unset cells pass through unchanged for every type.
    pub fn cast(self, value: &Value) -> Result<Value, CastError> {
        if matches!(value, Value::Null | Value::Unset) {
            return Ok(value.clone());
        }

        match self {
            ColumnType::Boolean => cast_bool(value, self).map(Value::Bool),
            // Unsigned, as in SQL Server.
            ColumnType::TinyInt => cast_int(value, self, 0, 255),
            ColumnType::SmallInt => cast_int(value, self, i16::MIN as i64, i16::MAX as i64),
            ColumnType::Integer => cast_int(value, self, i32::MIN as i64, i32::MAX as i64),
            ColumnType::BigInt => cast_int(value, self, i64::MIN, i64::MAX),
            ColumnType::Real => cast_float(value, self).map(|v| Value::Float(v as f32 as f64)),
            ColumnType::Double => cast_float(value, self).map(Value::Float),
            ColumnType::Decimal | ColumnType::Numeric => {
                cast_decimal(value, self).map(Value::Decimal)
            }
            ColumnType::Char
            | ColumnType::Varchar
            | ColumnType::LongVarchar
            | ColumnType::Clob
            | ColumnType::Unknown => Ok(Value::Text(value.to_text().unwrap_or_default())),
            ColumnType::Binary | ColumnType::VarBinary | ColumnType::Blob => {
                cast_bytes(value, self).map(Value::Bytes)
            }
            ColumnType::Date => cast_date(value, self).map(Value::Date),
            ColumnType::Time => cast_time(value, self).map(Value::Time),
            ColumnType::Timestamp => cast_timestamp(value, self).map(Value::Timestamp),
            ColumnType::TimestampTz => cast_timestamp_tz(value, self).map(Value::TimestampTz),
            ColumnType::Uuid => cast_uuid(value, self).map(Value::Uuid),
        }
    }

    /// Order two values after casting both to this type.
    ///
    /// NULL sorts before every non-NULL value and equals only NULL.
    pub fn compare(self, a: &Value, b: &Value) -> Result<Ordering, CastError> {
        let a = self.cast(a)?;
        let b = self.cast(b)?;
        Ok(compare_cast(&a, &b))
    }

    /// Type-aware equality.
    pub fn values_equal(self, a: &Value, b: &Value) -> Result<bool, CastError> {
        Ok(self.compare(a, b)? == Ordering::Equal)
    }

    /// Convert to the parameter representation bound into statements.
    pub fn to_wire(self, value: &Value) -> Result<SqlValue<'static>, CastError> {
        let out_of_range = |v: &Value| CastError::new("out of range", render(v), self);

        let wire = match self.cast(value)? {
            Value::Null => SqlValue::Null(self.null_type()),
            Value::Unset => {
                return Err(CastError::new(
                    "unset value cannot be bound",
                    "<unset>",
                    self,
                ))
            }
            Value::Bool(v) => SqlValue::Bool(v),
            Value::Int(v) => match self {
                ColumnType::TinyInt | ColumnType::SmallInt => SqlValue::I16(
                    i16::try_from(v).map_err(|_| out_of_range(&Value::Int(v)))?,
                ),
                ColumnType::Integer => SqlValue::I32(
                    i32::try_from(v).map_err(|_| out_of_range(&Value::Int(v)))?,
                ),
                _ => SqlValue::I64(v),
            },
            Value::Float(v) if self == ColumnType::Real => SqlValue::F32(v as f32),
            Value::Float(v) => SqlValue::F64(v),
            Value::Decimal(v) => SqlValue::Decimal(v),
            Value::Text(v) => SqlValue::Text(Cow::Owned(v)),
            Value::Bytes(v) => SqlValue::Bytes(Cow::Owned(v)),
            Value::Date(v) => SqlValue::Date(v),
            Value::Time(v) => SqlValue::Time(v),
            Value::Timestamp(v) => SqlValue::DateTime(v),
            Value::TimestampTz(v) => SqlValue::DateTimeOffset(v),
            Value::Uuid(v) => SqlValue::Uuid(v),
        };
        Ok(wire)
    }

    /// Convert a value read from a connection into this type's canonical form.
    pub fn from_wire(self, value: SqlValue<'_>) -> Result<Value, CastError> {
        self.cast(&Value::from(value))
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

fn render(value: &Value) -> String {
    value.to_text().unwrap_or_else(|| value.to_string())
}

fn fail(reason: &str, value: &Value, target: ColumnType) -> CastError {
    CastError::new(reason, render(value), target)
}

fn incompatible(value: &Value, target: ColumnType) -> CastError {
    CastError::new(
        format!("incompatible {} value", value.kind()),
        render(value),
        target,
    )
}

fn compare_cast(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null | Value::Unset, Value::Null | Value::Unset) => Ordering::Equal,
        (Value::Null | Value::Unset, _) => Ordering::Less,
        (_, Value::Null | Value::Unset) => Ordering::Greater,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or_else(|| x.total_cmp(y)),
        (Value::Decimal(x), Value::Decimal(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::Time(x), Value::Time(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::TimestampTz(x), Value::TimestampTz(y)) => x.cmp(y),
        (Value::Uuid(x), Value::Uuid(y)) => x.cmp(y),
        _ => a.to_text().cmp(&b.to_text()),
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

fn decimal_to_i64(d: Decimal) -> Result<i64, &'static str> {
    if !d.fract().is_zero() {
        return Err("not integral");
    }
    d.to_i64().ok_or("out of range")
}

fn cast_int(value: &Value, target: ColumnType, min: i64, max: i64) -> Result<Value, CastError> {
    let n = match value {
        Value::Int(v) => *v,
        Value::Bool(v) => i64::from(*v),
        Value::Float(v) => {
            if !v.is_finite() || v.fract() != 0.0 {
                return Err(fail("not integral", value, target));
            }
            if *v < i64::MIN as f64 || *v >= i64::MAX as f64 {
                return Err(fail("out of range", value, target));
            }
            *v as i64
        }
        Value::Decimal(d) => decimal_to_i64(*d).map_err(|reason| fail(reason, value, target))?,
        Value::Text(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    let d = parse_decimal(s).ok_or_else(|| fail("not numeric", value, target))?;
                    decimal_to_i64(d).map_err(|reason| fail(reason, value, target))?
                }
            }
        }
        _ => return Err(incompatible(value, target)),
    };

    if n < min || n > max {
        return Err(fail("out of range", value, target));
    }
    Ok(Value::Int(n))
}

fn cast_float(value: &Value, target: ColumnType) -> Result<f64, CastError> {
    match value {
        Value::Float(v) => Ok(*v),
        Value::Int(v) => Ok(*v as f64),
        Value::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
        Value::Decimal(d) => d.to_f64().ok_or_else(|| fail("out of range", value, target)),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| fail("not numeric", value, target)),
        _ => Err(incompatible(value, target)),
    }
}

fn cast_decimal(value: &Value, target: ColumnType) -> Result<Decimal, CastError> {
    match value {
        Value::Decimal(d) => Ok(*d),
        Value::Int(v) => Ok(Decimal::from(*v)),
        Value::Bool(v) => Ok(Decimal::from(i64::from(*v))),
        Value::Float(v) => Decimal::from_f64(*v).ok_or_else(|| fail("not numeric", value, target)),
        Value::Text(s) => parse_decimal(s.trim()).ok_or_else(|| fail("not numeric", value, target)),
        _ => Err(incompatible(value, target)),
    }
}

fn cast_bool(value: &Value, target: ColumnType) -> Result<bool, CastError> {
    match value {
        Value::Bool(v) => Ok(*v),
        Value::Int(0) => Ok(false),
        Value::Int(1) => Ok(true),
        Value::Float(v) if *v == 0.0 => Ok(false),
        Value::Float(v) if *v == 1.0 => Ok(true),
        Value::Decimal(d) if d.is_zero() => Ok(false),
        Value::Decimal(d) if *d == Decimal::ONE => Ok(true),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Ok(true),
            "false" | "f" | "no" | "n" | "0" => Ok(false),
            _ => Err(fail("not boolean", value, target)),
        },
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => {
            Err(fail("not boolean", value, target))
        }
        _ => Err(incompatible(value, target)),
    }
}

fn cast_bytes(value: &Value, target: ColumnType) -> Result<Vec<u8>, CastError> {
    match value {
        Value::Bytes(b) => Ok(b.clone()),
        Value::Uuid(u) => Ok(u.as_bytes().to_vec()),
        Value::Text(s) => {
            let s = s.trim();
            let decoded = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(digits) => hex::decode(digits).ok(),
                None => BASE64_STANDARD.decode(s).ok(),
            };
            decoded.ok_or_else(|| fail("not binary", value, target))
        }
        _ => Err(incompatible(value, target)),
    }
}

const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).ok()
}

fn date_at_midnight(ts: NaiveDateTime, value: &Value, target: ColumnType) -> Result<NaiveDate, CastError> {
    if ts.time() == NaiveTime::MIN {
        Ok(ts.date())
    } else {
        Err(fail("has time component", value, target))
    }
}

fn cast_date(value: &Value, target: ColumnType) -> Result<NaiveDate, CastError> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::Timestamp(ts) => date_at_midnight(*ts, value, target),
        Value::TimestampTz(ts) => date_at_midnight(ts.naive_local(), value, target),
        Value::Text(s) => {
            let s = s.trim();
            if let Some(d) = parse_date(s) {
                return Ok(d);
            }
            let ts = parse_timestamp(s).ok_or_else(|| fail("not a date", value, target))?;
            date_at_midnight(ts, value, target)
        }
        _ => Err(incompatible(value, target)),
    }
}

fn cast_time(value: &Value, target: ColumnType) -> Result<NaiveTime, CastError> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::Timestamp(ts) => Ok(ts.time()),
        Value::TimestampTz(ts) => Ok(ts.time()),
        Value::Text(s) => {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map_err(|_| fail("not a time", value, target))
        }
        _ => Err(incompatible(value, target)),
    }
}

fn cast_timestamp(value: &Value, target: ColumnType) -> Result<NaiveDateTime, CastError> {
    match value {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
        Value::TimestampTz(ts) => Ok(ts.naive_utc()),
        Value::Int(millis) => DateTime::<Utc>::from_timestamp_millis(*millis)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| fail("out of range", value, target)),
        Value::Text(s) => {
            let s = s.trim();
            parse_timestamp(s)
                .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
                .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
                .ok_or_else(|| fail("not a timestamp", value, target))
        }
        _ => Err(incompatible(value, target)),
    }
}

fn cast_timestamp_tz(
    value: &Value,
    target: ColumnType,
) -> Result<DateTime<FixedOffset>, CastError> {
    match value {
        Value::TimestampTz(ts) => Ok(*ts),
        Value::Timestamp(ts) => Ok(ts.and_utc().fixed_offset()),
        Value::Date(d) => Ok(d.and_time(NaiveTime::MIN).and_utc().fixed_offset()),
        Value::Int(millis) => DateTime::<Utc>::from_timestamp_millis(*millis)
            .map(|dt| dt.fixed_offset())
            .ok_or_else(|| fail("out of range", value, target)),
        Value::Text(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .ok()
                .or_else(|| DateTime::parse_from_str(s, TIMESTAMP_TZ_FORMAT).ok())
                .or_else(|| parse_timestamp(s).map(|ts| ts.and_utc().fixed_offset()))
                .ok_or_else(|| fail("not a timestamp", value, target))
        }
        _ => Err(incompatible(value, target)),
    }
}

fn cast_uuid(value: &Value, target: ColumnType) -> Result<Uuid, CastError> {
    match value {
        Value::Uuid(u) => Ok(*u),
        Value::Text(s) => Uuid::parse_str(s.trim()).map_err(|_| fail("not a uuid", value, target)),
        Value::Bytes(b) => Uuid::from_slice(b).map_err(|_| fail("not a uuid", value, target)),
        _ => Err(incompatible(value, target)),
    }
}
