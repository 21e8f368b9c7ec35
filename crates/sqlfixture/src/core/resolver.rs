//! Mapping from database-reported type names and codes to [`ColumnType`].
//!
//! The base resolver knows the standard SQL names. Vendor resolvers in
//! [`crate::vendor`] match their own spellings first and then delegate here.

use super::types::ColumnType;

/// Resolves a metadata type name/code pair into a canonical column type.
pub trait TypeResolver: Send + Sync {
    /// Name of the resolver's dialect (e.g. "mssql").
    fn dialect_name(&self) -> &str;

    /// Resolve a reported type. Never fails; unrecognised types are `Unknown`.
    fn resolve(&self, type_name: &str, type_code: i32) -> ColumnType;
}

/// Split a reported type name into its lowercased base name and the
/// parenthesised argument, if any.
///
/// `"NVARCHAR(MAX)"` becomes `("nvarchar", Some("max"))` and
/// `"timestamp(6) with time zone"` becomes `("timestamp with time zone", Some("6"))`.
pub fn split_type_name(type_name: &str) -> (String, Option<String>) {
    let lower = type_name.trim().to_lowercase();
    match (lower.find('('), lower.find(')')) {
        (Some(open), Some(close)) if close > open => {
            let args = lower[open + 1..close].trim().to_string();
            let base = format!("{} {}", lower[..open].trim(), lower[close + 1..].trim());
            (base.trim().to_string(), Some(args))
        }
        _ => (lower, None),
    }
}

/// Standard SQL type names and JDBC type codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseTypeResolver;

impl BaseTypeResolver {
    /// Resolve a lowercased base type name without parameters.
    pub fn resolve_name(base: &str) -> Option<ColumnType> {
        let ty = match base {
            "boolean" | "bool" | "bit" => ColumnType::Boolean,
            "tinyint" => ColumnType::TinyInt,
            "smallint" => ColumnType::SmallInt,
            "integer" | "int" => ColumnType::Integer,
            "bigint" => ColumnType::BigInt,
            "real" | "float4" => ColumnType::Real,
            "double" | "double precision" | "float" | "float8" => ColumnType::Double,
            "decimal" | "dec" => ColumnType::Decimal,
            "numeric" => ColumnType::Numeric,
            "char" | "character" | "nchar" => ColumnType::Char,
            "varchar" | "character varying" | "nvarchar" | "varchar2" => ColumnType::Varchar,
            "longvarchar" | "long varchar" | "text" => ColumnType::LongVarchar,
            "clob" | "nclob" => ColumnType::Clob,
            "binary" => ColumnType::Binary,
            "varbinary" | "binary varying" => ColumnType::VarBinary,
            "blob" | "longvarbinary" => ColumnType::Blob,
            "date" => ColumnType::Date,
            "time" | "time without time zone" => ColumnType::Time,
            "timestamp" | "timestamp without time zone" | "datetime" => ColumnType::Timestamp,
            "timestamp with time zone" | "timestamp_with_timezone" | "timestamp_tz" => {
                ColumnType::TimestampTz
            }
            "uuid" => ColumnType::Uuid,
            _ => return None,
        };
        Some(ty)
    }
}

impl TypeResolver for BaseTypeResolver {
    fn dialect_name(&self) -> &str {
        "generic"
    }

    fn resolve(&self, type_name: &str, type_code: i32) -> ColumnType {
        let (base, _) = split_type_name(type_name);
        Self::resolve_name(&base).unwrap_or_else(|| ColumnType::from_type_code(type_code))
    }
}
