//! Connection boundary.
//!
//! - [`Connection`]: the synchronous driver interface the executor and
//!   snapshot code talk to. Implementations wrap a real driver; the crate
//!   ships none.
//! - [`DatabaseConnection`]: a connection plus its [`DatabaseConfig`] and
//!   [`Vendor`](crate::vendor::Vendor), with cached table metadata and
//!   database snapshots.
//! - [`ConnectionRegistry`]: explicit `(url, user)` connection cache for a
//!   test run.

pub mod database;
pub mod registry;

pub use database::DatabaseConnection;
pub use registry::ConnectionRegistry;

use rust_decimal::prelude::ToPrimitive;

use crate::core::column::Nullable;
use crate::core::wire::SqlValue;
use crate::error::{FixtureError, Result};

/// Column description reported by the connection's catalog or a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    /// Type name as the database spells it, e.g. "nvarchar(max)".
    pub type_name: String,
    /// JDBC-compatible type code, 0 when the driver has none.
    pub type_code: i32,
    pub nullable: Nullable,
    /// Driver-reported auto-increment flag.
    pub auto_increment: bool,
    /// Column default expression, if any.
    pub default_value: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, type_code: i32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            type_code,
            nullable: Nullable::Unknown,
            auto_increment: false,
            default_value: None,
        }
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: Nullable) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn with_auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }
}

/// Rows returned by a query, fully owned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<SqlValue<'static>>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<SqlValue<'static>>>) -> Self {
        Self { columns, rows }
    }

    /// First column of the first row, if any.
    pub fn scalar(&self) -> Option<&SqlValue<'static>> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Read the scalar as a row count, as returned by `SELECT COUNT(*)`.
    pub fn count(&self) -> Result<u64> {
        let count = match self.scalar() {
            Some(SqlValue::I16(v)) => u64::try_from(*v).ok(),
            Some(SqlValue::I32(v)) => u64::try_from(*v).ok(),
            Some(SqlValue::I64(v)) => u64::try_from(*v).ok(),
            Some(SqlValue::Decimal(v)) => v.to_u64(),
            Some(SqlValue::Text(v)) => v.trim().parse().ok(),
            _ => None,
        };
        count.ok_or_else(|| {
            FixtureError::database(format!(
                "Expected a row count, got {:?}",
                self.scalar()
            ))
        })
    }
}

/// A statement prepared on a connection.
pub trait PreparedStatement {
    /// Queue one parameter set for [`execute_batch`](Self::execute_batch).
    fn add_batch(&mut self, params: Vec<SqlValue<'static>>) -> Result<()>;

    /// Run every queued parameter set; returns affected row counts.
    fn execute_batch(&mut self) -> Result<Vec<u64>>;

    /// Drop queued parameter sets.
    fn clear_batch(&mut self);

    /// Run once with the given parameters; returns the affected row count.
    fn execute(&mut self, params: &[SqlValue<'_>]) -> Result<u64>;

    /// Run once and return the produced rows.
    fn query(&mut self, params: &[SqlValue<'_>]) -> Result<ResultSet>;
}

/// A live, synchronous database connection.
///
/// Failures are reported as [`FixtureError::Database`](crate::error::FixtureError::Database).
pub trait Connection {
    /// Execute a statement without parameters; returns the affected row count.
    fn execute(&mut self, sql: &str) -> Result<u64>;

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>>;

    fn query(&mut self, sql: &str) -> Result<ResultSet>;

    fn auto_commit(&self) -> Result<bool>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Base table names in `schema` (the connection's default schema when `None`).
    fn table_names(&mut self, schema: Option<&str>) -> Result<Vec<String>>;

    /// Columns of one table in declared order.
    fn columns(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Primary key column names in key order.
    fn primary_keys(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>>;

    /// Database product name, e.g. "PostgreSQL" or "Microsoft SQL Server".
    fn product_name(&self) -> &str;

    fn product_version(&self) -> &str;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        (**self).execute(sql)
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        (**self).prepare(sql)
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        (**self).query(sql)
    }

    fn auto_commit(&self) -> Result<bool> {
        (**self).auto_commit()
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        (**self).set_auto_commit(auto_commit)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }

    fn table_names(&mut self, schema: Option<&str>) -> Result<Vec<String>> {
        (**self).table_names(schema)
    }

    fn columns(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        (**self).columns(schema, table)
    }

    fn primary_keys(&mut self, schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        (**self).primary_keys(schema, table)
    }

    fn product_name(&self) -> &str {
        (**self).product_name()
    }

    fn product_version(&self) -> &str {
        (**self).product_version()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
