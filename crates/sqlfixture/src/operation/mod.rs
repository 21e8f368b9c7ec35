//! Database change operations.
//!
//! An [`Operation`] describes what to do with a dataset; the [`Executor`]
//! turns it into statements on a [`DatabaseConnection`].
//!
//! # Statement shape
//!
//! Unset cells are left out of statements entirely, so rows providing
//! different column sets need different SQL. Consecutive rows with the same
//! shape share one prepared statement and are batched; a shape change
//! flushes the batch and prepares the next statement.

pub(crate) mod batch;
pub(crate) mod guard;
pub(crate) mod statement;

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::connection::{Connection, DatabaseConnection};
use crate::core::column::names_equal;
use crate::core::metadata::TableMetaData;
use crate::core::types::ColumnType;
use crate::core::value::Value;
use crate::core::wire::SqlValue;
use crate::dataset::{DataSet, Table};
use crate::error::{FixtureError, Result};
use crate::vendor::Dialect;

use batch::BatchWriter;
use guard::{IdentityInsertGuard, TransactionGuard};
use statement::Condition;

/// A database change operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Operation {
    /// Do nothing.
    #[default]
    None,
    /// Insert every row.
    Insert,
    /// Update rows by primary key.
    Update,
    /// Delete rows matching the provided columns, tables in reverse order.
    Delete,
    /// Delete every row of each dataset table, tables in reverse order.
    DeleteAll,
    /// Truncate each dataset table, tables in reverse order.
    Truncate,
    /// Update rows that exist, insert the others.
    Refresh,
    /// `DeleteAll` followed by `Insert`.
    CleanInsert,
    /// Run the inner operation with explicit identity values.
    IdentityInsert(Box<Operation>),
    /// Run the inner operation in one transaction.
    Transaction(Box<Operation>),
    /// Run operations in order.
    Composite(Vec<Operation>),
}

impl Operation {
    /// Wrap in [`Operation::IdentityInsert`].
    #[must_use]
    pub fn with_identity_insert(self) -> Self {
        Operation::IdentityInsert(Box::new(self))
    }

    /// Wrap in [`Operation::Transaction`].
    #[must_use]
    pub fn in_transaction(self) -> Self {
        Operation::Transaction(Box::new(self))
    }

    /// Name used in logs and error context.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::None => "NONE",
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::DeleteAll => "DELETE_ALL",
            Operation::Truncate => "TRUNCATE",
            Operation::Refresh => "REFRESH",
            Operation::CleanInsert => "CLEAN_INSERT",
            Operation::IdentityInsert(_) => "IDENTITY_INSERT",
            Operation::Transaction(_) => "TRANSACTION",
            Operation::Composite(_) => "COMPOSITE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::IdentityInsert(inner) => write!(f, "identity_insert({})", inner),
            Operation::Transaction(inner) => write!(f, "transaction({})", inner),
            Operation::Composite(ops) => {
                let parts: Vec<String> = ops.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(", "))
            }
            other => write!(f, "{}", other.name().to_lowercase()),
        }
    }
}

/// Split on commas outside parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

impl FromStr for Operation {
    type Err = FixtureError;

    /// Parse `clean_insert`, `transaction(refresh)`,
    /// `identity_insert(insert)` or a comma-separated composite such as
    /// `delete_all, insert`. Case-insensitive; `-` and `_` are interchangeable.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parts = split_top_level(s);
        if parts.len() > 1 {
            return parts
                .into_iter()
                .map(str::parse::<Operation>)
                .collect::<Result<Vec<_>>>()
                .map(Operation::Composite);
        }

        if let Some(open) = s.find('(') {
            let inner = s[open + 1..].strip_suffix(')').ok_or_else(|| {
                FixtureError::Config(format!("Unbalanced parentheses in operation '{}'", s))
            })?;
            let inner: Operation = inner.parse()?;
            return match normalize(&s[..open]).as_str() {
                "identity_insert" => Ok(inner.with_identity_insert()),
                "transaction" => Ok(inner.in_transaction()),
                other => Err(FixtureError::Config(format!(
                    "Unknown operation wrapper '{}'",
                    other
                ))),
            };
        }

        match normalize(s).as_str() {
            "none" => Ok(Operation::None),
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "delete_all" => Ok(Operation::DeleteAll),
            "truncate" | "truncate_table" => Ok(Operation::Truncate),
            "refresh" => Ok(Operation::Refresh),
            "clean_insert" => Ok(Operation::CleanInsert),
            other => Err(FixtureError::Config(format!(
                "Unknown operation '{}'. Supported: none, insert, update, delete, delete_all, \
                 truncate, refresh, clean_insert, identity_insert(..), transaction(..)",
                other
            ))),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A dataset column paired with the database column it writes to.
#[derive(Debug, Clone)]
struct Target {
    /// Column index in the dataset table.
    index: usize,
    /// Database spelling of the column name.
    name: String,
    column_type: ColumnType,
    identity: bool,
    key: bool,
}

/// How a cell takes part in a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Unset,
    Null,
    Value,
}

impl Cell {
    fn of(value: &Value) -> Self {
        match value {
            Value::Unset => Cell::Unset,
            Value::Null => Cell::Null,
            _ => Cell::Value,
        }
    }
}

/// Keep an error that already carries context, otherwise attach it.
fn wrap(
    operation: &str,
    table: &str,
    row: Option<usize>,
    sql: Option<&str>,
    e: FixtureError,
) -> FixtureError {
    match e {
        FixtureError::DatabaseOperation { .. } => e,
        e => FixtureError::operation(operation, table, row, sql.map(str::to_string), e),
    }
}

/// Group consecutive rows with equal shape.
fn shape_runs<K, F>(row_count: usize, mut shape_of: F) -> Result<Vec<(K, Range<usize>)>>
where
    K: PartialEq,
    F: FnMut(usize) -> Result<K>,
{
    let mut runs: Vec<(K, Range<usize>)> = Vec::new();
    for row in 0..row_count {
        let shape = shape_of(row)?;
        match runs.last_mut() {
            Some((last, range)) if *last == shape => range.end = row + 1,
            _ => runs.push((shape, row..row + 1)),
        }
    }
    Ok(runs)
}

/// Run `f` with explicit identity values enabled for one table when `active`.
fn with_identity_bracket<C, T, F>(
    db: &mut DatabaseConnection<C>,
    qualified_table: &str,
    active: bool,
    f: F,
) -> Result<T>
where
    C: Connection,
    F: FnOnce(&mut DatabaseConnection<C>) -> Result<T>,
{
    if active {
        let mut guard = IdentityInsertGuard::enable(db, qualified_table)?;
        f(guard.db())
    } else {
        f(db)
    }
}

/// Prepare `sql`, run it once with `params` and return the affected row count.
fn execute_once<C: Connection>(
    db: &mut DatabaseConnection<C>,
    sql: &str,
    params: &[SqlValue<'_>],
) -> Result<u64> {
    debug!("{}", sql);
    db.connection_mut().prepare(sql)?.execute(params)
}

/// Prepare `sql`, run it as a query and read a row count.
fn query_count<C: Connection>(
    db: &mut DatabaseConnection<C>,
    sql: &str,
    params: &[SqlValue<'_>],
) -> Result<u64> {
    debug!("{}", sql);
    db.connection_mut().prepare(sql)?.query(params)?.count()
}

/// Cast the cells of `targets` in one row to statement parameters.
fn row_params<'t>(
    table: &dyn Table,
    row: usize,
    targets: impl IntoIterator<Item = &'t Target>,
) -> Result<Vec<SqlValue<'static>>> {
    targets
        .into_iter()
        .map(|t| -> Result<SqlValue<'static>> {
            Ok(t.column_type.to_wire(table.value_at(row, t.index)?)?)
        })
        .collect()
}

/// Turns operations into statements.
#[derive(Debug, Clone)]
pub struct Executor {
    batch_size: usize,
    batched: bool,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    /// Batches of 100 rows.
    pub fn new() -> Self {
        Self {
            batch_size: 100,
            batched: true,
        }
    }

    /// Batch settings from a database configuration.
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batched: config.batched_statements,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Execute row by row instead of in batches when `false`.
    #[must_use]
    pub fn batched(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    /// Apply `operation` with `dataset` to the database.
    pub fn execute<C: Connection>(
        &self,
        operation: &Operation,
        db: &mut DatabaseConnection<C>,
        dataset: &dyn DataSet,
    ) -> Result<()> {
        info!("Executing {} on {} table(s)", operation, dataset.tables().len());
        self.run(operation, db, dataset, false)
    }

    fn run<C: Connection>(
        &self,
        operation: &Operation,
        db: &mut DatabaseConnection<C>,
        dataset: &dyn DataSet,
        identity: bool,
    ) -> Result<()> {
        match operation {
            Operation::None => Ok(()),
            Operation::Insert => {
                for table in dataset.iter() {
                    self.insert_table(db, table, identity)?;
                }
                Ok(())
            }
            Operation::Update => {
                for table in dataset.iter() {
                    self.update_table(db, table, identity)?;
                }
                Ok(())
            }
            Operation::Delete => {
                for table in dataset.reverse_iter() {
                    self.delete_table(db, table)?;
                }
                Ok(())
            }
            Operation::DeleteAll => self.clear_tables(db, dataset, false),
            Operation::Truncate => self.clear_tables(db, dataset, true),
            Operation::Refresh => {
                for table in dataset.iter() {
                    self.refresh_table(db, table, identity)?;
                }
                Ok(())
            }
            Operation::CleanInsert => {
                self.run(&Operation::DeleteAll, db, dataset, identity)?;
                self.run(&Operation::Insert, db, dataset, identity)
            }
            Operation::IdentityInsert(inner) => self.run(inner, db, dataset, true),
            Operation::Transaction(inner) => {
                let mut guard = TransactionGuard::begin(db)?;
                self.run(inner, guard.db(), dataset, identity)?;
                guard.commit()
            }
            Operation::Composite(operations) => {
                for op in operations {
                    self.run(op, db, dataset, identity)?;
                }
                Ok(())
            }
        }
    }

    /// Pair dataset columns with database columns.
    fn targets(metadata: &TableMetaData, db_metadata: &TableMetaData) -> Result<Vec<Target>> {
        metadata
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| -> Result<Target> {
                let db_column = db_metadata.find_column(column.name())?;
                let column_type = match db_column.data_type() {
                    ColumnType::Unknown => column.data_type(),
                    ty => ty,
                };
                Ok(Target {
                    index,
                    name: db_column.name().to_string(),
                    column_type,
                    identity: db_column.is_identity(),
                    key: db_metadata.is_primary_key(db_column.name()),
                })
            })
            .collect()
    }

    /// Distinct table names in reverse dataset order.
    fn reverse_table_names(dataset: &dyn DataSet) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for table in dataset.reverse_iter() {
            let name = table.metadata().name();
            if !names
                .iter()
                .any(|n| names_equal(n, name, dataset.is_case_sensitive()))
            {
                names.push(name);
            }
        }
        names
    }

    fn clear_tables<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        dataset: &dyn DataSet,
        truncate: bool,
    ) -> Result<()> {
        let operation = if truncate { "TRUNCATE" } else { "DELETE_ALL" };
        let vendor = db.vendor();
        for name in Self::reverse_table_names(dataset) {
            let qualified = db.qualified_name(name)?;
            let sql = if truncate {
                vendor.truncate_statement(&qualified)
            } else {
                statement::delete_all(&qualified)
            };
            debug!("{}", sql);
            let deleted = db
                .connection_mut()
                .execute(&sql)
                .map_err(|e| wrap(operation, name, None, Some(&sql), e))?;
            info!("{} {}: {} row(s)", operation, name, deleted);
        }
        Ok(())
    }

    fn insert_table<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        identity: bool,
    ) -> Result<()> {
        let metadata = table.metadata();
        let name = metadata.name();
        if table.row_count() == 0 || metadata.column_count() == 0 {
            debug!("INSERT {}: nothing to insert", name);
            return Ok(());
        }

        let db_metadata = db.table_metadata(name)?;
        let targets: Vec<Target> = Self::targets(metadata, &db_metadata)?
            .into_iter()
            .filter(|t| identity || !t.identity)
            .collect();
        let qualified = db.qualified_name(name)?;
        let bracket = identity && targets.iter().any(|t| t.identity);

        let inserted = with_identity_bracket(db, &qualified, bracket, |db| {
            self.insert_rows(db, table, &qualified, &targets, identity)
        })?;
        info!("INSERT {}: {} row(s)", name, inserted);
        Ok(())
    }

    fn insert_rows<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        qualified: &str,
        targets: &[Target],
        identity: bool,
    ) -> Result<u64> {
        let name = table.metadata().name();
        let vendor = db.vendor();
        let runs = shape_runs(table.row_count(), |row| {
            targets
                .iter()
                .map(|t| -> Result<bool> { Ok(!table.value_at(row, t.index)?.is_unset()) })
                .collect::<Result<Vec<bool>>>()
        })?;

        let mut inserted = 0;
        for (shape, rows) in runs {
            let selected: Vec<&Target> = targets
                .iter()
                .zip(&shape)
                .filter(|(_, set)| **set)
                .map(|(t, _)| t)
                .collect();
            if selected.is_empty() {
                debug!("INSERT {}: rows {:?} provide no columns, skipped", name, rows);
                continue;
            }

            let columns: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
            let overriding = identity && selected.iter().any(|t| t.identity);
            let sql = statement::insert(&vendor, qualified, &columns, overriding)?;
            debug!("{}", sql);

            let prepared = db
                .connection_mut()
                .prepare(&sql)
                .map_err(|e| wrap("INSERT", name, Some(rows.start), Some(&sql), e))?;
            let mut writer = BatchWriter::new(
                prepared,
                sql.clone(),
                "INSERT",
                name,
                self.batch_size,
                self.batched,
            );
            for row in rows {
                let params = row_params(table, row, selected.iter().copied())
                    .map_err(|e| wrap("INSERT", name, Some(row), Some(&sql), e))?;
                writer.add(row, params)?;
            }
            inserted += writer.finish()?;
        }
        Ok(inserted)
    }

    fn update_table<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        identity: bool,
    ) -> Result<()> {
        let metadata = table.metadata();
        let name = metadata.name();
        let db_metadata = db.table_metadata(name)?;
        if !db_metadata.has_primary_key() {
            return Err(FixtureError::NoPrimaryKey(name.to_string()));
        }

        let targets = Self::targets(metadata, &db_metadata)?;
        let keys = Self::key_targets(&targets, &db_metadata)?;
        let settable: Vec<&Target> = targets
            .iter()
            .filter(|t| !t.key && (identity || !t.identity))
            .collect();
        if settable.is_empty() {
            warn!("UPDATE {}: no non-key columns, skipped", name);
            return Ok(());
        }
        if table.row_count() == 0 {
            return Ok(());
        }

        let qualified = db.qualified_name(name)?;
        let vendor = db.vendor();
        let runs = shape_runs(table.row_count(), |row| {
            Self::check_keys(table, row, &keys, "UPDATE")?;
            settable
                .iter()
                .map(|t| -> Result<bool> { Ok(!table.value_at(row, t.index)?.is_unset()) })
                .collect::<Result<Vec<bool>>>()
        })?;

        let mut updated = 0;
        for (shape, rows) in runs {
            let selected: Vec<&Target> = settable
                .iter()
                .zip(&shape)
                .filter(|(_, set)| **set)
                .map(|(t, _)| *t)
                .collect();
            if selected.is_empty() {
                debug!("UPDATE {}: rows {:?} provide no columns, skipped", name, rows);
                continue;
            }

            let set_columns: Vec<&str> = selected.iter().map(|t| t.name.as_str()).collect();
            let key_columns: Vec<&str> = keys.iter().map(|t| t.name.as_str()).collect();
            let sql = statement::update(&vendor, &qualified, &set_columns, &key_columns)?;
            debug!("{}", sql);

            let prepared = db
                .connection_mut()
                .prepare(&sql)
                .map_err(|e| wrap("UPDATE", name, Some(rows.start), Some(&sql), e))?;
            let mut writer = BatchWriter::new(
                prepared,
                sql.clone(),
                "UPDATE",
                name,
                self.batch_size,
                self.batched,
            );
            for row in rows {
                let params = row_params(
                    table,
                    row,
                    selected.iter().copied().chain(keys.iter().copied()),
                )
                .map_err(|e| wrap("UPDATE", name, Some(row), Some(&sql), e))?;
                writer.add(row, params)?;
            }
            updated += writer.finish()?;
        }
        info!("UPDATE {}: {} row(s)", name, updated);
        Ok(())
    }

    /// Primary key targets in key order. Every key column must be in the dataset.
    fn key_targets<'t>(targets: &'t [Target], db_metadata: &TableMetaData) -> Result<Vec<&'t Target>> {
        db_metadata
            .primary_keys()
            .iter()
            .map(|key| {
                targets
                    .iter()
                    .find(|t| t.name == *key)
                    .ok_or_else(|| FixtureError::no_such_column(db_metadata.name(), key.as_str()))
            })
            .collect()
    }

    /// Every key cell of a row must hold a value.
    fn check_keys(table: &dyn Table, row: usize, keys: &[&Target], operation: &str) -> Result<()> {
        for key in keys {
            if table.value_at(row, key.index)?.is_unset() {
                let name = table.metadata().name();
                return Err(wrap(
                    operation,
                    name,
                    Some(row),
                    None,
                    FixtureError::Protocol(format!(
                        "primary key column {} has no value",
                        key.name
                    )),
                ));
            }
        }
        Ok(())
    }

    fn delete_table<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
    ) -> Result<()> {
        let metadata = table.metadata();
        let name = metadata.name();
        if table.row_count() == 0 || metadata.column_count() == 0 {
            return Ok(());
        }

        let db_metadata = db.table_metadata(name)?;
        let targets = Self::targets(metadata, &db_metadata)?;
        let qualified = db.qualified_name(name)?;
        let vendor = db.vendor();
        let runs = shape_runs(table.row_count(), |row| {
            targets
                .iter()
                .map(|t| -> Result<Cell> { Ok(Cell::of(table.value_at(row, t.index)?)) })
                .collect::<Result<Vec<Cell>>>()
        })?;

        let mut deleted = 0;
        for (shape, rows) in runs {
            let conditions: Vec<Condition<'_>> = targets
                .iter()
                .zip(&shape)
                .filter_map(|(t, cell)| match cell {
                    Cell::Unset => None,
                    Cell::Null => Some(Condition::null(&t.name)),
                    Cell::Value => Some(Condition::equals(&t.name)),
                })
                .collect();
            if conditions.is_empty() {
                debug!("DELETE {}: rows {:?} provide no columns, skipped", name, rows);
                continue;
            }
            let bound: Vec<&Target> = targets
                .iter()
                .zip(&shape)
                .filter(|(_, cell)| **cell == Cell::Value)
                .map(|(t, _)| t)
                .collect();

            let sql = statement::delete_matching(&vendor, &qualified, &conditions)?;
            debug!("{}", sql);
            let prepared = db
                .connection_mut()
                .prepare(&sql)
                .map_err(|e| wrap("DELETE", name, Some(rows.start), Some(&sql), e))?;
            let mut writer = BatchWriter::new(
                prepared,
                sql.clone(),
                "DELETE",
                name,
                self.batch_size,
                self.batched,
            );
            for row in rows {
                let params = row_params(table, row, bound.iter().copied())
                    .map_err(|e| wrap("DELETE", name, Some(row), Some(&sql), e))?;
                writer.add(row, params)?;
            }
            deleted += writer.finish()?;
        }
        info!("DELETE {}: {} row(s)", name, deleted);
        Ok(())
    }

    fn refresh_table<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        identity: bool,
    ) -> Result<()> {
        let metadata = table.metadata();
        let name = metadata.name();
        if table.row_count() == 0 || metadata.column_count() == 0 {
            return Ok(());
        }

        let db_metadata = db.table_metadata(name)?;
        let targets = Self::targets(metadata, &db_metadata)?;
        let qualified = db.qualified_name(name)?;
        let insertable: Vec<&Target> = targets
            .iter()
            .filter(|t| identity || !t.identity)
            .collect();
        let bracket = identity && insertable.iter().any(|t| t.identity);

        let (updated, inserted) = with_identity_bracket(db, &qualified, bracket, |db| {
            if db_metadata.has_primary_key() {
                let keys = Self::key_targets(&targets, &db_metadata)?;
                self.refresh_keyed(db, table, &qualified, &targets, &keys, &insertable, identity)
            } else {
                self.refresh_unkeyed(db, table, &qualified, &insertable, identity)
            }
        })?;
        info!(
            "REFRESH {}: {} row(s) updated, {} row(s) inserted",
            name, updated, inserted
        );
        Ok(())
    }

    /// Probe each row by primary key; update when found, insert otherwise.
    #[allow(clippy::too_many_arguments)]
    fn refresh_keyed<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        qualified: &str,
        targets: &[Target],
        keys: &[&Target],
        insertable: &[&Target],
        identity: bool,
    ) -> Result<(u64, u64)> {
        let name = table.metadata().name();
        let vendor = db.vendor();
        let key_conditions: Vec<Condition<'_>> =
            keys.iter().map(|t| Condition::equals(&t.name)).collect();
        let key_columns: Vec<&str> = keys.iter().map(|t| t.name.as_str()).collect();
        let probe = statement::count_matching(&vendor, qualified, &key_conditions)?;

        let (mut updated, mut inserted) = (0, 0);
        for row in 0..table.row_count() {
            Self::check_keys(table, row, keys, "REFRESH")?;
            let key_params = row_params(table, row, keys.iter().copied())
                .map_err(|e| wrap("REFRESH", name, Some(row), Some(&probe), e))?;
            let exists = query_count(db, &probe, &key_params)
                .map_err(|e| wrap("REFRESH", name, Some(row), Some(&probe), e))?
                > 0;

            if exists {
                let set: Vec<&Target> = Self::provided(table, row, targets.iter().filter(|t| {
                    !t.key && (identity || !t.identity)
                }))?;
                if set.is_empty() {
                    continue;
                }
                let set_columns: Vec<&str> = set.iter().map(|t| t.name.as_str()).collect();
                let sql = statement::update(&vendor, qualified, &set_columns, &key_columns)?;
                let params = row_params(table, row, set.iter().copied().chain(keys.iter().copied()))
                    .map_err(|e| wrap("REFRESH", name, Some(row), Some(&sql), e))?;
                updated += execute_once(db, &sql, &params)
                    .map_err(|e| wrap("REFRESH", name, Some(row), Some(&sql), e))?;
            } else {
                inserted += self.insert_one(db, table, row, qualified, insertable, identity)?;
            }
        }
        Ok((updated, inserted))
    }

    /// Probe each row on its provided non-null columns; insert when absent,
    /// leave existing rows untouched.
    fn refresh_unkeyed<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        qualified: &str,
        insertable: &[&Target],
        identity: bool,
    ) -> Result<(u64, u64)> {
        let name = table.metadata().name();
        let vendor = db.vendor();
        let mut inserted = 0;
        for row in 0..table.row_count() {
            let mut probe_targets = Vec::new();
            for t in insertable {
                if Cell::of(table.value_at(row, t.index)?) == Cell::Value {
                    probe_targets.push(*t);
                }
            }
            if !probe_targets.is_empty() {
                let conditions: Vec<Condition<'_>> = probe_targets
                    .iter()
                    .map(|t| Condition::equals(&t.name))
                    .collect();
                let probe = statement::count_matching(&vendor, qualified, &conditions)?;
                let params = row_params(table, row, probe_targets.iter().copied())
                    .map_err(|e| wrap("REFRESH", name, Some(row), Some(&probe), e))?;
                let exists = query_count(db, &probe, &params)
                    .map_err(|e| wrap("REFRESH", name, Some(row), Some(&probe), e))?
                    > 0;
                if exists {
                    debug!("REFRESH {}: row {} already present", name, row);
                    continue;
                }
            }
            inserted += self.insert_one(db, table, row, qualified, insertable, identity)?;
        }
        Ok((0, inserted))
    }

    /// Targets whose cell in `row` is not unset.
    fn provided<'t>(
        table: &dyn Table,
        row: usize,
        targets: impl IntoIterator<Item = &'t Target>,
    ) -> Result<Vec<&'t Target>> {
        let mut provided = Vec::new();
        for t in targets {
            if !table.value_at(row, t.index)?.is_unset() {
                provided.push(t);
            }
        }
        Ok(provided)
    }

    fn insert_one<C: Connection>(
        &self,
        db: &mut DatabaseConnection<C>,
        table: &dyn Table,
        row: usize,
        qualified: &str,
        insertable: &[&Target],
        identity: bool,
    ) -> Result<u64> {
        let name = table.metadata().name();
        let columns = Self::provided(table, row, insertable.iter().copied())?;
        if columns.is_empty() {
            return Ok(0);
        }
        let names: Vec<&str> = columns.iter().map(|t| t.name.as_str()).collect();
        let overriding = identity && columns.iter().any(|t| t.identity);
        let sql = statement::insert(&db.vendor(), qualified, &names, overriding)?;
        let params = row_params(table, row, columns.iter().copied())
            .map_err(|e| wrap("REFRESH", name, Some(row), Some(&sql), e))?;
        execute_once(db, &sql, &params).map_err(|e| wrap("REFRESH", name, Some(row), Some(&sql), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operations() {
        assert_eq!("CLEAN_INSERT".parse::<Operation>().unwrap(), Operation::CleanInsert);
        assert_eq!("delete-all".parse::<Operation>().unwrap(), Operation::DeleteAll);
        assert_eq!(
            "transaction(identity_insert(refresh))".parse::<Operation>().unwrap(),
            Operation::Refresh.with_identity_insert().in_transaction()
        );
        assert_eq!(
            "delete_all, transaction(insert)".parse::<Operation>().unwrap(),
            Operation::Composite(vec![
                Operation::DeleteAll,
                Operation::Insert.in_transaction()
            ])
        );
        assert!("upsert".parse::<Operation>().is_err());
        assert!("transaction(insert".parse::<Operation>().is_err());
        assert!("retry(insert)".parse::<Operation>().is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let op = Operation::Composite(vec![
            Operation::Truncate,
            Operation::CleanInsert.with_identity_insert().in_transaction(),
        ]);
        let text = op.to_string();
        assert_eq!(text, "truncate, transaction(identity_insert(clean_insert))");
        assert_eq!(text.parse::<Operation>().unwrap(), op);
    }

    #[test]
    fn test_shape_runs_group_consecutive_rows() {
        let shapes = [1, 1, 2, 2, 1];
        let runs = shape_runs(shapes.len(), |row| Ok(shapes[row])).unwrap();
        assert_eq!(runs, vec![(1, 0..2), (2, 2..4), (1, 4..5)]);
        assert!(shape_runs(0, |_| Ok(0)).unwrap().is_empty());
    }

    #[test]
    fn test_wrap_keeps_existing_context() {
        let inner = FixtureError::operation("INSERT", "T", Some(3), None, FixtureError::database("x"));
        match wrap("REFRESH", "U", Some(1), None, inner) {
            FixtureError::DatabaseOperation { operation, table, row, .. } => {
                assert_eq!(operation, "INSERT");
                assert_eq!(table, "T");
                assert_eq!(row, Some(3));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
