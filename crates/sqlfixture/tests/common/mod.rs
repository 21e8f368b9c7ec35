//! Recording fake connection for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;

use sqlfixture::core::column::Column;
use sqlfixture::{
    ColumnInfo, ColumnType, Connection, DefaultTable, FixtureError, PreparedStatement, Result,
    ResultSet, SqlValue, TableMetaData, Value,
};

/// Install a test subscriber once; RUST_LOG controls the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One thing the connection was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Unparameterized statement.
    Execute(String),
    /// A flushed batch: statement and one parameter set per row.
    Batch(String, Vec<Vec<SqlValue<'static>>>),
    /// Prepared statement run once.
    Run(String, Vec<SqlValue<'static>>),
    /// Query, plain or prepared.
    Query(String),
    Commit,
    Rollback,
    AutoCommit(bool),
}

/// Catalog entry plus the rows a snapshot query returns.
#[derive(Debug, Clone)]
pub struct FakeTable {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_keys: Vec<String>,
    pub rows: Vec<Vec<SqlValue<'static>>>,
}

impl FakeTable {
    pub fn new(name: &str, columns: Vec<ColumnInfo>, primary_keys: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns,
            primary_keys: primary_keys.iter().map(|k| k.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<SqlValue<'static>>>) -> Self {
        self.rows = rows;
        self
    }
}

/// Connection that records statements instead of running them.
#[derive(Debug)]
pub struct FakeConnection {
    pub product: String,
    pub tables: Vec<FakeTable>,
    pub events: Vec<Event>,
    pub auto_commit: bool,
    /// Statements containing this text fail on execution.
    pub fail_on: Option<String>,
    /// Batches or runs binding this value fail.
    pub fail_on_value: Option<SqlValue<'static>>,
    /// Answers for `SELECT COUNT(*)` probes, in order; 0 once drained.
    pub counts: VecDeque<u64>,
}

impl FakeConnection {
    pub fn new(tables: Vec<FakeTable>) -> Self {
        Self {
            product: "Test DB".to_string(),
            tables,
            events: Vec::new(),
            auto_commit: true,
            fail_on: None,
            fail_on_value: None,
            counts: VecDeque::new(),
        }
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    pub fn failing_on_value(mut self, value: SqlValue<'static>) -> Self {
        self.fail_on_value = Some(value);
        self
    }

    fn check_params(&self, rows: &[Vec<SqlValue<'static>>]) -> Result<()> {
        match &self.fail_on_value {
            Some(bad) if rows.iter().any(|row| row.contains(bad)) => {
                Err(FixtureError::database(format!("check constraint violated by {:?}", bad)))
            }
            _ => Ok(()),
        }
    }

    fn check(&self, sql: &str) -> Result<()> {
        match &self.fail_on {
            Some(text) if sql.contains(text.as_str()) => {
                Err(FixtureError::database(format!("constraint violated: {}", sql)))
            }
            _ => Ok(()),
        }
    }

    fn answer(&mut self, sql: &str) -> ResultSet {
        if sql.starts_with("SELECT COUNT(*)") {
            let count = self.counts.pop_front().unwrap_or(0);
            return ResultSet::new(
                vec![ColumnInfo::new("COUNT", "bigint", -5)],
                vec![vec![SqlValue::I64(count as i64)]],
            );
        }
        match self
            .tables
            .iter()
            .find(|t| sql.contains(&format!("FROM \"{}\"", t.name)))
        {
            Some(table) => ResultSet::new(table.columns.clone(), table.rows.clone()),
            None => ResultSet::default(),
        }
    }

    /// SQL of every recorded event that carries a statement.
    pub fn statements(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Execute(sql) | Event::Batch(sql, _) | Event::Run(sql, _) => {
                    Some(sql.as_str())
                }
                Event::Query(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Flushed batches in order.
    pub fn batches(&self) -> Vec<(&str, &[Vec<SqlValue<'static>>])> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Batch(sql, rows) => Some((sql.as_str(), rows.as_slice())),
                _ => None,
            })
            .collect()
    }

    fn table(&self, name: &str) -> Option<&FakeTable> {
        self.tables.iter().find(|t| t.name == name)
    }
}

struct FakeStatement<'a> {
    conn: &'a mut FakeConnection,
    sql: String,
    batch: Vec<Vec<SqlValue<'static>>>,
}

impl PreparedStatement for FakeStatement<'_> {
    fn add_batch(&mut self, params: Vec<SqlValue<'static>>) -> Result<()> {
        self.batch.push(params);
        Ok(())
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.conn.check(&self.sql)?;
        self.conn.check_params(&self.batch)?;
        let rows = self.batch.clone();
        let counts = vec![1; rows.len()];
        self.conn.events.push(Event::Batch(self.sql.clone(), rows));
        Ok(counts)
    }

    fn clear_batch(&mut self) {
        self.batch.clear();
    }

    fn execute(&mut self, params: &[SqlValue<'_>]) -> Result<u64> {
        self.conn.check(&self.sql)?;
        let params: Vec<SqlValue<'static>> =
            params.iter().map(|p| p.clone().into_owned()).collect();
        self.conn.check_params(std::slice::from_ref(&params))?;
        self.conn.events.push(Event::Run(self.sql.clone(), params));
        Ok(1)
    }

    fn query(&mut self, _params: &[SqlValue<'_>]) -> Result<ResultSet> {
        self.conn.events.push(Event::Query(self.sql.clone()));
        let sql = self.sql.clone();
        Ok(self.conn.answer(&sql))
    }
}

impl Connection for FakeConnection {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        self.check(sql)?;
        self.events.push(Event::Execute(sql.to_string()));
        Ok(0)
    }

    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement + '_>> {
        Ok(Box::new(FakeStatement {
            conn: self,
            sql: sql.to_string(),
            batch: Vec::new(),
        }))
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        self.events.push(Event::Query(sql.to_string()));
        Ok(self.answer(sql))
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.auto_commit = auto_commit;
        self.events.push(Event::AutoCommit(auto_commit));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.events.push(Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.events.push(Event::Rollback);
        Ok(())
    }

    fn table_names(&mut self, _schema: Option<&str>) -> Result<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.name.clone()).collect())
    }

    fn columns(&mut self, _schema: Option<&str>, table: &str) -> Result<Vec<ColumnInfo>> {
        self.table(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| FixtureError::NoSuchTable(table.to_string()))
    }

    fn primary_keys(&mut self, _schema: Option<&str>, table: &str) -> Result<Vec<String>> {
        self.table(table)
            .map(|t| t.primary_keys.clone())
            .ok_or_else(|| FixtureError::NoSuchTable(table.to_string()))
    }

    fn product_name(&self) -> &str {
        &self.product
    }

    fn product_version(&self) -> &str {
        "1.0"
    }
}

/// PARENT(ID pk, NAME) and CHILD(ID pk, PARENT_ID, NOTE) catalog entries.
pub fn make_test_catalog() -> Vec<FakeTable> {
    vec![
        FakeTable::new(
            "PARENT",
            vec![
                ColumnInfo::new("ID", "integer", 4),
                ColumnInfo::new("NAME", "varchar", 12),
            ],
            &["ID"],
        ),
        FakeTable::new(
            "CHILD",
            vec![
                ColumnInfo::new("ID", "integer", 4),
                ColumnInfo::new("PARENT_ID", "integer", 4),
                ColumnInfo::new("NOTE", "varchar", 12),
            ],
            &["ID"],
        ),
    ]
}

/// Untyped dataset table from column names and rows.
pub fn make_test_table(name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> DefaultTable {
    let metadata = TableMetaData::new(
        name,
        columns
            .iter()
            .map(|c| Column::new(*c, ColumnType::Unknown))
            .collect(),
    )
    .unwrap();
    DefaultTable::with_rows(metadata, rows).unwrap()
}
