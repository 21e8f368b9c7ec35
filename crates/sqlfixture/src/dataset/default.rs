//! Owned dataset with unique table names.

use super::{DataSet, DefaultTable, Table};
use crate::core::column::names_equal;
use crate::error::{FixtureError, Result};

/// Dataset owning its tables, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefaultDataSet {
    tables: Vec<DefaultTable>,
    case_sensitive: bool,
}

impl DefaultDataSet {
    /// Empty case-insensitive dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty dataset with case-sensitive table names.
    pub fn case_sensitive() -> Self {
        Self {
            tables: Vec::new(),
            case_sensitive: true,
        }
    }

    /// Build a case-insensitive dataset from tables.
    pub fn from_tables(tables: Vec<DefaultTable>) -> Result<Self> {
        let mut dataset = Self::new();
        for table in tables {
            dataset.add_table(table)?;
        }
        Ok(dataset)
    }

    /// Append a table. Fails with `DuplicateTable` if the name is taken.
    pub fn add_table(&mut self, table: DefaultTable) -> Result<()> {
        let name = table.metadata().name();
        if self
            .tables
            .iter()
            .any(|t| names_equal(t.metadata().name(), name, self.case_sensitive))
        {
            return Err(FixtureError::DuplicateTable(name.to_string()));
        }
        self.tables.push(table);
        Ok(())
    }

    /// Copy every table of another dataset into an owned one.
    pub fn copy_of(dataset: &dyn DataSet) -> Result<Self> {
        let mut copy = Self {
            tables: Vec::new(),
            case_sensitive: dataset.is_case_sensitive(),
        };
        for table in dataset.tables() {
            copy.add_table(DefaultTable::copy_of(table)?)?;
        }
        Ok(copy)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl DataSet for DefaultDataSet {
    fn tables(&self) -> Vec<&dyn Table> {
        self.tables.iter().map(|t| t as &dyn Table).collect()
    }

    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}
