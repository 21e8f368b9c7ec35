//! Table metadata: ordered columns, primary keys and the name case policy.

use serde::Serialize;

use super::column::{names_equal, Column};
use crate::error::{FixtureError, Result};

/// Ordered column list with primary keys for one table.
///
/// Column names are unique under the metadata's case policy, which is
/// case-insensitive unless constructed otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableMetaData {
    name: String,
    columns: Vec<Column>,
    primary_keys: Vec<String>,
    case_sensitive: bool,
}

impl TableMetaData {
    /// Create case-insensitive metadata without primary keys.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self> {
        Self::with_options(name, columns, Vec::<String>::new(), false)
    }

    /// Create metadata with explicit primary keys and case policy.
    ///
    /// Fails with `DuplicateColumn` on a repeated column name and with
    /// `NoSuchColumn` when a primary key names an absent column.
    pub fn with_options<S: AsRef<str>>(
        name: impl Into<String>,
        columns: Vec<Column>,
        primary_keys: Vec<S>,
        case_sensitive: bool,
    ) -> Result<Self> {
        let name = name.into();
        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|c| names_equal(c.name(), column.name(), case_sensitive))
            {
                return Err(FixtureError::DuplicateColumn {
                    table: name,
                    column: column.name().to_string(),
                });
            }
        }

        let mut meta = Self {
            name,
            columns,
            primary_keys: Vec::new(),
            case_sensitive,
        };
        for key in primary_keys {
            let column = meta.find_column(key.as_ref())?.name().to_string();
            if !meta.primary_keys.contains(&column) {
                meta.primary_keys.push(column);
            }
        }
        Ok(meta)
    }

    /// Replace the primary keys.
    pub fn with_primary_keys<S: AsRef<str>>(self, keys: &[S]) -> Result<Self> {
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        Self::with_options(self.name, self.columns, keys, self.case_sensitive)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declared order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Primary key column names, as declared by the columns.
    #[must_use]
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    #[must_use]
    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.primary_keys
            .iter()
            .filter_map(|key| self.position(key).map(|i| &self.columns[i]))
            .collect()
    }

    pub fn identity_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_identity()).collect()
    }

    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.columns.iter().any(Column::is_identity)
    }

    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Whether a column name is a primary key under the case policy.
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys
            .iter()
            .any(|k| names_equal(k, column, self.case_sensitive))
    }

    /// Index of a column, or `None` when absent.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name_matches(column, self.case_sensitive))
    }

    /// Index of a column; fails with `NoSuchColumn` when absent.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.position(column)
            .ok_or_else(|| FixtureError::no_such_column(&self.name, column))
    }

    /// Look up a column; fails with `NoSuchColumn` when absent.
    pub fn find_column(&self, column: &str) -> Result<&Column> {
        self.column_index(column).map(|i| &self.columns[i])
    }

    /// Same column names, order and types. The table name is not compared.
    pub fn structurally_equal(&self, other: &TableMetaData) -> bool {
        let case_sensitive = self.case_sensitive && other.case_sensitive;
        self.columns.len() == other.columns.len()
            && self.columns.iter().zip(&other.columns).all(|(a, b)| {
                a.name_matches(b.name(), case_sensitive) && a.data_type() == b.data_type()
            })
    }

    /// Metadata restricted to the given column indices, in that order.
    ///
    /// Primary keys whose column is dropped are dropped too.
    pub(crate) fn project(&self, indices: &[usize]) -> TableMetaData {
        let columns: Vec<Column> = indices
            .iter()
            .filter_map(|&i| self.columns.get(i).cloned())
            .collect();
        let primary_keys = self
            .primary_keys
            .iter()
            .filter(|k| columns.iter().any(|c| c.name() == k.as_str()))
            .cloned()
            .collect();
        TableMetaData {
            name: self.name.clone(),
            columns,
            primary_keys,
            case_sensitive: self.case_sensitive,
        }
    }

    /// Same metadata under another table name.
    pub(crate) fn renamed(&self, name: impl Into<String>) -> TableMetaData {
        TableMetaData {
            name: name.into(),
            ..self.clone()
        }
    }
}
