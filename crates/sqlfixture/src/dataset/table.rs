//! Tables: metadata plus positionally aligned rows.

use std::cmp::Ordering;

use tracing::debug;

use super::filter::WildcardPattern;
use crate::core::column::Column;
use crate::core::metadata::TableMetaData;
use crate::core::value::Value;
use crate::error::{FixtureError, Result};

/// Read-only table view.
///
/// Row indices run from `0` to `row_count() - 1`. Consumers loop with
/// [`Table::has_row`] or a `row_count()` bound; `RowOutOfBounds` is reserved
/// for genuinely invalid indices.
pub trait Table {
    fn metadata(&self) -> &TableMetaData;

    fn row_count(&self) -> usize;

    /// Value by row and column position.
    fn value_at(&self, row: usize, column: usize) -> Result<&Value>;

    /// Value by row and column name.
    ///
    /// An absent column is `NoSuchColumn`; an invalid row is `RowOutOfBounds`.
    fn value(&self, row: usize, column: &str) -> Result<&Value> {
        let index = self.metadata().column_index(column)?;
        self.value_at(row, index)
    }

    fn has_row(&self, row: usize) -> bool {
        row < self.row_count()
    }

    /// Clone one row's values in column order.
    fn row_values(&self, row: usize) -> Result<Vec<Value>> {
        (0..self.metadata().column_count())
            .map(|column| self.value_at(row, column).cloned())
            .collect()
    }
}

fn out_of_bounds(metadata: &TableMetaData, row: usize, row_count: usize) -> FixtureError {
    FixtureError::RowOutOfBounds {
        table: metadata.name().to_string(),
        row,
        row_count,
    }
}

/// In-memory table built row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultTable {
    metadata: TableMetaData,
    rows: Vec<Vec<Value>>,
}

impl DefaultTable {
    pub fn new(metadata: TableMetaData) -> Self {
        Self {
            metadata,
            rows: Vec::new(),
        }
    }

    /// Create a table and append every row.
    pub fn with_rows(metadata: TableMetaData, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Self::new(metadata);
        for row in rows {
            table.add_row(row)?;
        }
        Ok(table)
    }

    /// Append a row; it must carry exactly one value per column.
    pub fn add_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.metadata.column_count() {
            return Err(FixtureError::Protocol(format!(
                "row for table {} has {} values but the table has {} columns",
                self.metadata.name(),
                values.len(),
                self.metadata.column_count()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    /// Copy any table into an owned one.
    pub fn copy_of(table: &dyn Table) -> Result<Self> {
        let mut copy = Self::new(table.metadata().clone());
        for row in 0..table.row_count() {
            copy.rows.push(table.row_values(row)?);
        }
        Ok(copy)
    }
}

impl Table for DefaultTable {
    fn metadata(&self) -> &TableMetaData {
        &self.metadata
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn value_at(&self, row: usize, column: usize) -> Result<&Value> {
        let values = self
            .rows
            .get(row)
            .ok_or_else(|| out_of_bounds(&self.metadata, row, self.rows.len()))?;
        values.get(column).ok_or_else(|| {
            FixtureError::no_such_column(self.metadata.name(), format!("#{}", column))
        })
    }
}

/// Table view with rows reordered by a set of columns.
///
/// Each sort column is compared with its column type; NULL sorts first.
/// Values that do not cast fall back to text ordering.
pub struct SortedTable<'a> {
    inner: &'a dyn Table,
    order: Vec<usize>,
}

impl<'a> SortedTable<'a> {
    /// Sort by the primary keys, or by every column when there are none.
    pub fn new(inner: &'a dyn Table) -> Result<Self> {
        let metadata = inner.metadata();
        let columns: Vec<Column> = if metadata.has_primary_key() {
            metadata.primary_key_columns().into_iter().cloned().collect()
        } else {
            metadata.columns().to_vec()
        };
        Self::with_column_types(inner, &columns)
    }

    /// Sort by the named columns using this table's column types.
    pub fn by_columns(inner: &'a dyn Table, columns: &[&str]) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|name| inner.metadata().find_column(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Self::with_column_types(inner, &columns)
    }

    /// Sort by columns matched by name, comparing with the given types.
    ///
    /// Lets an untyped expected table sort the same way as a typed actual one.
    pub fn with_column_types(inner: &'a dyn Table, columns: &[Column]) -> Result<Self> {
        let keys = columns
            .iter()
            .map(|c| {
                inner
                    .metadata()
                    .column_index(c.name())
                    .map(|index| (index, c.data_type()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..inner.row_count()).collect();
        let mut failure = None;
        order.sort_by(|&a, &b| {
            for &(column, ty) in &keys {
                let (va, vb) = match (inner.value_at(a, column), inner.value_at(b, column)) {
                    (Ok(va), Ok(vb)) => (va, vb),
                    (Err(e), _) | (_, Err(e)) => {
                        failure.get_or_insert(e);
                        return Ordering::Equal;
                    }
                };
                let ordering = ty
                    .compare(va, vb)
                    .unwrap_or_else(|_| va.to_text().cmp(&vb.to_text()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(e) = failure {
            return Err(e);
        }

        debug!(
            "Sorted table {} by {} column(s)",
            inner.metadata().name(),
            keys.len()
        );
        Ok(Self { inner, order })
    }
}

impl Table for SortedTable<'_> {
    fn metadata(&self) -> &TableMetaData {
        self.inner.metadata()
    }

    fn row_count(&self) -> usize {
        self.order.len()
    }

    fn value_at(&self, row: usize, column: usize) -> Result<&Value> {
        let source = *self
            .order
            .get(row)
            .ok_or_else(|| out_of_bounds(self.inner.metadata(), row, self.order.len()))?;
        self.inner.value_at(source, column)
    }
}

/// Table view exposing a subset of the columns.
pub struct ColumnFilterTable<'a> {
    inner: &'a dyn Table,
    metadata: TableMetaData,
    columns: Vec<usize>,
}

impl<'a> ColumnFilterTable<'a> {
    /// Keep only columns matching any of the wildcard patterns.
    pub fn include(inner: &'a dyn Table, patterns: &[&str]) -> Result<Self> {
        Self::filtered(inner, patterns, true)
    }

    /// Drop columns matching any of the wildcard patterns.
    pub fn exclude(inner: &'a dyn Table, patterns: &[&str]) -> Result<Self> {
        Self::filtered(inner, patterns, false)
    }

    fn filtered(inner: &'a dyn Table, patterns: &[&str], keep_matches: bool) -> Result<Self> {
        let source = inner.metadata();
        let patterns = patterns
            .iter()
            .map(|p| WildcardPattern::new(p, source.is_case_sensitive()))
            .collect::<Result<Vec<_>>>()?;

        let columns: Vec<usize> = source
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| patterns.iter().any(|p| p.matches(c.name())) == keep_matches)
            .map(|(i, _)| i)
            .collect();

        Ok(Self {
            inner,
            metadata: source.project(&columns),
            columns,
        })
    }
}

impl Table for ColumnFilterTable<'_> {
    fn metadata(&self) -> &TableMetaData {
        &self.metadata
    }

    fn row_count(&self) -> usize {
        self.inner.row_count()
    }

    fn value_at(&self, row: usize, column: usize) -> Result<&Value> {
        let source = *self.columns.get(column).ok_or_else(|| {
            FixtureError::no_such_column(self.metadata.name(), format!("#{}", column))
        })?;
        self.inner.value_at(row, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ColumnType;

    fn make_test_table() -> DefaultTable {
        let metadata = TableMetaData::with_options(
            "PEOPLE",
            vec![
                Column::new("ID", ColumnType::Integer),
                Column::new("NAME", ColumnType::Varchar),
                Column::new("AGE", ColumnType::Integer),
            ],
            vec!["ID"],
            false,
        )
        .unwrap();
        DefaultTable::with_rows(
            metadata,
            vec![
                vec![Value::Int(10), Value::from("carol"), Value::Int(40)],
                vec![Value::Int(2), Value::from("alice"), Value::Null],
                vec![Value::Int(7), Value::from("bob"), Value::Int(25)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_value_lookup() {
        let table = make_test_table();
        assert_eq!(table.value(1, "name").unwrap(), &Value::from("alice"));
        assert_eq!(table.value_at(0, 0).unwrap(), &Value::Int(10));
    }

    #[test]
    fn test_value_errors_are_distinct() {
        let table = make_test_table();
        assert!(matches!(
            table.value(0, "MISSING"),
            Err(FixtureError::NoSuchColumn { .. })
        ));
        let err = table.value(3, "ID").unwrap_err();
        assert!(err.is_row_out_of_bounds());
    }

    #[test]
    fn test_bounded_row_loop() {
        let table = make_test_table();
        let mut seen = 0;
        let mut row = 0;
        while table.has_row(row) {
            table.value(row, "ID").unwrap();
            seen += 1;
            row += 1;
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn test_add_row_rejects_misaligned_row() {
        let mut table = make_test_table();
        let err = table.add_row(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, FixtureError::Protocol(_)));
    }

    #[test]
    fn test_sorted_table_by_primary_key() {
        let table = make_test_table();
        let sorted = SortedTable::new(&table).unwrap();
        let ids: Vec<_> = (0..sorted.row_count())
            .map(|r| sorted.value(r, "ID").unwrap().clone())
            .collect();
        assert_eq!(ids, vec![Value::Int(2), Value::Int(7), Value::Int(10)]);
    }

    #[test]
    fn test_sorted_table_null_first() {
        let table = make_test_table();
        let sorted = SortedTable::by_columns(&table, &["AGE"]).unwrap();
        assert_eq!(sorted.value(0, "AGE").unwrap(), &Value::Null);
        assert_eq!(sorted.value(2, "AGE").unwrap(), &Value::Int(40));
    }

    #[test]
    fn test_sorted_untyped_uses_given_types() {
        let metadata = TableMetaData::new("T", vec![Column::untyped("N")]).unwrap();
        let table = DefaultTable::with_rows(
            metadata,
            vec![vec![Value::from("10")], vec![Value::from("9")]],
        )
        .unwrap();
        let typed = [Column::new("N", ColumnType::Integer)];
        let sorted = SortedTable::with_column_types(&table, &typed).unwrap();
        assert_eq!(sorted.value(0, "N").unwrap(), &Value::from("9"));
    }

    #[test]
    fn test_column_filter_table() {
        let table = make_test_table();
        let filtered = ColumnFilterTable::exclude(&table, &["A*"]).unwrap();
        assert_eq!(filtered.metadata().column_names(), vec!["ID", "NAME"]);
        assert_eq!(filtered.value(2, "NAME").unwrap(), &Value::from("bob"));
        assert!(filtered.value(0, "AGE").is_err());

        let only = ColumnFilterTable::include(&table, &["n?me"]).unwrap();
        assert_eq!(only.metadata().column_names(), vec!["NAME"]);
    }
}
