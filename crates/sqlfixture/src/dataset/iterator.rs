//! Table iteration with an explicit positioned state.
//!
//! A cursor starts before the first table. [`TableCursor::advance`] moves to
//! the next table and returns `false` once exhausted (and keeps returning
//! `false`). Reading the current table before the first successful advance
//! or after exhaustion fails with `IteratorState`.

use std::marker::PhantomData;

use super::filter::TableFilter;
use super::Table;
use crate::core::metadata::TableMetaData;
use crate::error::{FixtureError, Result};

/// Positioned iteration over tables.
pub trait TableCursor<'a> {
    /// Move to the next table. Returns `false` when there is none.
    fn advance(&mut self) -> bool;

    /// Table at the current position.
    fn table(&self) -> Result<&'a dyn Table>;

    /// Metadata of the table at the current position.
    fn metadata(&self) -> Result<&'a TableMetaData> {
        self.table().map(|t| t.metadata())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    Exhausted,
}

/// Cursor over a fixed table sequence.
pub struct TableIterator<'a> {
    tables: Vec<&'a dyn Table>,
    position: Position,
}

impl<'a> TableIterator<'a> {
    pub fn new(tables: Vec<&'a dyn Table>) -> Self {
        Self {
            tables,
            position: Position::BeforeFirst,
        }
    }

    /// Cursor visiting the tables in the opposite order.
    pub fn reversed(mut tables: Vec<&'a dyn Table>) -> Self {
        tables.reverse();
        Self::new(tables)
    }
}

impl<'a> TableCursor<'a> for TableIterator<'a> {
    fn advance(&mut self) -> bool {
        let next = match self.position {
            Position::BeforeFirst => 0,
            Position::At(i) => i + 1,
            Position::Exhausted => return false,
        };
        if next < self.tables.len() {
            self.position = Position::At(next);
            true
        } else {
            self.position = Position::Exhausted;
            false
        }
    }

    fn table(&self) -> Result<&'a dyn Table> {
        match self.position {
            Position::At(i) => Ok(self.tables[i]),
            Position::BeforeFirst => Err(FixtureError::IteratorState(
                "table() called before advance()",
            )),
            Position::Exhausted => Err(FixtureError::IteratorState(
                "table() called after the iterator was exhausted",
            )),
        }
    }
}

impl<'a> Iterator for TableIterator<'a> {
    type Item = &'a dyn Table;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            self.table().ok()
        } else {
            None
        }
    }
}

/// Cursor decorator skipping tables the filter rejects.
pub struct FilteredIterator<'a, C, F> {
    inner: C,
    filter: F,
    _tables: PhantomData<&'a dyn Table>,
}

impl<'a, C: TableCursor<'a>, F: TableFilter> FilteredIterator<'a, C, F> {
    pub fn new(inner: C, filter: F) -> Self {
        Self {
            inner,
            filter,
            _tables: PhantomData,
        }
    }
}

impl<'a, C: TableCursor<'a>, F: TableFilter> TableCursor<'a> for FilteredIterator<'a, C, F> {
    fn advance(&mut self) -> bool {
        while self.inner.advance() {
            match self.inner.table() {
                Ok(table) if self.filter.accept(table.metadata().name()) => return true,
                _ => continue,
            }
        }
        false
    }

    fn table(&self) -> Result<&'a dyn Table> {
        self.inner.table()
    }
}

impl<'a, C: TableCursor<'a>, F: TableFilter> Iterator for FilteredIterator<'a, C, F> {
    type Item = &'a dyn Table;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            self.table().ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::column::Column;
    use crate::dataset::filter::ExcludeTableFilter;
    use crate::dataset::DefaultTable;

    fn make_test_tables() -> Vec<DefaultTable> {
        ["A", "B", "C"]
            .iter()
            .map(|name| {
                DefaultTable::new(TableMetaData::new(*name, vec![Column::untyped("ID")]).unwrap())
            })
            .collect()
    }

    fn names<'a>(iter: impl Iterator<Item = &'a dyn Table>) -> Vec<String> {
        iter.map(|t| t.metadata().name().to_string()).collect()
    }

    #[test]
    fn test_table_before_advance_fails() {
        let tables = make_test_tables();
        let iter = TableIterator::new(tables.iter().map(|t| t as &dyn Table).collect());
        assert!(matches!(iter.table(), Err(FixtureError::IteratorState(_))));
        assert!(iter.metadata().is_err());
    }

    #[test]
    fn test_exhausted_stays_exhausted() {
        let tables = make_test_tables();
        let mut iter = TableIterator::new(tables.iter().map(|t| t as &dyn Table).collect());
        assert!(iter.advance());
        assert!(iter.advance());
        assert!(iter.advance());
        assert_eq!(iter.metadata().unwrap().name(), "C");
        assert!(!iter.advance());
        assert!(!iter.advance());
        assert!(matches!(iter.table(), Err(FixtureError::IteratorState(_))));
    }

    #[test]
    fn test_empty_iterator() {
        let mut iter = TableIterator::new(Vec::new());
        assert!(!iter.advance());
        assert!(iter.table().is_err());
    }

    #[test]
    fn test_reverse_order() {
        let tables = make_test_tables();
        let iter = TableIterator::reversed(tables.iter().map(|t| t as &dyn Table).collect());
        assert_eq!(names(iter), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_filtered_iterator_keeps_relative_order() {
        let tables = make_test_tables();
        let inner = TableIterator::new(tables.iter().map(|t| t as &dyn Table).collect());
        let filter = ExcludeTableFilter::new(&["b"], false).unwrap();
        let iter = FilteredIterator::new(inner, filter);
        assert_eq!(names(iter), vec!["A", "C"]);
    }
}
