//! Borrowing dataset views.

use super::filter::TableFilter;
use super::{DataSet, Table};

/// Concatenation of other datasets' table sequences.
///
/// Rows are never copied and repeated names are kept: iteration yields each
/// instance, while lookup by an ambiguous name fails with
/// `AmbiguousTableName`.
pub struct CompositeDataSet<'a> {
    tables: Vec<&'a dyn Table>,
    case_sensitive: bool,
}

impl<'a> CompositeDataSet<'a> {
    /// Compose datasets in the given order.
    ///
    /// Names are case-sensitive only when every source dataset is.
    pub fn new(datasets: &[&'a dyn DataSet]) -> Self {
        let case_sensitive =
            !datasets.is_empty() && datasets.iter().all(|d| d.is_case_sensitive());
        Self {
            tables: datasets.iter().copied().flat_map(|d| d.tables()).collect(),
            case_sensitive,
        }
    }

    /// Compose loose tables.
    pub fn from_tables(tables: Vec<&'a dyn Table>, case_sensitive: bool) -> Self {
        Self {
            tables,
            case_sensitive,
        }
    }
}

impl DataSet for CompositeDataSet<'_> {
    fn tables(&self) -> Vec<&dyn Table> {
        self.tables.clone()
    }

    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// Dataset view keeping only the tables a filter selects.
pub struct FilteredDataSet<'a> {
    tables: Vec<&'a dyn Table>,
    case_sensitive: bool,
}

impl<'a> FilteredDataSet<'a> {
    pub fn new(dataset: &'a dyn DataSet, filter: &dyn TableFilter) -> Self {
        Self {
            tables: filter.select(dataset.tables()),
            case_sensitive: dataset.is_case_sensitive(),
        }
    }
}

impl DataSet for FilteredDataSet<'_> {
    fn tables(&self) -> Vec<&dyn Table> {
        self.tables.clone()
    }

    fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::column::Column;
    use crate::core::metadata::TableMetaData;
    use crate::core::value::Value;
    use crate::dataset::{DefaultDataSet, DefaultTable, SequenceTableFilter};
    use crate::error::FixtureError;

    fn make_test_table(name: &str, rows: usize) -> DefaultTable {
        let meta = TableMetaData::new(name, vec![Column::untyped("id")]).unwrap();
        DefaultTable::with_rows(
            meta,
            (0..rows).map(|i| vec![Value::Int(i as i64)]).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_composite_keeps_duplicates() {
        let a = DefaultDataSet::from_tables(vec![make_test_table("T", 1)]).unwrap();
        let b = DefaultDataSet::from_tables(vec![make_test_table("t", 2)]).unwrap();
        let composite = CompositeDataSet::new(&[&a, &b]);

        let counts: Vec<usize> = composite.iter().map(|t| t.row_count()).collect();
        assert_eq!(counts, vec![1, 2]);
        assert!(matches!(
            composite.table("T"),
            Err(FixtureError::AmbiguousTableName(_))
        ));
    }

    #[test]
    fn test_composite_borrows_rows() {
        let a = DefaultDataSet::from_tables(vec![make_test_table("X", 3)]).unwrap();
        let composite = CompositeDataSet::new(&[&a]);
        let original = a.table("X").unwrap() as *const dyn Table as *const u8;
        let viewed = composite.table("X").unwrap() as *const dyn Table as *const u8;
        assert_eq!(original, viewed);
    }

    #[test]
    fn test_filtered_dataset_follows_sequence() {
        let ds = DefaultDataSet::from_tables(vec![
            make_test_table("A", 0),
            make_test_table("B", 0),
            make_test_table("C", 0),
        ])
        .unwrap();
        let filter = SequenceTableFilter::new(["c", "a"], false);
        let view = FilteredDataSet::new(&ds, &filter);
        assert_eq!(view.table_names(), vec!["C", "A"]);
        assert!(view.table("B").is_err());
    }
}
