//! Tables and datasets.
//!
//! A [`DataSet`] is an ordered collection of named [`Table`]s. Datasets are
//! read-only once built: [`DefaultDataSet`] owns its tables, while
//! [`CompositeDataSet`] and [`FilteredDataSet`] are views borrowing the
//! tables of other datasets without copying rows.
//!
//! Datasets are produced and consumed through the streaming
//! [`DataSetProducer`] / [`DataSetConsumer`] protocol in [`producer`].

pub mod composite;
pub mod default;
pub mod filter;
pub mod iterator;
pub mod producer;
pub mod table;

pub use composite::{CompositeDataSet, FilteredDataSet};
pub use default::DefaultDataSet;
pub use filter::{
    ExcludeTableFilter, IncludeTableFilter, SequenceTableFilter, TableFilter, WildcardPattern,
};
pub use iterator::{FilteredIterator, TableCursor, TableIterator};
pub use producer::{DataSetBuilder, DataSetConsumer, DataSetProducer, TableProducer};
pub use table::{ColumnFilterTable, DefaultTable, SortedTable, Table};

use crate::core::column::names_equal;
use crate::core::metadata::TableMetaData;
use crate::error::{FixtureError, Result};

/// Ordered collection of named tables.
pub trait DataSet {
    /// Tables in dataset order.
    fn tables(&self) -> Vec<&dyn Table>;

    /// Whether table names are matched case-sensitively.
    fn is_case_sensitive(&self) -> bool;

    fn table_names(&self) -> Vec<&str> {
        self.tables()
            .into_iter()
            .map(|t| t.metadata().name())
            .collect()
    }

    /// Look up a table by name.
    ///
    /// Fails with `NoSuchTable` when absent and `AmbiguousTableName` when
    /// more than one table carries the name.
    fn table(&self, name: &str) -> Result<&dyn Table> {
        let case_sensitive = self.is_case_sensitive();
        let mut matches = self
            .tables()
            .into_iter()
            .filter(|t| names_equal(t.metadata().name(), name, case_sensitive));
        match (matches.next(), matches.next()) {
            (Some(table), None) => Ok(table),
            (Some(_), Some(_)) => Err(FixtureError::AmbiguousTableName(name.to_string())),
            (None, _) => Err(FixtureError::NoSuchTable(name.to_string())),
        }
    }

    fn table_metadata(&self, name: &str) -> Result<&TableMetaData> {
        self.table(name).map(|t| t.metadata())
    }

    /// Cursor over the tables in dataset order.
    fn iter(&self) -> TableIterator<'_> {
        TableIterator::new(self.tables())
    }

    /// Cursor over the tables in reverse dataset order.
    fn reverse_iter(&self) -> TableIterator<'_> {
        TableIterator::reversed(self.tables())
    }
}
