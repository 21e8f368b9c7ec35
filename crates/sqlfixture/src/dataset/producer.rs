//! Streaming producer/consumer protocol for datasets.
//!
//! A producer drives a consumer through
//! `start_dataset (start_table row* end_table)* end_dataset`.
//! A table with zero columns goes straight from `start_table` to
//! `end_table`.

use std::mem;

use tracing::debug;

use super::{DataSet, DefaultDataSet, DefaultTable, Table};
use crate::core::metadata::TableMetaData;
use crate::core::value::Value;
use crate::error::{FixtureError, Result};

/// Receives a dataset as a stream of events.
pub trait DataSetConsumer {
    fn start_dataset(&mut self) -> Result<()>;

    fn start_table(&mut self, metadata: &TableMetaData) -> Result<()>;

    /// One row, aligned with the current table's columns.
    fn row(&mut self, values: &[Value]) -> Result<()>;

    fn end_table(&mut self) -> Result<()>;

    fn end_dataset(&mut self) -> Result<()>;
}

/// Emits a dataset into a consumer.
pub trait DataSetProducer {
    fn produce(&mut self, consumer: &mut dyn DataSetConsumer) -> Result<()>;
}

#[derive(Debug)]
enum BuilderState {
    Idle,
    InDataSet,
    InTable(DefaultTable),
    Finished,
}

impl BuilderState {
    fn name(&self) -> &'static str {
        match self {
            BuilderState::Idle => "before start_dataset",
            BuilderState::InDataSet => "inside dataset",
            BuilderState::InTable(_) => "inside table",
            BuilderState::Finished => "after end_dataset",
        }
    }
}

/// Consumer assembling a [`DefaultDataSet`].
///
/// Calls out of protocol order fail with `Protocol`.
#[derive(Debug)]
pub struct DataSetBuilder {
    state: BuilderState,
    dataset: DefaultDataSet,
}

impl Default for DataSetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSetBuilder {
    pub fn new() -> Self {
        Self::with_dataset(DefaultDataSet::new())
    }

    /// Build into a dataset with case-sensitive table names.
    pub fn case_sensitive() -> Self {
        Self::with_dataset(DefaultDataSet::case_sensitive())
    }

    fn with_dataset(dataset: DefaultDataSet) -> Self {
        Self {
            state: BuilderState::Idle,
            dataset,
        }
    }

    /// Run a producer to completion and return what it built.
    pub fn build_from(producer: &mut dyn DataSetProducer) -> Result<DefaultDataSet> {
        let mut builder = Self::new();
        producer.produce(&mut builder)?;
        builder.build()
    }

    /// Take the finished dataset. Fails unless `end_dataset` was called.
    pub fn build(self) -> Result<DefaultDataSet> {
        match self.state {
            BuilderState::Finished => Ok(self.dataset),
            other => Err(FixtureError::Protocol(format!(
                "build() called {}",
                other.name()
            ))),
        }
    }

    fn violation(&self, call: &str) -> FixtureError {
        FixtureError::Protocol(format!("{} called {}", call, self.state.name()))
    }
}

impl DataSetConsumer for DataSetBuilder {
    fn start_dataset(&mut self) -> Result<()> {
        match self.state {
            BuilderState::Idle => {
                self.state = BuilderState::InDataSet;
                Ok(())
            }
            _ => Err(self.violation("start_dataset")),
        }
    }

    fn start_table(&mut self, metadata: &TableMetaData) -> Result<()> {
        match self.state {
            BuilderState::InDataSet => {
                self.state = BuilderState::InTable(DefaultTable::new(metadata.clone()));
                Ok(())
            }
            _ => Err(self.violation("start_table")),
        }
    }

    fn row(&mut self, values: &[Value]) -> Result<()> {
        match &mut self.state {
            BuilderState::InTable(table) => table.add_row(values.to_vec()),
            _ => Err(self.violation("row")),
        }
    }

    fn end_table(&mut self) -> Result<()> {
        match mem::replace(&mut self.state, BuilderState::InDataSet) {
            BuilderState::InTable(table) => {
                debug!(
                    "Built table {} ({} rows)",
                    table.metadata().name(),
                    table.row_count()
                );
                self.dataset.add_table(table)
            }
            other => {
                self.state = other;
                Err(self.violation("end_table"))
            }
        }
    }

    fn end_dataset(&mut self) -> Result<()> {
        match self.state {
            BuilderState::InDataSet => {
                self.state = BuilderState::Finished;
                Ok(())
            }
            _ => Err(self.violation("end_dataset")),
        }
    }
}

/// Producer replaying any dataset in table order.
pub struct TableProducer<'a> {
    dataset: &'a dyn DataSet,
}

impl<'a> TableProducer<'a> {
    pub fn new(dataset: &'a dyn DataSet) -> Self {
        Self { dataset }
    }
}

impl DataSetProducer for TableProducer<'_> {
    fn produce(&mut self, consumer: &mut dyn DataSetConsumer) -> Result<()> {
        consumer.start_dataset()?;
        for table in self.dataset.iter() {
            let metadata = table.metadata();
            consumer.start_table(metadata)?;
            if metadata.column_count() > 0 {
                let mut row = 0;
                while table.has_row(row) {
                    consumer.row(&table.row_values(row)?)?;
                    row += 1;
                }
            }
            consumer.end_table()?;
        }
        consumer.end_dataset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::column::Column;

    fn make_test_dataset() -> DefaultDataSet {
        let people = DefaultTable::with_rows(
            TableMetaData::new("PEOPLE", vec![Column::untyped("ID"), Column::untyped("NAME")])
                .unwrap(),
            vec![
                vec![Value::Int(1), Value::from("ann")],
                vec![Value::Int(2), Value::Null],
            ],
        )
        .unwrap();
        let empty = DefaultTable::new(TableMetaData::new("EMPTY", vec![]).unwrap());
        DefaultDataSet::from_tables(vec![people, empty]).unwrap()
    }

    #[test]
    fn test_replay_through_builder() {
        let original = make_test_dataset();
        let rebuilt = DataSetBuilder::build_from(&mut TableProducer::new(&original)).unwrap();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_row_before_start_table_fails() {
        let mut builder = DataSetBuilder::new();
        builder.start_dataset().unwrap();
        let err = builder.row(&[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, FixtureError::Protocol(_)));
    }

    #[test]
    fn test_misaligned_row_fails() {
        let mut builder = DataSetBuilder::new();
        builder.start_dataset().unwrap();
        builder
            .start_table(&TableMetaData::new("T", vec![Column::untyped("A")]).unwrap())
            .unwrap();
        assert!(builder.row(&[Value::Int(1), Value::Int(2)]).is_err());
    }

    #[test]
    fn test_build_requires_end_dataset() {
        let mut builder = DataSetBuilder::new();
        builder.start_dataset().unwrap();
        assert!(matches!(builder.build(), Err(FixtureError::Protocol(_))));
    }

    #[test]
    fn test_end_table_outside_table_keeps_state() {
        let mut builder = DataSetBuilder::new();
        builder.start_dataset().unwrap();
        assert!(builder.end_table().is_err());
        builder.end_dataset().unwrap();
        assert!(builder.build().unwrap().is_empty());
    }

    #[test]
    fn test_nested_start_dataset_fails() {
        let mut builder = DataSetBuilder::new();
        builder.start_dataset().unwrap();
        assert!(builder.start_dataset().is_err());
    }
}
