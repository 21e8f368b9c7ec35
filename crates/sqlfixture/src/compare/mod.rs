//! Dataset comparison.
//!
//! [`Comparer::compare`] walks the expected dataset and records every
//! difference from the actual one as a [`Discrepancy`]. Discrepancies are
//! data; the returned `Result` only carries fatal errors such as an
//! ambiguous table name.
//!
//! Rows are compared positionally. Callers that need order-independent
//! comparison wrap both tables in a [`SortedTable`](crate::dataset::SortedTable)
//! first, or enable [`Comparer::sort_rows`].

pub mod diff;
pub mod rule;

pub use diff::{Diff, Discrepancy, DiscrepancyKind};
pub use rule::{
    CompareContext, ComparisonRule, ContainsRule, DefaultRule, FnRule, IgnoreRule,
    NotEqualRule, NumericToleranceRule, PercentToleranceRule, RuleSet, TimestampToleranceRule,
    ANY_TABLE,
};

use tracing::{debug, info};

use crate::core::types::ColumnType;
use crate::dataset::{DataSet, SortedTable, Table};
use crate::error::{FixtureError, Result};

/// Column pairing between an expected and an actual table.
struct ColumnPair<'a> {
    name: &'a str,
    expected: usize,
    actual: usize,
    column_type: ColumnType,
}

/// Compares datasets under a [`RuleSet`].
#[derive(Debug, Clone, Default)]
pub struct Comparer {
    rules: RuleSet,
    strict: bool,
    sort_rows: bool,
}

impl Comparer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Also report tables and columns present only in the actual dataset.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sort both sides by the actual table's primary keys before comparing.
    #[must_use]
    pub fn sort_rows(mut self, sort_rows: bool) -> Self {
        self.sort_rows = sort_rows;
        self
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Compare two datasets.
    pub fn compare(&self, expected: &dyn DataSet, actual: &dyn DataSet) -> Result<Diff> {
        let mut diff = Diff::new();

        for expected_table in expected.iter() {
            let name = expected_table.metadata().name();
            match actual.table(name) {
                Ok(actual_table) => self.compare_into(expected_table, actual_table, &mut diff)?,
                Err(FixtureError::NoSuchTable(_)) => {
                    diff.push(Discrepancy::MissingTable {
                        table: name.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if self.strict {
            for actual_table in actual.iter() {
                let name = actual_table.metadata().name();
                if let Err(FixtureError::NoSuchTable(_)) = expected.table(name) {
                    diff.push(Discrepancy::UnexpectedTable {
                        table: name.to_string(),
                    });
                }
            }
        }

        info!(
            "Compared {} expected table(s): {} discrepancies",
            expected.tables().len(),
            diff.len()
        );
        Ok(diff)
    }

    /// Compare two tables regardless of their names.
    pub fn compare_tables(&self, expected: &dyn Table, actual: &dyn Table) -> Result<Diff> {
        let mut diff = Diff::new();
        self.compare_into(expected, actual, &mut diff)?;
        Ok(diff)
    }

    fn compare_into(&self, expected: &dyn Table, actual: &dyn Table, diff: &mut Diff) -> Result<()> {
        if self.sort_rows {
            let sort_columns: Vec<_> = if actual.metadata().has_primary_key() {
                actual
                    .metadata()
                    .primary_key_columns()
                    .into_iter()
                    .cloned()
                    .collect()
            } else {
                actual.metadata().columns().to_vec()
            };
            let sortable = sort_columns
                .iter()
                .all(|c| expected.metadata().position(c.name()).is_some());
            if sortable {
                let expected = SortedTable::with_column_types(expected, &sort_columns)?;
                let actual = SortedTable::with_column_types(actual, &sort_columns)?;
                return self.compare_rows(&expected, &actual, diff);
            }
            debug!(
                "Table {}: sort columns missing from expected table, comparing unsorted",
                expected.metadata().name()
            );
        }
        self.compare_rows(expected, actual, diff)
    }

    fn compare_rows(&self, expected: &dyn Table, actual: &dyn Table, diff: &mut Diff) -> Result<()> {
        let expected_meta = expected.metadata();
        let actual_meta = actual.metadata();
        let table = expected_meta.name();
        let expected_rows = expected.row_count();
        let actual_rows = actual.row_count();

        // Empty tables carry no row data to disagree on, and a dataset file
        // may list no columns for them.
        if expected_rows == 0 && actual_rows == 0 {
            debug!("Table {}: both sides empty", table);
            return Ok(());
        }

        let mut pairs = Vec::with_capacity(expected_meta.column_count());
        for (expected_index, column) in expected_meta.columns().iter().enumerate() {
            let Some(actual_index) = actual_meta.position(column.name()) else {
                diff.push(Discrepancy::MissingColumn {
                    table: table.to_string(),
                    column: column.name().to_string(),
                });
                continue;
            };

            let expected_type = column.data_type();
            let actual_type = actual_meta.columns()[actual_index].data_type();
            if expected_type != ColumnType::Unknown
                && actual_type != ColumnType::Unknown
                && expected_type != actual_type
            {
                diff.push(Discrepancy::ColumnTypeMismatch {
                    table: table.to_string(),
                    column: column.name().to_string(),
                    expected: expected_type,
                    actual: actual_type,
                });
            }

            pairs.push(ColumnPair {
                name: column.name(),
                expected: expected_index,
                actual: actual_index,
                column_type: if expected_type == ColumnType::Unknown {
                    actual_type
                } else {
                    expected_type
                },
            });
        }

        if self.strict {
            for column in actual_meta.columns() {
                if expected_meta.position(column.name()).is_none() {
                    diff.push(Discrepancy::UnexpectedColumn {
                        table: table.to_string(),
                        column: column.name().to_string(),
                    });
                }
            }
        }

        if expected_rows != actual_rows {
            diff.push(Discrepancy::RowCountMismatch {
                table: table.to_string(),
                expected: expected_rows,
                actual: actual_rows,
            });
        }

        let mut mismatches = 0usize;
        for row in 0..expected_rows.min(actual_rows) {
            for pair in &pairs {
                let expected_value = expected.value_at(row, pair.expected)?;
                let actual_value = actual.value_at(row, pair.actual)?;
                if expected_value.is_unset() || actual_value.is_unset() {
                    continue;
                }

                let rule = self.rules.resolve(table, pair.name);
                let ctx = CompareContext {
                    table,
                    row,
                    column: pair.name,
                    column_type: pair.column_type,
                };
                if !rule.matches(&ctx, expected_value, actual_value) {
                    mismatches += 1;
                    diff.push(Discrepancy::ValueMismatch {
                        table: table.to_string(),
                        row,
                        column: pair.name.to_string(),
                        expected: expected_value.clone(),
                        actual: actual_value.clone(),
                    });
                }
            }
        }

        debug!(
            "Table {}: compared {} row(s), {} value mismatch(es)",
            table,
            expected_rows.min(actual_rows),
            mismatches
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::column::Column;
    use crate::core::metadata::TableMetaData;
    use crate::core::value::Value;
    use crate::dataset::{DefaultDataSet, DefaultTable};

    fn make_test_table(name: &str, rows: Vec<Vec<Value>>) -> DefaultTable {
        let meta = TableMetaData::new(
            name,
            vec![
                Column::new("ID", ColumnType::Integer),
                Column::new("NAME", ColumnType::Varchar),
            ],
        )
        .unwrap();
        DefaultTable::with_rows(meta, rows).unwrap()
    }

    fn people() -> Vec<Vec<Value>> {
        vec![
            vec![Value::Int(1), Value::from("ann")],
            vec![Value::Int(2), Value::from("bob")],
            vec![Value::Int(3), Value::from("cy")],
        ]
    }

    #[test]
    fn test_compare_is_reflexive() {
        let ds = DefaultDataSet::from_tables(vec![make_test_table("P", people())]).unwrap();
        let diff = Comparer::new().strict(true).compare(&ds, &ds).unwrap();
        assert!(diff.is_empty(), "{}", diff.summary());
    }

    #[test]
    fn test_one_missing_row() {
        let expected = DefaultDataSet::from_tables(vec![make_test_table("P", people())]).unwrap();
        let mut fewer = people();
        fewer.pop();
        let actual = DefaultDataSet::from_tables(vec![make_test_table("P", fewer)]).unwrap();

        let diff = Comparer::new().compare(&expected, &actual).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.count(DiscrepancyKind::RowCountMismatch), 1);
        assert_eq!(diff.count(DiscrepancyKind::ValueMismatch), 0);
    }

    #[test]
    fn test_missing_and_unexpected_tables() {
        let expected = DefaultDataSet::from_tables(vec![make_test_table("A", vec![])]).unwrap();
        let actual = DefaultDataSet::from_tables(vec![make_test_table("B", vec![])]).unwrap();

        let lenient = Comparer::new().compare(&expected, &actual).unwrap();
        assert_eq!(lenient.count(DiscrepancyKind::MissingTable), 1);
        assert_eq!(lenient.count(DiscrepancyKind::UnexpectedTable), 0);

        let strict = Comparer::new().strict(true).compare(&expected, &actual).unwrap();
        assert_eq!(strict.count(DiscrepancyKind::UnexpectedTable), 1);
    }

    #[test]
    fn test_untyped_expected_uses_actual_type() {
        let meta = TableMetaData::new("P", vec![Column::untyped("ID"), Column::untyped("NAME")])
            .unwrap();
        let expected = DefaultTable::with_rows(
            meta,
            vec![vec![Value::from("01"), Value::Unset]],
        )
        .unwrap();
        let actual = make_test_table("P", vec![vec![Value::Int(1), Value::from("ann")]]);

        let diff = Comparer::new().compare_tables(&expected, &actual).unwrap();
        assert!(diff.is_empty(), "{}", diff.summary());
    }

    #[test]
    fn test_value_mismatch_and_rules() {
        let expected = make_test_table("P", vec![vec![Value::Int(1), Value::from("ann")]]);
        let actual = make_test_table("P", vec![vec![Value::Int(1), Value::from("ANN")]]);

        let diff = Comparer::new().compare_tables(&expected, &actual).unwrap();
        assert_eq!(diff.count(DiscrepancyKind::ValueMismatch), 1);

        let rules = RuleSet::new().with_column_rule("p", "name", IgnoreRule);
        let diff = Comparer::new()
            .with_rules(rules)
            .compare_tables(&expected, &actual)
            .unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_missing_column_and_type_mismatch() {
        let expected_meta = TableMetaData::new(
            "P",
            vec![
                Column::new("ID", ColumnType::BigInt),
                Column::new("EMAIL", ColumnType::Varchar),
            ],
        )
        .unwrap();
        let expected = DefaultTable::with_rows(
            expected_meta,
            vec![vec![Value::Int(1), Value::from("a@b")]],
        )
        .unwrap();
        let actual = make_test_table("P", vec![vec![Value::Int(1), Value::from("ann")]]);

        let diff = Comparer::new().strict(true).compare_tables(&expected, &actual).unwrap();
        assert_eq!(diff.count(DiscrepancyKind::MissingColumn), 1);
        assert_eq!(diff.count(DiscrepancyKind::ColumnTypeMismatch), 1);
        assert_eq!(diff.count(DiscrepancyKind::UnexpectedColumn), 1);
        assert_eq!(diff.count(DiscrepancyKind::ValueMismatch), 0);
    }

    #[test]
    fn test_sort_rows() {
        let expected = make_test_table(
            "P",
            vec![
                vec![Value::Int(2), Value::from("bob")],
                vec![Value::Int(1), Value::from("ann")],
            ],
        );
        let actual = make_test_table(
            "P",
            vec![
                vec![Value::Int(1), Value::from("ann")],
                vec![Value::Int(2), Value::from("bob")],
            ],
        );
        assert!(!Comparer::new().compare_tables(&expected, &actual).unwrap().is_empty());
        assert!(Comparer::new()
            .sort_rows(true)
            .compare_tables(&expected, &actual)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_ambiguous_actual_is_fatal() {
        use crate::dataset::CompositeDataSet;

        let a = DefaultDataSet::from_tables(vec![make_test_table("P", vec![])]).unwrap();
        let b = DefaultDataSet::from_tables(vec![make_test_table("P", vec![])]).unwrap();
        let actual = CompositeDataSet::new(&[&a, &b]);
        let err = Comparer::new().compare(&a, &actual).unwrap_err();
        assert!(matches!(err, FixtureError::AmbiguousTableName(_)));
    }
}
