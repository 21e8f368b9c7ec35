//! Comparison results.

use std::fmt;

use serde::Serialize;

use crate::core::types::ColumnType;
use crate::core::value::Value;
use crate::error::{FixtureError, Result};

/// Kind of a [`Discrepancy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingTable,
    UnexpectedTable,
    MissingColumn,
    UnexpectedColumn,
    ColumnTypeMismatch,
    RowCountMismatch,
    ValueMismatch,
}

/// One difference between an expected and an actual dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discrepancy {
    MissingTable {
        table: String,
    },
    UnexpectedTable {
        table: String,
    },
    MissingColumn {
        table: String,
        column: String,
    },
    UnexpectedColumn {
        table: String,
        column: String,
    },
    ColumnTypeMismatch {
        table: String,
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },
    RowCountMismatch {
        table: String,
        expected: usize,
        actual: usize,
    },
    ValueMismatch {
        table: String,
        row: usize,
        column: String,
        expected: Value,
        actual: Value,
    },
}

impl Discrepancy {
    pub fn kind(&self) -> DiscrepancyKind {
        match self {
            Discrepancy::MissingTable { .. } => DiscrepancyKind::MissingTable,
            Discrepancy::UnexpectedTable { .. } => DiscrepancyKind::UnexpectedTable,
            Discrepancy::MissingColumn { .. } => DiscrepancyKind::MissingColumn,
            Discrepancy::UnexpectedColumn { .. } => DiscrepancyKind::UnexpectedColumn,
            Discrepancy::ColumnTypeMismatch { .. } => DiscrepancyKind::ColumnTypeMismatch,
            Discrepancy::RowCountMismatch { .. } => DiscrepancyKind::RowCountMismatch,
            Discrepancy::ValueMismatch { .. } => DiscrepancyKind::ValueMismatch,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Discrepancy::MissingTable { table }
            | Discrepancy::UnexpectedTable { table }
            | Discrepancy::MissingColumn { table, .. }
            | Discrepancy::UnexpectedColumn { table, .. }
            | Discrepancy::ColumnTypeMismatch { table, .. }
            | Discrepancy::RowCountMismatch { table, .. }
            | Discrepancy::ValueMismatch { table, .. } => table,
        }
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discrepancy::MissingTable { table } => write!(f, "{}: table missing", table),
            Discrepancy::UnexpectedTable { table } => write!(f, "{}: unexpected table", table),
            Discrepancy::MissingColumn { table, column } => {
                write!(f, "{}.{}: column missing", table, column)
            }
            Discrepancy::UnexpectedColumn { table, column } => {
                write!(f, "{}.{}: unexpected column", table, column)
            }
            Discrepancy::ColumnTypeMismatch {
                table,
                column,
                expected,
                actual,
            } => write!(
                f,
                "{}.{}: type mismatch, expected {} but was {}",
                table, column, expected, actual
            ),
            Discrepancy::RowCountMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "{}: row count mismatch, expected {} but was {}",
                table, expected, actual
            ),
            Discrepancy::ValueMismatch {
                table,
                row,
                column,
                expected,
                actual,
            } => write!(
                f,
                "{}[{}].{}: expected {} but was {}",
                table, row, column, expected, actual
            ),
        }
    }
}

/// Ordered list of discrepancies found by one comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diff {
    discrepancies: Vec<Discrepancy>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, discrepancy: Discrepancy) {
        self.discrepancies.push(discrepancy);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.discrepancies.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.discrepancies.len()
    }

    #[must_use]
    pub fn discrepancies(&self) -> &[Discrepancy] {
        &self.discrepancies
    }

    /// Number of discrepancies of one kind.
    pub fn count(&self, kind: DiscrepancyKind) -> usize {
        self.discrepancies
            .iter()
            .filter(|d| d.kind() == kind)
            .count()
    }

    /// Discrepancies recorded for one table.
    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Discrepancy> + 'a {
        self.discrepancies
            .iter()
            .filter(move |d| d.table().eq_ignore_ascii_case(table))
    }

    /// Append another comparison's discrepancies.
    pub fn merge(&mut self, other: Diff) {
        self.discrepancies.extend(other.discrepancies);
    }

    /// One line per discrepancy.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no discrepancies".to_string();
        }
        self.discrepancies
            .iter()
            .map(|d| format!("  {}", d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Pretty-printed JSON report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `Ok(())` when empty, otherwise `FixtureError::Comparison`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(FixtureError::Comparison {
                count: self.len(),
                summary: self.summary(),
            })
        }
    }
}

impl IntoIterator for Diff {
    type Item = Discrepancy;
    type IntoIter = std::vec::IntoIter<Discrepancy>;

    fn into_iter(self) -> Self::IntoIter {
        self.discrepancies.into_iter()
    }
}
