//! Error types for fixture loading, comparison and database operations.

use thiserror::Error;

use crate::core::types::ColumnType;

/// Boxed error reported by a connection implementation.
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// A value could not be coerced to a column type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cannot cast {value:?} to {target}: {reason}")]
pub struct CastError {
    /// Short reason, e.g. "not numeric" or "out of range".
    pub reason: String,
    /// Rendering of the offending value.
    pub value: String,
    /// Type the cast was aiming for.
    pub target: ColumnType,
}

impl CastError {
    /// Create a cast error for a value rendering and target type.
    pub fn new(reason: impl Into<String>, value: impl Into<String>, target: ColumnType) -> Self {
        Self {
            reason: reason.into(),
            value: value.into(),
            target,
        }
    }
}

/// Main error type for fixture operations.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// Value could not be cast to the column type.
    #[error(transparent)]
    Cast(#[from] CastError),

    /// Column does not exist in the table.
    #[error("No such column '{column}' in table {table}")]
    NoSuchColumn { table: String, column: String },

    /// Two columns share a name within one table.
    #[error("Duplicate column '{column}' in table {table}")]
    DuplicateColumn { table: String, column: String },

    /// Row index past the end of the table.
    #[error("Row {row} out of bounds for table {table} ({row_count} rows)")]
    RowOutOfBounds {
        table: String,
        row: usize,
        row_count: usize,
    },

    /// Table does not exist in the dataset.
    #[error("No such table: {0}")]
    NoSuchTable(String),

    /// Dataset already contains a table with this name.
    #[error("Duplicate table name: {0}")]
    DuplicateTable(String),

    /// Composite dataset holds more than one table with this name.
    #[error("Ambiguous table name '{0}': present more than once in composite dataset")]
    AmbiguousTableName(String),

    /// Table iterator used outside of a positioned state.
    #[error("Table iterator misuse: {0}")]
    IteratorState(&'static str),

    /// Producer/consumer call sequence violated.
    #[error("Dataset protocol violation: {0}")]
    Protocol(String),

    /// Table has no primary key (required by UPDATE and keyed REFRESH).
    #[error("Table {0} has no primary key")]
    NoPrimaryKey(String),

    /// Transaction wrapper entered while the caller already manages one.
    #[error("Connection already has auto-commit disabled; refusing to nest transactions")]
    ExclusiveTransaction,

    /// A statement failed; carries enough context to locate the failure.
    #[error("{operation} failed on table {table}{}: {source}", location(.row, .statement))]
    DatabaseOperation {
        operation: String,
        table: String,
        row: Option<usize>,
        statement: Option<String>,
        #[source]
        source: Box<FixtureError>,
    },

    /// Underlying driver failure.
    #[error("Database error: {0}")]
    Database(#[from] DriverError),

    /// A comparison produced discrepancies and the caller asked for an error.
    #[error("Dataset comparison found {count} discrepancies:\n{summary}")]
    Comparison { count: usize, summary: String },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn location(row: &Option<usize>, statement: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(row) = row {
        out.push_str(&format!(" at row {}", row));
    }
    if let Some(sql) = statement {
        out.push_str(&format!(" [{}]", sql));
    }
    out
}

impl FixtureError {
    /// Create a driver error from a message.
    pub fn database(message: impl Into<String>) -> Self {
        FixtureError::Database(message.into().into())
    }

    /// Create a NoSuchColumn error.
    pub fn no_such_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        FixtureError::NoSuchColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Wrap an error with the operation/table/row/statement it happened in.
    pub fn operation(
        operation: impl Into<String>,
        table: impl Into<String>,
        row: Option<usize>,
        statement: Option<String>,
        source: FixtureError,
    ) -> Self {
        FixtureError::DatabaseOperation {
            operation: operation.into(),
            table: table.into(),
            row,
            statement,
            source: Box::new(source),
        }
    }

    /// Whether this is a row bounds violation.
    pub fn is_row_out_of_bounds(&self) -> bool {
        matches!(self, FixtureError::RowOutOfBounds { .. })
    }

    /// Table name attached to the error, if any.
    pub fn table(&self) -> Option<&str> {
        match self {
            FixtureError::NoSuchColumn { table, .. }
            | FixtureError::DuplicateColumn { table, .. }
            | FixtureError::RowOutOfBounds { table, .. }
            | FixtureError::DatabaseOperation { table, .. } => Some(table),
            FixtureError::NoSuchTable(table)
            | FixtureError::DuplicateTable(table)
            | FixtureError::AmbiguousTableName(table)
            | FixtureError::NoPrimaryKey(table) => Some(table),
            _ => None,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for fixture operations.
pub type Result<T> = std::result::Result<T, FixtureError>;
