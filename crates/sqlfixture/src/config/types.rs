//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Root configuration for one fixture.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Connection identity (registry key).
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Database behaviour.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// What runs before the test.
    #[serde(default)]
    pub setup: SetupConfig,

    /// What the database is compared against after the test.
    #[serde(default)]
    pub verify: VerifyConfig,

    /// What runs after the test.
    #[serde(default)]
    pub teardown: TeardownConfig,
}

/// Connection identity. The crate never opens connections itself; these
/// fields key the [`ConnectionRegistry`](crate::connection::ConnectionRegistry)
/// and are handed to the caller's connect function.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Driver-specific connection URL.
    #[serde(default)]
    pub url: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// How datasets map onto the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Vendor to use ("mssql", "postgres", "mysql", "h2", "generic").
    /// Detected from the connection's product name if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_type: Option<String>,

    /// Schema holding the fixture tables. The connection's default if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Match table names case-sensitively (default: false).
    #[serde(default)]
    pub case_sensitive_table_names: bool,

    /// Prefix table names with the schema in generated SQL (default: false).
    #[serde(default)]
    pub qualified_table_names: bool,

    /// Rows per statement batch (default: 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Use statement batches; execute row by row when false (default: true).
    #[serde(default = "default_true")]
    pub batched_statements: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: None,
            schema: None,
            case_sensitive_table_names: false,
            qualified_table_names: false,
            batch_size: default_batch_size(),
            batched_statements: true,
        }
    }
}

/// Setup phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Operation applied with the setup datasets (default: clean_insert).
    #[serde(default = "default_setup_operation")]
    pub operation: Operation,

    /// YAML datasets, combined in order.
    #[serde(default)]
    pub datasets: Vec<PathBuf>,

    /// Statements executed before the operation.
    #[serde(default)]
    pub before_sql: Vec<String>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            operation: default_setup_operation(),
            datasets: Vec::new(),
            before_sql: Vec::new(),
        }
    }
}

/// Verification phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyConfig {
    /// YAML datasets holding the expected contents, combined in order.
    #[serde(default)]
    pub expected: Vec<PathBuf>,

    /// Report tables and columns the expected datasets do not mention.
    #[serde(default)]
    pub strict: bool,

    /// Sort both sides by primary key before comparing.
    #[serde(default)]
    pub sort_rows: bool,

    /// Columns never compared: "TABLE.COLUMN", or "COLUMN" for every table.
    #[serde(default)]
    pub ignore_columns: Vec<String>,

    /// Per-column tolerances.
    #[serde(default)]
    pub tolerances: Vec<ToleranceConfig>,
}

/// Tolerance for one column. Exactly one of the limits must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// Table name; "*" applies to the column in every table (default: "*").
    #[serde(default = "default_any_table")]
    pub table: String,

    /// Column name.
    pub column: String,

    /// Absolute numeric difference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute: Option<f64>,

    /// Difference relative to the expected value, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,

    /// Timestamp difference in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub millis: Option<i64>,
}

/// Teardown phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeardownConfig {
    /// Operation applied with the setup datasets (default: none).
    #[serde(default)]
    pub operation: Operation,

    /// Statements executed after the operation.
    #[serde(default)]
    pub after_sql: Vec<String>,
}

// Default value functions for serde
fn default_batch_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_setup_operation() -> Operation {
    Operation::CleanInsert
}

fn default_any_table() -> String {
    crate::compare::ANY_TABLE.to_string()
}
