//! # sqlfixture
//!
//! Database fixture toolkit for tests.
//!
//! This library loads tabular datasets, writes them into a database and diffs
//! live tables against expected data:
//!
//! - **Typed values** with safe casts between text, SQL types and statement
//!   parameters
//! - **Datasets** with ordered, filtered, composite and sorted views
//! - **Change operations** (insert, update, delete, refresh, clean insert)
//!   with batching, identity insert and transactional wrapping
//! - **Comparison** of datasets under per-column rules
//! - **Vendors** for SQL Server, PostgreSQL, MySQL, H2 and generic SQL
//!
//! The connection itself is supplied by the caller through the
//! [`Connection`] trait.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlfixture::{Connection, Fixture, FixtureConfig};
//!
//! fn check<C: Connection>(conn: C) -> sqlfixture::Result<()> {
//!     let config = FixtureConfig::load("fixture.yaml")?;
//!     let mut fixture = Fixture::new(config, conn)?;
//!     fixture.setup_from_config()?;
//!     // ... exercise the code under test ...
//!     fixture.verify_from_config()?.into_result()?;
//!     fixture.teardown_from_config()
//! }
//! ```

pub mod compare;
pub mod config;
pub mod connection;
pub mod core;
pub mod dataset;
pub mod error;
pub mod fixture;
pub mod format;
pub mod operation;
pub mod vendor;

// Re-exports for convenient access
pub use compare::{Comparer, Diff, Discrepancy, DiscrepancyKind, RuleSet};
pub use config::{DatabaseConfig, FixtureConfig};
pub use connection::{
    ColumnInfo, Connection, ConnectionRegistry, DatabaseConnection, PreparedStatement, ResultSet,
};
pub use crate::core::{Column, ColumnType, SqlValue, TableMetaData, Value};
pub use dataset::{DataSet, DefaultDataSet, DefaultTable, Table};
pub use error::{CastError, FixtureError, Result};
pub use fixture::Fixture;
pub use format::YamlDataSet;
pub use operation::{Executor, Operation};
pub use vendor::Vendor;
