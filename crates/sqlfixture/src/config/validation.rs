//! Configuration validation.

use super::FixtureConfig;
use crate::core::identifier::validate_identifier;
use crate::error::{FixtureError, Result};
use crate::vendor::Vendor;

/// Validate the configuration.
pub fn validate(config: &FixtureConfig) -> Result<()> {
    // Database validation
    if let Some(db_type) = &config.database.db_type {
        Vendor::from_db_type(db_type)?;
    }
    if let Some(schema) = &config.database.schema {
        validate_identifier(schema)
            .map_err(|e| FixtureError::Config(format!("database.schema: {}", e)))?;
    }
    if config.database.batch_size == 0 {
        return Err(FixtureError::Config(
            "database.batch_size must be at least 1".into(),
        ));
    }
    if config.database.qualified_table_names && config.database.schema.is_none() {
        return Err(FixtureError::Config(
            "database.qualified_table_names requires database.schema".into(),
        ));
    }

    // Verify validation
    for entry in &config.verify.ignore_columns {
        if entry.trim().is_empty() || entry.split('.').any(|part| part.trim().is_empty()) {
            return Err(FixtureError::Config(format!(
                "verify.ignore_columns: invalid entry '{}'",
                entry
            )));
        }
    }
    for tolerance in &config.verify.tolerances {
        if tolerance.column.trim().is_empty() {
            return Err(FixtureError::Config(
                "verify.tolerances: column is required".into(),
            ));
        }
        let limits = [
            tolerance.absolute.is_some(),
            tolerance.percent.is_some(),
            tolerance.millis.is_some(),
        ];
        if limits.iter().filter(|set| **set).count() != 1 {
            return Err(FixtureError::Config(format!(
                "verify.tolerances: {}.{} must set exactly one of absolute, percent, millis",
                tolerance.table, tolerance.column
            )));
        }
        let negative = tolerance.absolute.is_some_and(|v| !(v >= 0.0))
            || tolerance.percent.is_some_and(|v| !(v >= 0.0))
            || tolerance.millis.is_some_and(|v| v < 0);
        if negative {
            return Err(FixtureError::Config(format!(
                "verify.tolerances: {}.{} must not be negative",
                tolerance.table, tolerance.column
            )));
        }
    }

    Ok(())
}
