//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as statement parameters, so they
//! are validated and quoted before being spliced into SQL text.

use crate::error::{FixtureError, Result};

/// Maximum identifier length (SQL Server's limit; the widest of the built-in vendors).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// How a dialect delimits identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteStyle {
    /// `"name"` (ANSI, PostgreSQL, H2).
    DoubleQuote,
    /// `[name]` (SQL Server).
    Bracket,
    /// `` `name` `` (MySQL).
    Backtick,
    /// Emitted as-is after validation.
    None,
}

/// Reject empty names, null bytes and over-long names.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FixtureError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(FixtureError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(FixtureError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Validate and quote one identifier.
pub fn quote(name: &str, style: QuoteStyle) -> Result<String> {
    validate_identifier(name)?;
    let quoted = match style {
        QuoteStyle::DoubleQuote => format!("\"{}\"", name.replace('"', "\"\"")),
        QuoteStyle::Bracket => format!("[{}]", name.replace(']', "]]")),
        QuoteStyle::Backtick => format!("`{}`", name.replace('`', "``")),
        QuoteStyle::None => name.to_string(),
    };
    Ok(quoted)
}

/// Quote a possibly schema-qualified name.
///
/// When `schema` is `None` and `name` contains a dot, the part before the
/// first dot is taken as the schema.
pub fn qualify(schema: Option<&str>, name: &str, style: QuoteStyle) -> Result<String> {
    let (schema, table) = match schema {
        Some(schema) => (Some(schema), name),
        None => match name.split_once('.') {
            Some((schema, table)) => (Some(schema), table),
            None => (None, name),
        },
    };
    match schema {
        Some(schema) => Ok(format!("{}.{}", quote(schema, style)?, quote(table, style)?)),
        None => quote(table, style),
    }
}
