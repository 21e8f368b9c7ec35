//! Column descriptors.

use serde::{Deserialize, Serialize};

use super::types::ColumnType;

/// Whether a column accepts NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nullable {
    Nullable,
    NoNulls,
    Unknown,
}

/// Immutable column descriptor.
///
/// Use the `with_*` methods to derive a modified copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data_type: ColumnType,
    nullable: Nullable,
    identity: bool,
}

impl Column {
    /// Create a column with unknown nullability.
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: Nullable::Unknown,
            identity: false,
        }
    }

    /// Create an untyped column, as produced by flat dataset formats.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Unknown)
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: Nullable) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: bool) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn with_type(mut self, data_type: ColumnType) -> Self {
        self.data_type = data_type;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data_type(&self) -> ColumnType {
        self.data_type
    }

    #[must_use]
    pub fn nullable(&self) -> Nullable {
        self.nullable
    }

    /// Whether the database generates this column's values.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// Name comparison under the given case policy.
    pub fn name_matches(&self, name: &str, case_sensitive: bool) -> bool {
        names_equal(&self.name, name, case_sensitive)
    }
}

/// Compare two identifiers under a case policy.
pub fn names_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}
