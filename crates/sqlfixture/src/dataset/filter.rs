//! Table name filters.

use regex::Regex;

use super::Table;
use crate::core::column::names_equal;
use crate::error::{FixtureError, Result};

/// Decides which tables a filtered view keeps.
pub trait TableFilter {
    /// Whether the named table passes the filter.
    fn accept(&self, name: &str) -> bool;

    /// Select the accepted tables. The default keeps the input order.
    fn select<'a>(&self, tables: Vec<&'a dyn Table>) -> Vec<&'a dyn Table> {
        tables
            .into_iter()
            .filter(|t| self.accept(t.metadata().name()))
            .collect()
    }
}

impl<T: TableFilter + ?Sized> TableFilter for &T {
    fn accept(&self, name: &str) -> bool {
        (**self).accept(name)
    }

    fn select<'a>(&self, tables: Vec<&'a dyn Table>) -> Vec<&'a dyn Table> {
        (**self).select(tables)
    }
}

/// Name pattern with `*` (any run) and `?` (any single character) wildcards.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    pattern: String,
    regex: Regex,
}

impl WildcardPattern {
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self> {
        let mut source = String::with_capacity(pattern.len() + 8);
        if !case_sensitive {
            source.push_str("(?i)");
        }
        source.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(&other.to_string())),
            }
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| {
            FixtureError::Config(format!("Invalid table pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

fn compile(patterns: &[&str], case_sensitive: bool) -> Result<Vec<WildcardPattern>> {
    patterns
        .iter()
        .map(|p| WildcardPattern::new(p, case_sensitive))
        .collect()
}

/// Accepts tables matching at least one pattern.
#[derive(Debug, Clone)]
pub struct IncludeTableFilter {
    patterns: Vec<WildcardPattern>,
}

impl IncludeTableFilter {
    pub fn new(patterns: &[&str], case_sensitive: bool) -> Result<Self> {
        Ok(Self {
            patterns: compile(patterns, case_sensitive)?,
        })
    }
}

impl TableFilter for IncludeTableFilter {
    fn accept(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(name))
    }
}

/// Rejects tables matching any pattern.
#[derive(Debug, Clone)]
pub struct ExcludeTableFilter {
    patterns: Vec<WildcardPattern>,
}

impl ExcludeTableFilter {
    pub fn new(patterns: &[&str], case_sensitive: bool) -> Result<Self> {
        Ok(Self {
            patterns: compile(patterns, case_sensitive)?,
        })
    }
}

impl TableFilter for ExcludeTableFilter {
    fn accept(&self, name: &str) -> bool {
        !self.patterns.iter().any(|p| p.matches(name))
    }
}

/// Limits tables to a name sequence and reorders them to follow it.
#[derive(Debug, Clone)]
pub struct SequenceTableFilter {
    names: Vec<String>,
    case_sensitive: bool,
}

impl SequenceTableFilter {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>, case_sensitive: bool) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            case_sensitive,
        }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl TableFilter for SequenceTableFilter {
    fn accept(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| names_equal(n, name, self.case_sensitive))
    }

    fn select<'a>(&self, tables: Vec<&'a dyn Table>) -> Vec<&'a dyn Table> {
        let mut selected = Vec::with_capacity(self.names.len());
        for (i, name) in self.names.iter().enumerate() {
            // A name repeated in the sequence is only emitted once.
            if self.names[..i]
                .iter()
                .any(|n| names_equal(n, name, self.case_sensitive))
            {
                continue;
            }
            selected.extend(
                tables
                    .iter()
                    .copied()
                    .filter(|t| names_equal(t.metadata().name(), name, self.case_sensitive)),
            );
        }
        selected
    }
}
