//! Fixture configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::compare::{
    Comparer, IgnoreRule, NumericToleranceRule, PercentToleranceRule, RuleSet,
    TimestampToleranceRule, ANY_TABLE,
};
use crate::dataset::{CompositeDataSet, DataSet, DefaultDataSet};
use crate::error::{FixtureError, Result};
use crate::format::YamlDataSet;

impl FixtureConfig {
    /// Load configuration from a YAML file.
    ///
    /// Relative dataset paths are resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: FixtureConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };
        self.setup.datasets.iter_mut().for_each(resolve);
        self.verify.expected.iter_mut().for_each(resolve);
    }

    /// Comparison rules described by the verify section.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::new();
        for entry in &self.verify.ignore_columns {
            let (table, column) = split_column_ref(entry);
            rules = rules.with_column_rule(table, column, IgnoreRule);
        }
        for tolerance in &self.verify.tolerances {
            let (table, column) = (tolerance.table.as_str(), tolerance.column.as_str());
            rules = if let Some(absolute) = tolerance.absolute {
                let rule = NumericToleranceRule::from_f64(absolute).ok_or_else(|| {
                    FixtureError::Config(format!("Invalid tolerance {} for {}", absolute, column))
                })?;
                rules.with_column_rule(table, column, rule)
            } else if let Some(percent) = tolerance.percent {
                let rule = PercentToleranceRule::from_f64(percent).ok_or_else(|| {
                    FixtureError::Config(format!("Invalid tolerance {}% for {}", percent, column))
                })?;
                rules.with_column_rule(table, column, rule)
            } else if let Some(millis) = tolerance.millis {
                rules.with_column_rule(table, column, TimestampToleranceRule::from_millis(millis))
            } else {
                rules
            };
        }
        Ok(rules)
    }

    /// Comparer configured by the verify section.
    pub fn comparer(&self) -> Result<Comparer> {
        Ok(Comparer::new()
            .with_rules(self.rule_set()?)
            .strict(self.verify.strict)
            .sort_rows(self.verify.sort_rows))
    }

    /// Load and combine the setup datasets.
    pub fn setup_dataset(&self) -> Result<DefaultDataSet> {
        load_datasets(&self.setup.datasets, self.database.case_sensitive_table_names)
    }

    /// Load and combine the expected datasets.
    pub fn expected_dataset(&self) -> Result<DefaultDataSet> {
        load_datasets(&self.verify.expected, self.database.case_sensitive_table_names)
    }
}

/// "TABLE.COLUMN" or bare "COLUMN" (any table).
fn split_column_ref(entry: &str) -> (&str, &str) {
    match entry.rsplit_once('.') {
        Some((table, column)) => (table.trim(), column.trim()),
        None => (ANY_TABLE, entry.trim()),
    }
}

/// Load YAML datasets and combine them in order into one dataset.
pub fn load_datasets(paths: &[PathBuf], case_sensitive: bool) -> Result<DefaultDataSet> {
    let datasets = paths
        .iter()
        .map(|p| YamlDataSet::load(p)?.case_sensitive(case_sensitive).into_dataset())
        .collect::<Result<Vec<_>>>()?;
    let sources: Vec<&dyn DataSet> = datasets.iter().map(|d| d as &dyn DataSet).collect();
    DefaultDataSet::copy_of(&CompositeDataSet::new(&sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::CompareContext;
    use crate::core::types::ColumnType;
    use crate::core::value::Value;
    use crate::operation::Operation;
    use std::io::Write;

    const CONFIG: &str = r#"
database:
  db_type: mssql
  schema: dbo
  batch_size: 50
setup:
  operation: transaction(clean_insert)
  datasets: [people.yml]
  before_sql:
    - DELETE FROM AUDIT_LOG
verify:
  expected: [expected.yml]
  ignore_columns: [PEOPLE.CREATED_AT, VERSION]
  tolerances:
    - table: PEOPLE
      column: SCORE
      absolute: 0.5
teardown:
  operation: delete_all
"#;

    fn ctx(table: &'static str, column: &'static str) -> CompareContext<'static> {
        CompareContext {
            table,
            row: 0,
            column,
            column_type: ColumnType::Double,
        }
    }

    #[test]
    fn test_from_yaml() {
        let config = FixtureConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.database.db_type.as_deref(), Some("mssql"));
        assert_eq!(config.database.batch_size, 50);
        assert!(config.database.batched_statements);
        assert_eq!(
            config.setup.operation,
            Operation::Transaction(Box::new(Operation::CleanInsert))
        );
        assert_eq!(config.teardown.operation, Operation::DeleteAll);
        assert_eq!(config.setup.before_sql.len(), 1);
    }

    #[test]
    fn test_defaults() {
        let config = FixtureConfig::from_yaml("{}").unwrap();
        assert_eq!(config.database.batch_size, 100);
        assert_eq!(config.setup.operation, Operation::CleanInsert);
        assert_eq!(config.teardown.operation, Operation::None);
        assert!(!config.verify.strict);
    }

    #[test]
    fn test_invalid_operation_rejected() {
        let err = FixtureConfig::from_yaml("setup:\n  operation: upsert\n").unwrap_err();
        assert!(matches!(err, FixtureError::Yaml(_)));
    }

    #[test]
    fn test_rule_set_from_verify_section() {
        let config = FixtureConfig::from_yaml(CONFIG).unwrap();
        let rules = config.rule_set().unwrap();

        assert_eq!(rules.resolve("people", "created_at").name(), "ignore");
        assert_eq!(rules.resolve("ORDERS", "VERSION").name(), "ignore");
        assert_eq!(rules.resolve("ORDERS", "CREATED_AT").name(), "default");

        let score = rules.resolve("PEOPLE", "SCORE");
        assert!(score.matches(&ctx("PEOPLE", "SCORE"), &Value::Float(1.0), &Value::Float(1.4)));
        assert!(!score.matches(&ctx("PEOPLE", "SCORE"), &Value::Float(1.0), &Value::Float(1.6)));
    }

    #[test]
    fn test_load_resolves_dataset_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("people.yml"),
            "PEOPLE:\n  - ID: 1\n    NAME: ann\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("expected.yml"), "PEOPLE: []\n").unwrap();
        let config_path = dir.path().join("fixture.yml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let config = FixtureConfig::load(&config_path).unwrap();
        assert_eq!(config.setup.datasets[0], dir.path().join("people.yml"));

        let setup = config.setup_dataset().unwrap();
        assert_eq!(setup.table("people").unwrap().row_count(), 1);
        let expected = config.expected_dataset().unwrap();
        assert_eq!(expected.table("PEOPLE").unwrap().row_count(), 0);
    }

    #[test]
    fn test_load_datasets_rejects_duplicate_tables() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.yml");
        let b = dir.path().join("b.yml");
        std::fs::write(&a, "T:\n  - X: 1\n").unwrap();
        std::fs::write(&b, "t:\n  - X: 2\n").unwrap();
        let err = load_datasets(&[a, b], false).unwrap_err();
        assert!(matches!(err, FixtureError::DuplicateTable(_)));
    }
}
