//! Per-column comparison rules and their resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

use crate::core::types::ColumnType;
use crate::core::value::Value;

/// Where a comparison happens.
#[derive(Debug, Clone, Copy)]
pub struct CompareContext<'a> {
    pub table: &'a str,
    pub row: usize,
    pub column: &'a str,
    /// Type both values are compared as.
    pub column_type: ColumnType,
}

/// Decides whether an expected and an actual cell match.
///
/// Rules never see unset cells.
pub trait ComparisonRule: Send + Sync {
    fn matches(&self, ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool;

    /// Short name used in logs and reports.
    fn name(&self) -> &str;
}

/// Type-aware equality. A cast failure is a mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRule;

impl ComparisonRule for DefaultRule {
    fn matches(&self, ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        match ctx.column_type.values_equal(expected, actual) {
            Ok(equal) => equal,
            Err(e) => {
                debug!(
                    "{}.{} row {}: treating cast failure as mismatch: {}",
                    ctx.table, ctx.column, ctx.row, e
                );
                false
            }
        }
    }

    fn name(&self) -> &str {
        "default"
    }
}

/// Always matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreRule;

impl ComparisonRule for IgnoreRule {
    fn matches(&self, _ctx: &CompareContext<'_>, _expected: &Value, _actual: &Value) -> bool {
        true
    }

    fn name(&self) -> &str {
        "ignore"
    }
}

/// Both NULL is a match; exactly one NULL is a mismatch; otherwise `None`.
fn null_outcome(expected: &Value, actual: &Value) -> Option<bool> {
    match (expected.is_null(), actual.is_null()) {
        (true, true) => Some(true),
        (true, false) | (false, true) => Some(false),
        (false, false) => None,
    }
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    match ColumnType::Decimal.cast(value).ok()? {
        Value::Decimal(d) => Some(d),
        _ => None,
    }
}

/// `|e - a|`, or `None` when it does not fit in a decimal.
fn distance(e: Decimal, a: Decimal) -> Option<Decimal> {
    e.checked_sub(a).map(|d| d.abs())
}

/// Numeric match within an absolute tolerance.
#[derive(Debug, Clone, Copy)]
pub struct NumericToleranceRule {
    tolerance: Decimal,
}

impl NumericToleranceRule {
    pub fn new(tolerance: Decimal) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn from_f64(tolerance: f64) -> Option<Self> {
        Decimal::from_f64(tolerance).map(Self::new)
    }
}

impl ComparisonRule for NumericToleranceRule {
    fn matches(&self, _ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        if let Some(outcome) = null_outcome(expected, actual) {
            return outcome;
        }
        match (as_decimal(expected), as_decimal(actual)) {
            (Some(e), Some(a)) => distance(e, a).map_or(false, |d| d <= self.tolerance),
            _ => false,
        }
    }

    fn name(&self) -> &str {
        "tolerance"
    }
}

/// Numeric match within a percentage of the expected value.
#[derive(Debug, Clone, Copy)]
pub struct PercentToleranceRule {
    percent: Decimal,
}

impl PercentToleranceRule {
    pub fn new(percent: Decimal) -> Self {
        Self {
            percent: percent.abs(),
        }
    }

    pub fn from_f64(percent: f64) -> Option<Self> {
        Decimal::from_f64(percent).map(Self::new)
    }
}

impl ComparisonRule for PercentToleranceRule {
    fn matches(&self, _ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        if let Some(outcome) = null_outcome(expected, actual) {
            return outcome;
        }
        match (as_decimal(expected), as_decimal(actual)) {
            (Some(e), Some(a)) => {
                // A bound past the decimal range allows any representable distance.
                let allowed = e
                    .abs()
                    .checked_mul(self.percent)
                    .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                    .unwrap_or(Decimal::MAX);
                distance(e, a).map_or(false, |d| d <= allowed)
            }
            _ => false,
        }
    }

    fn name(&self) -> &str {
        "percent_tolerance"
    }
}

/// Temporal match within a duration.
#[derive(Debug, Clone, Copy)]
pub struct TimestampToleranceRule {
    tolerance: Duration,
}

impl TimestampToleranceRule {
    pub fn new(tolerance: Duration) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn from_millis(millis: i64) -> Self {
        Self::new(Duration::milliseconds(millis))
    }

    fn difference(expected: &Value, actual: &Value) -> Option<Duration> {
        if let (Ok(Value::TimestampTz(e)), Ok(Value::TimestampTz(a))) = (
            ColumnType::TimestampTz.cast(expected),
            ColumnType::TimestampTz.cast(actual),
        ) {
            return Some(e.signed_duration_since(a));
        }
        match (ColumnType::Time.cast(expected), ColumnType::Time.cast(actual)) {
            (Ok(Value::Time(e)), Ok(Value::Time(a))) => Some(e.signed_duration_since(a)),
            _ => None,
        }
    }
}

impl ComparisonRule for TimestampToleranceRule {
    fn matches(&self, _ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        if let Some(outcome) = null_outcome(expected, actual) {
            return outcome;
        }
        Self::difference(expected, actual)
            .map(|d| d.abs() <= self.tolerance)
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "timestamp_tolerance"
    }
}

/// Actual text contains the expected text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainsRule;

impl ComparisonRule for ContainsRule {
    fn matches(&self, _ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        if let Some(outcome) = null_outcome(expected, actual) {
            return outcome;
        }
        match (expected.to_text(), actual.to_text()) {
            (Some(e), Some(a)) => a.contains(&e),
            _ => false,
        }
    }

    fn name(&self) -> &str {
        "contains"
    }
}

/// Matches when the values differ under the default rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEqualRule;

impl ComparisonRule for NotEqualRule {
    fn matches(&self, ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        !DefaultRule.matches(ctx, expected, actual)
    }

    fn name(&self) -> &str {
        "not_equal"
    }
}

/// Rule backed by a closure.
pub struct FnRule<F> {
    name: String,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(&CompareContext<'_>, &Value, &Value) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> ComparisonRule for FnRule<F>
where
    F: Fn(&CompareContext<'_>, &Value, &Value) -> bool + Send + Sync,
{
    fn matches(&self, ctx: &CompareContext<'_>, expected: &Value, actual: &Value) -> bool {
        (self.f)(ctx, expected, actual)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Table name that applies a column rule to every table.
pub const ANY_TABLE: &str = "*";

/// Rule lookup: column rule, then table rule, then the global rule.
///
/// Names are matched case-insensitively. A column rule registered under
/// [`ANY_TABLE`] applies to that column in every table, after table-specific
/// column rules.
#[derive(Clone)]
pub struct RuleSet {
    global: Arc<dyn ComparisonRule>,
    tables: HashMap<String, Arc<dyn ComparisonRule>>,
    columns: HashMap<(String, String), Arc<dyn ComparisonRule>>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("global", &self.global.name())
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("columns", &self.columns.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl RuleSet {
    /// Rule set using [`DefaultRule`] everywhere.
    pub fn new() -> Self {
        Self {
            global: Arc::new(DefaultRule),
            tables: HashMap::new(),
            columns: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_global(mut self, rule: impl ComparisonRule + 'static) -> Self {
        self.global = Arc::new(rule);
        self
    }

    #[must_use]
    pub fn with_table_rule(mut self, table: &str, rule: impl ComparisonRule + 'static) -> Self {
        self.set_table_rule(table, Arc::new(rule));
        self
    }

    #[must_use]
    pub fn with_column_rule(
        mut self,
        table: &str,
        column: &str,
        rule: impl ComparisonRule + 'static,
    ) -> Self {
        self.set_column_rule(table, column, Arc::new(rule));
        self
    }

    pub fn set_table_rule(&mut self, table: &str, rule: Arc<dyn ComparisonRule>) {
        self.tables.insert(key(table), rule);
    }

    pub fn set_column_rule(&mut self, table: &str, column: &str, rule: Arc<dyn ComparisonRule>) {
        self.columns.insert((key(table), key(column)), rule);
    }

    /// Rule governing one column of one table.
    pub fn resolve(&self, table: &str, column: &str) -> &dyn ComparisonRule {
        let table = key(table);
        let column = key(column);
        let rule = self
            .columns
            .get(&(table.clone(), column.clone()))
            .or_else(|| self.columns.get(&(ANY_TABLE.to_string(), column)))
            .or_else(|| self.tables.get(&table))
            .unwrap_or(&self.global);
        &**rule
    }
}
