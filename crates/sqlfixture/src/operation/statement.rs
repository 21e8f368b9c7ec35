//! SQL text for the change operations.
//!
//! Table names arrive already qualified and quoted; column names are quoted
//! here. Parameters are numbered left to right starting at 1.

use crate::error::Result;
use crate::vendor::Dialect;

/// One `WHERE` term: the column, and whether it is matched with `IS NULL`
/// instead of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Condition<'a> {
    pub column: &'a str,
    pub is_null: bool,
}

impl<'a> Condition<'a> {
    pub fn equals(column: &'a str) -> Self {
        Self {
            column,
            is_null: false,
        }
    }

    pub fn null(column: &'a str) -> Self {
        Self {
            column,
            is_null: true,
        }
    }
}

fn quote_columns(dialect: &dyn Dialect, columns: &[&str]) -> Result<Vec<String>> {
    columns.iter().map(|c| dialect.quote_ident(c)).collect()
}

/// Render `WHERE` terms, consuming placeholders from `next_param`.
fn where_clause(
    dialect: &dyn Dialect,
    conditions: &[Condition<'_>],
    next_param: &mut usize,
) -> Result<String> {
    let mut terms = Vec::with_capacity(conditions.len());
    for condition in conditions {
        let column = dialect.quote_ident(condition.column)?;
        if condition.is_null {
            terms.push(format!("{} IS NULL", column));
        } else {
            terms.push(format!("{} = {}", column, dialect.param_placeholder(*next_param)));
            *next_param += 1;
        }
    }
    Ok(terms.join(" AND "))
}

pub(crate) fn insert(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    override_identity: bool,
) -> Result<String> {
    let names = quote_columns(dialect, columns)?;
    let params: Vec<String> = (1..=columns.len())
        .map(|i| dialect.param_placeholder(i))
        .collect();
    let overriding = match dialect.identity_override_clause() {
        Some(clause) if override_identity => format!("{} ", clause),
        _ => String::new(),
    };
    Ok(format!(
        "INSERT INTO {} ({}) {}VALUES ({})",
        table,
        names.join(", "),
        overriding,
        params.join(", ")
    ))
}

pub(crate) fn update(
    dialect: &dyn Dialect,
    table: &str,
    set_columns: &[&str],
    key_columns: &[&str],
) -> Result<String> {
    let mut next_param = 1;
    let mut assignments = Vec::with_capacity(set_columns.len());
    for column in set_columns {
        assignments.push(format!(
            "{} = {}",
            dialect.quote_ident(column)?,
            dialect.param_placeholder(next_param)
        ));
        next_param += 1;
    }
    let keys: Vec<Condition<'_>> = key_columns.iter().map(|c| Condition::equals(c)).collect();
    Ok(format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments.join(", "),
        where_clause(dialect, &keys, &mut next_param)?
    ))
}

pub(crate) fn delete_matching(
    dialect: &dyn Dialect,
    table: &str,
    conditions: &[Condition<'_>],
) -> Result<String> {
    let mut next_param = 1;
    Ok(format!(
        "DELETE FROM {} WHERE {}",
        table,
        where_clause(dialect, conditions, &mut next_param)?
    ))
}

pub(crate) fn delete_all(table: &str) -> String {
    format!("DELETE FROM {}", table)
}

pub(crate) fn count_matching(
    dialect: &dyn Dialect,
    table: &str,
    conditions: &[Condition<'_>],
) -> Result<String> {
    let mut next_param = 1;
    Ok(format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        table,
        where_clause(dialect, conditions, &mut next_param)?
    ))
}

pub(crate) fn count_all(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", table)
}

pub(crate) fn select_ordered(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    order_by: &[&str],
) -> Result<String> {
    let mut sql = format!(
        "SELECT {} FROM {}",
        quote_columns(dialect, columns)?.join(", "),
        table
    );
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&quote_columns(dialect, order_by)?.join(", "));
    }
    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::{GenericVendor, MssqlVendor, PostgresVendor};

    #[test]
    fn test_insert() {
        let sql = insert(&MssqlVendor, "[dbo].[T]", &["ID", "NAME"], false).unwrap();
        assert_eq!(sql, "INSERT INTO [dbo].[T] ([ID], [NAME]) VALUES (@P1, @P2)");
    }

    #[test]
    fn test_insert_overriding_identity() {
        let sql = insert(&PostgresVendor, "\"t\"", &["id"], true).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"id\") OVERRIDING SYSTEM VALUE VALUES ($1)"
        );
        let sql = insert(&PostgresVendor, "\"t\"", &["id"], false).unwrap();
        assert!(!sql.contains("OVERRIDING"));
    }

    #[test]
    fn test_update_numbers_keys_after_assignments() {
        let sql = update(&PostgresVendor, "\"t\"", &["a", "b"], &["id"]).unwrap();
        assert_eq!(sql, "UPDATE \"t\" SET \"a\" = $1, \"b\" = $2 WHERE \"id\" = $3");
    }

    #[test]
    fn test_delete_with_null_condition() {
        let conditions = [
            Condition::equals("A"),
            Condition::null("B"),
            Condition::equals("C"),
        ];
        let sql = delete_matching(&PostgresVendor, "\"T\"", &conditions).unwrap();
        assert_eq!(
            sql,
            "DELETE FROM \"T\" WHERE \"A\" = $1 AND \"B\" IS NULL AND \"C\" = $2"
        );
    }

    #[test]
    fn test_select_ordered() {
        let sql = select_ordered(&GenericVendor, "\"T\"", &["A", "B"], &["A"]).unwrap();
        assert_eq!(sql, "SELECT \"A\", \"B\" FROM \"T\" ORDER BY \"A\"");
        assert_eq!(delete_all("\"T\""), "DELETE FROM \"T\"");
        assert_eq!(count_all("\"T\""), "SELECT COUNT(*) FROM \"T\"");
    }
}
