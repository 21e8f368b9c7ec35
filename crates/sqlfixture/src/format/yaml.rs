//! Flat YAML dataset format.
//!
//! ```yaml
//! ORDERS:
//!   - id: 1
//!     customer: ann
//!   - id: 2
//! EMPTY_TABLE: []
//! ```
//!
//! Each top-level key is a table, each list item a row. A table's columns are
//! the union of the row keys in first-seen order; a key missing from a row
//! leaves that cell unset, while an explicit `null` is NULL. Columns are
//! untyped.
//!
//! A table may instead be a mapping with a `columns` list and a `rows` list.
//! The listed columns come first, so columns no row provides still exist:
//!
//! ```yaml
//! AUDIT:
//!   columns: [id, changed_by]
//!   rows:
//!     - id: 1
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use rust_decimal::Decimal;
use serde_yaml::{Mapping, Number};
use tracing::{debug, info};

use crate::core::column::{names_equal, Column};
use crate::core::metadata::TableMetaData;
use crate::core::value::Value;
use crate::dataset::{
    DataSet, DataSetBuilder, DataSetConsumer, DataSetProducer, DefaultDataSet, TableProducer,
};
use crate::error::{FixtureError, Result};

#[derive(Debug, Clone)]
struct YamlTable {
    name: String,
    /// Columns listed ahead of the rows.
    columns: Vec<String>,
    rows: Vec<Mapping>,
}

/// Producer reading the flat YAML format.
#[derive(Debug, Clone)]
pub struct YamlDataSet {
    tables: Vec<YamlTable>,
    case_sensitive: bool,
}

impl YamlDataSet {
    /// Parse a YAML document.
    pub fn parse(yaml: &str) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let root = match document {
            serde_yaml::Value::Null => Mapping::new(),
            serde_yaml::Value::Mapping(root) => root,
            _ => {
                return Err(FixtureError::Config(
                    "YAML dataset must be a mapping of table names to row lists".to_string(),
                ))
            }
        };

        let mut tables = Vec::with_capacity(root.len());
        for (key, rows) in root {
            let name = match key {
                serde_yaml::Value::String(name) => name,
                other => {
                    return Err(FixtureError::Config(format!(
                        "YAML dataset table name must be a string, got {:?}",
                        other
                    )))
                }
            };
            let table = match rows {
                serde_yaml::Value::Mapping(mut body) => {
                    let columns = match body.remove("columns") {
                        None | Some(serde_yaml::Value::Null) => Vec::new(),
                        Some(serde_yaml::Value::Sequence(keys)) => keys
                            .iter()
                            .map(|key| column_name(&name, key))
                            .collect::<Result<Vec<_>>>()?,
                        Some(_) => {
                            return Err(FixtureError::Config(format!(
                                "Columns of table {} must be a list",
                                name
                            )))
                        }
                    };
                    let rows = parse_rows(&name, body.remove("rows"))?;
                    if let Some(key) = body.keys().next() {
                        return Err(FixtureError::Config(format!(
                            "Unexpected key {:?} in table {}",
                            key, name
                        )));
                    }
                    YamlTable {
                        name,
                        columns,
                        rows,
                    }
                }
                rows => {
                    let rows = parse_rows(&name, Some(rows))?;
                    YamlTable {
                        name,
                        columns: Vec::new(),
                        rows,
                    }
                }
            };
            tables.push(table);
        }

        Ok(Self {
            tables,
            case_sensitive: false,
        })
    }

    /// Read and parse a YAML dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let dataset = Self::parse(&content)?;
        info!(
            "Loaded YAML dataset {} ({} tables)",
            path.display(),
            dataset.tables.len()
        );
        Ok(dataset)
    }

    /// Match table and column names case-sensitively.
    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Build an in-memory dataset.
    pub fn into_dataset(mut self) -> Result<DefaultDataSet> {
        let mut builder = if self.case_sensitive {
            DataSetBuilder::case_sensitive()
        } else {
            DataSetBuilder::new()
        };
        self.produce(&mut builder)?;
        builder.build()
    }
}

impl DataSetProducer for YamlDataSet {
    fn produce(&mut self, consumer: &mut dyn DataSetConsumer) -> Result<()> {
        consumer.start_dataset()?;
        for YamlTable {
            name,
            columns: declared,
            rows,
        } in &self.tables
        {
            let mut columns: Vec<String> = Vec::new();
            let keys = rows
                .iter()
                .flat_map(|row| row.keys())
                .map(|key| column_name(name, key));
            for key in declared.iter().cloned().map(Ok).chain(keys) {
                let key = key?;
                if !columns
                    .iter()
                    .any(|c| names_equal(c, &key, self.case_sensitive))
                {
                    columns.push(key);
                }
            }

            let metadata = TableMetaData::with_options(
                name.as_str(),
                columns.iter().map(Column::untyped).collect(),
                Vec::<String>::new(),
                self.case_sensitive,
            )?;
            consumer.start_table(&metadata)?;
            if !columns.is_empty() {
                for row in rows {
                    let mut values = vec![Value::Unset; columns.len()];
                    for (key, value) in row {
                        let key = column_name(name, key)?;
                        let index = metadata.column_index(&key)?;
                        values[index] = from_yaml(name, &key, value)?;
                    }
                    consumer.row(&values)?;
                }
            }
            consumer.end_table()?;
            debug!("Produced YAML table {} ({} rows)", name, rows.len());
        }
        consumer.end_dataset()
    }
}

fn parse_rows(table: &str, rows: Option<serde_yaml::Value>) -> Result<Vec<Mapping>> {
    match rows {
        None | Some(serde_yaml::Value::Null) => Ok(Vec::new()),
        Some(serde_yaml::Value::Sequence(items)) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                serde_yaml::Value::Mapping(row) => Ok(row),
                serde_yaml::Value::Null => Ok(Mapping::new()),
                _ => Err(FixtureError::Config(format!(
                    "Row {} of table {} must be a mapping",
                    i, table
                ))),
            })
            .collect(),
        Some(_) => Err(FixtureError::Config(format!(
            "Table {} must be a list of rows",
            table
        ))),
    }
}

fn column_name(table: &str, key: &serde_yaml::Value) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(FixtureError::Config(format!(
            "Column name in table {} must be a scalar, got {:?}",
            table, other
        ))),
    }
}

fn from_yaml(table: &str, column: &str, value: &serde_yaml::Value) -> Result<Value> {
    let converted = match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Decimal(Decimal::from(u))
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_yaml::Value::String(s) => Value::Text(s.clone()),
        serde_yaml::Value::Tagged(tagged) => from_yaml(table, column, &tagged.value)?,
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => {
            return Err(FixtureError::Config(format!(
                "Value of {}.{} must be a scalar",
                table, column
            )))
        }
    };
    Ok(converted)
}

fn to_yaml(value: &Value) -> serde_yaml::Value {
    match value {
        Value::Null | Value::Unset => serde_yaml::Value::Null,
        Value::Bool(b) => serde_yaml::Value::Bool(*b),
        Value::Int(i) => serde_yaml::Value::Number(Number::from(*i)),
        Value::Float(f) => serde_yaml::Value::Number(Number::from(*f)),
        other => serde_yaml::Value::String(other.to_text().unwrap_or_default()),
    }
}

struct PendingTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<serde_yaml::Value>,
    /// Per column, whether any row wrote it.
    written: Vec<bool>,
}

impl PendingTable {
    /// Plain row list when the rows carry every column, otherwise the
    /// `columns`/`rows` form.
    fn into_yaml(self) -> serde_yaml::Value {
        let rows = serde_yaml::Value::Sequence(self.rows);
        if self.written.iter().all(|w| *w) {
            return rows;
        }
        let mut body = Mapping::new();
        body.insert(
            serde_yaml::Value::from("columns"),
            serde_yaml::Value::Sequence(
                self.columns.into_iter().map(serde_yaml::Value::String).collect(),
            ),
        );
        body.insert(serde_yaml::Value::from("rows"), rows);
        serde_yaml::Value::Mapping(body)
    }
}

/// Consumer writing the flat YAML format.
///
/// Unset cells are omitted and NULL is written as `null`. Tables with a
/// column no row provides get an explicit column list. The document is
/// written on `end_dataset`.
pub struct YamlWriter<W: Write> {
    writer: W,
    document: Option<Mapping>,
    table: Option<PendingTable>,
}

impl<W: Write> YamlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            document: None,
            table: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write a whole dataset as YAML.
pub fn write_dataset<W: Write>(dataset: &dyn DataSet, writer: W) -> Result<W> {
    let mut yaml = YamlWriter::new(writer);
    TableProducer::new(dataset).produce(&mut yaml)?;
    Ok(yaml.into_inner())
}

/// Render a whole dataset as a YAML string.
pub fn dataset_to_string(dataset: &dyn DataSet) -> Result<String> {
    let bytes = write_dataset(dataset, Vec::new())?;
    String::from_utf8(bytes)
        .map_err(|e| FixtureError::Config(format!("YAML output is not UTF-8: {}", e)))
}

impl<W: Write> DataSetConsumer for YamlWriter<W> {
    fn start_dataset(&mut self) -> Result<()> {
        if self.document.is_some() {
            return Err(FixtureError::Protocol(
                "start_dataset called inside dataset".to_string(),
            ));
        }
        self.document = Some(Mapping::new());
        Ok(())
    }

    fn start_table(&mut self, metadata: &TableMetaData) -> Result<()> {
        if self.document.is_none() || self.table.is_some() {
            return Err(FixtureError::Protocol(
                "start_table called outside dataset".to_string(),
            ));
        }
        self.table = Some(PendingTable {
            name: metadata.name().to_string(),
            columns: metadata.column_names().into_iter().map(String::from).collect(),
            rows: Vec::new(),
            written: vec![false; metadata.column_count()],
        });
        Ok(())
    }

    fn row(&mut self, values: &[Value]) -> Result<()> {
        let table = self.table.as_mut().ok_or_else(|| {
            FixtureError::Protocol("row called outside table".to_string())
        })?;
        if values.len() != table.columns.len() {
            return Err(FixtureError::Protocol(format!(
                "row for table {} has {} values but the table has {} columns",
                table.name,
                values.len(),
                table.columns.len()
            )));
        }
        let mut row = Mapping::new();
        let cells = table.columns.iter().zip(values).zip(&mut table.written);
        for ((column, value), written) in cells {
            if !value.is_unset() {
                row.insert(serde_yaml::Value::String(column.clone()), to_yaml(value));
                *written = true;
            }
        }
        table.rows.push(serde_yaml::Value::Mapping(row));
        Ok(())
    }

    fn end_table(&mut self) -> Result<()> {
        let table = self.table.take().ok_or_else(|| {
            FixtureError::Protocol("end_table called outside table".to_string())
        })?;
        let document = self.document.as_mut().ok_or_else(|| {
            FixtureError::Protocol("end_table called outside dataset".to_string())
        })?;
        let key = serde_yaml::Value::String(table.name.clone());
        if document.contains_key(&key) {
            return Err(FixtureError::DuplicateTable(table.name));
        }
        document.insert(key, table.into_yaml());
        Ok(())
    }

    fn end_dataset(&mut self) -> Result<()> {
        if self.table.is_some() {
            return Err(FixtureError::Protocol(
                "end_dataset called inside table".to_string(),
            ));
        }
        let document = self.document.take().ok_or_else(|| {
            FixtureError::Protocol("end_dataset called outside dataset".to_string())
        })?;
        serde_yaml::to_writer(&mut self.writer, &document)?;
        self.writer.flush()?;
        debug!("Wrote YAML dataset ({} tables)", document.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Table;

    const SAMPLE: &str = r#"
ORDERS:
  - id: 1
    customer: ann
    total: 12.5
  - id: 2
    note: ~
EMPTY: []
"#;

    #[test]
    fn test_parse_union_of_columns() {
        let ds = YamlDataSet::parse(SAMPLE).unwrap().into_dataset().unwrap();
        assert_eq!(ds.table_names(), vec!["ORDERS", "EMPTY"]);

        let orders = ds.table("orders").unwrap();
        assert_eq!(
            orders.metadata().column_names(),
            vec!["id", "customer", "total", "note"]
        );
        assert_eq!(orders.value(0, "total").unwrap(), &Value::Float(12.5));
        assert_eq!(orders.value(0, "note").unwrap(), &Value::Unset);
        assert_eq!(orders.value(1, "customer").unwrap(), &Value::Unset);
        assert_eq!(orders.value(1, "note").unwrap(), &Value::Null);

        let empty = ds.table("EMPTY").unwrap();
        assert_eq!(empty.row_count(), 0);
        assert_eq!(empty.metadata().column_count(), 0);
    }

    #[test]
    fn test_empty_document() {
        let ds = YamlDataSet::parse("").unwrap().into_dataset().unwrap();
        assert!(ds.is_empty());
    }

    #[test]
    fn test_rejects_non_mapping_rows() {
        assert!(YamlDataSet::parse("T:\n  - 1\n").is_err());
        assert!(YamlDataSet::parse("- a\n").is_err());
    }

    #[test]
    fn test_writer_omits_unset_and_keeps_null() {
        let ds = YamlDataSet::parse(SAMPLE).unwrap().into_dataset().unwrap();
        let text = dataset_to_string(&ds).unwrap();
        let reread = YamlDataSet::parse(&text).unwrap().into_dataset().unwrap();
        assert_eq!(reread, ds);
    }

    #[test]
    fn test_column_list_form() {
        let ds = YamlDataSet::parse(
            "AUDIT:\n  columns: [id, changed_by]\n  rows:\n    - id: 1\n      note: x\n",
        )
        .unwrap()
        .into_dataset()
        .unwrap();
        let audit = ds.table("AUDIT").unwrap();
        assert_eq!(audit.metadata().column_names(), vec!["id", "changed_by", "note"]);
        assert_eq!(audit.value(0, "changed_by").unwrap(), &Value::Unset);

        assert!(YamlDataSet::parse("T:\n  columns: a\n").is_err());
        assert!(YamlDataSet::parse("T:\n  colums: [a]\n").is_err());
    }

    #[test]
    fn test_writer_keeps_columns_no_row_provides() {
        let meta = TableMetaData::new(
            "T",
            vec![Column::untyped("ID"), Column::untyped("LATER")],
        )
        .unwrap();
        let table = crate::dataset::DefaultTable::with_rows(
            meta.clone(),
            vec![vec![Value::Int(1), Value::Unset], vec![Value::Int(2), Value::Unset]],
        )
        .unwrap();
        let empty = crate::dataset::DefaultTable::new(meta.renamed("EMPTY"));
        let ds = DefaultDataSet::from_tables(vec![table, empty]).unwrap();

        let text = dataset_to_string(&ds).unwrap();
        let reread = YamlDataSet::parse(&text).unwrap().into_dataset().unwrap();
        assert_eq!(reread, ds);
        assert_eq!(
            reread.table("EMPTY").unwrap().metadata().column_names(),
            vec!["ID", "LATER"]
        );
    }

    #[test]
    fn test_writer_renders_typed_values_as_text() {
        let meta = TableMetaData::new("T", vec![Column::untyped("B")]).unwrap();
        let table = crate::dataset::DefaultTable::with_rows(
            meta,
            vec![vec![Value::Bytes(vec![1, 2, 3])]],
        )
        .unwrap();
        let ds = DefaultDataSet::from_tables(vec![table]).unwrap();
        let text = dataset_to_string(&ds).unwrap();
        assert!(text.contains("AQID"));
    }
}
