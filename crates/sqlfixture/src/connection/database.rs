//! A connection bound to its configuration and vendor.

use std::collections::HashMap;

use tracing::{debug, info};

use super::{Connection, ResultSet};
use crate::config::DatabaseConfig;
use crate::core::column::Column;
use crate::core::metadata::TableMetaData;
use crate::core::resolver::TypeResolver;
use crate::dataset::{DefaultDataSet, DefaultTable, Table};
use crate::error::{FixtureError, Result};
use crate::operation::statement;
use crate::vendor::{Dialect, IdentityDetector, MetadataHandler, Vendor};

/// Connection plus the configuration and vendor every operation needs.
///
/// Table metadata read from the catalog is cached per table name until
/// [`clear_metadata_cache`](Self::clear_metadata_cache).
pub struct DatabaseConnection<C: Connection> {
    conn: C,
    config: DatabaseConfig,
    vendor: Vendor,
    metadata_cache: HashMap<String, TableMetaData>,
}

impl<C: Connection> DatabaseConnection<C> {
    /// Wrap a connection, selecting the vendor from `config.db_type` or the
    /// connection's product name.
    pub fn new(conn: C, config: DatabaseConfig) -> Result<Self> {
        let vendor = match &config.db_type {
            Some(db_type) => Vendor::from_db_type(db_type)?,
            None => Vendor::from_product_name(conn.product_name()),
        };
        info!(
            "Using {} vendor for {} {}",
            vendor.name(),
            conn.product_name(),
            conn.product_version()
        );
        Ok(Self::with_vendor(conn, config, vendor))
    }

    pub fn with_vendor(conn: C, config: DatabaseConfig, vendor: Vendor) -> Self {
        Self {
            conn,
            config,
            vendor,
            metadata_cache: HashMap::new(),
        }
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    fn case_sensitive(&self) -> bool {
        self.config.case_sensitive_table_names
    }

    fn cache_key(&self, table: &str) -> String {
        if self.case_sensitive() {
            table.to_string()
        } else {
            table.to_lowercase()
        }
    }

    /// Schema and bare name for a possibly dotted table name.
    fn split_name<'n>(&'n self, table: &'n str) -> (Option<&'n str>, &'n str) {
        match table.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (self.config.schema.as_deref(), table),
        }
    }

    /// Quoted table name for generated SQL, schema-qualified when configured
    /// or when the name itself carries a schema.
    pub fn qualified_name(&self, table: &str) -> Result<String> {
        let (schema, name) = self.split_name(table);
        if table.contains('.') || self.config.qualified_table_names {
            self.vendor.qualify(schema, name)
        } else {
            self.vendor.quote_ident(name)
        }
    }

    /// The catalog's spelling of a table name.
    ///
    /// # Errors
    ///
    /// `NoSuchTable` if the catalog has no matching table.
    pub fn catalog_table_name(&mut self, table: &str) -> Result<String> {
        let case_sensitive = self.case_sensitive();
        let (schema, name) = match table.split_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
            None => (self.config.schema.clone(), table.to_string()),
        };
        let names = self.conn.table_names(schema.as_deref())?;
        names
            .into_iter()
            .find(|candidate| self.vendor.matches(candidate, &name, case_sensitive))
            .ok_or_else(|| FixtureError::NoSuchTable(table.to_string()))
    }

    /// Columns, primary keys and identity flags of a database table.
    pub fn table_metadata(&mut self, table: &str) -> Result<TableMetaData> {
        let key = self.cache_key(table);
        if let Some(metadata) = self.metadata_cache.get(&key) {
            return Ok(metadata.clone());
        }

        let catalog_name = self.catalog_table_name(table)?;
        let schema = match table.split_once('.') {
            Some((schema, _)) => Some(schema.to_string()),
            None => self.config.schema.clone(),
        };
        let infos = self.conn.columns(schema.as_deref(), &catalog_name)?;
        let primary_keys = self.conn.primary_keys(schema.as_deref(), &catalog_name)?;

        let columns = infos
            .iter()
            .map(|info| {
                Column::new(
                    info.name.clone(),
                    self.vendor.resolve(&info.type_name, info.type_code),
                )
                .with_nullable(info.nullable)
                .with_identity(self.vendor.is_identity(info))
            })
            .collect();
        let metadata = TableMetaData::with_options(
            catalog_name,
            columns,
            primary_keys,
            self.case_sensitive(),
        )?;
        debug!(
            "Read metadata for {}: {} columns, primary key {:?}",
            metadata.name(),
            metadata.column_count(),
            metadata.primary_keys()
        );

        self.metadata_cache.insert(key, metadata.clone());
        Ok(metadata)
    }

    pub fn clear_metadata_cache(&mut self) {
        self.metadata_cache.clear();
    }

    /// Number of rows currently in a table.
    pub fn row_count(&mut self, table: &str) -> Result<u64> {
        let sql = statement::count_all(&self.qualified_name(table)?);
        self.conn.query(&sql)?.count()
    }

    /// Snapshot one table, ordered by primary key (all columns when it has none).
    ///
    /// The snapshot carries the requested name so it lines up with the
    /// dataset it is compared against.
    pub fn create_table(&mut self, table: &str) -> Result<DefaultTable> {
        let metadata = self.table_metadata(table)?;
        let columns = metadata.column_names();
        let order_by: Vec<&str> = if metadata.has_primary_key() {
            metadata.primary_keys().iter().map(String::as_str).collect()
        } else {
            columns.clone()
        };
        let sql = statement::select_ordered(
            &self.vendor,
            &self.qualified_name(table)?,
            &columns,
            &order_by,
        )?;
        let result = self.conn.query(&sql)?;

        let mut snapshot = DefaultTable::new(metadata.renamed(table));
        for row in result.rows {
            let values = metadata
                .columns()
                .iter()
                .zip(row)
                .map(|(column, value)| column.data_type().from_wire(value))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            snapshot.add_row(values)?;
        }
        debug!("Snapshot of {}: {} rows", table, snapshot.row_count());
        Ok(snapshot)
    }

    /// Run a query and hold its rows as a named table.
    pub fn create_query_table(&mut self, name: &str, sql: &str) -> Result<DefaultTable> {
        let result = self.conn.query(sql)?;
        table_from_result(name, result, &self.vendor, self.case_sensitive())
    }

    /// Snapshot the given tables, in the given order.
    pub fn create_dataset_for(&mut self, tables: &[&str]) -> Result<DefaultDataSet> {
        let mut dataset = if self.case_sensitive() {
            DefaultDataSet::case_sensitive()
        } else {
            DefaultDataSet::new()
        };
        for table in tables {
            dataset.add_table(self.create_table(table)?)?;
        }
        info!("Snapshot of {} table(s) taken", dataset.len());
        Ok(dataset)
    }

    /// Snapshot every table in the configured schema.
    pub fn create_dataset(&mut self) -> Result<DefaultDataSet> {
        let names = self.conn.table_names(self.config.schema.as_deref())?;
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        self.create_dataset_for(&refs)
    }
}

/// Convert a result set into a table, resolving column types through the vendor.
fn table_from_result(
    name: &str,
    result: ResultSet,
    resolver: &dyn TypeResolver,
    case_sensitive: bool,
) -> Result<DefaultTable> {
    let columns: Vec<Column> = result
        .columns
        .iter()
        .map(|info| {
            Column::new(info.name.clone(), resolver.resolve(&info.type_name, info.type_code))
                .with_nullable(info.nullable)
        })
        .collect();
    let types: Vec<_> = columns.iter().map(Column::data_type).collect();
    let metadata = TableMetaData::with_options(name, columns, Vec::<String>::new(), case_sensitive)?;

    let mut table = DefaultTable::new(metadata);
    for row in result.rows {
        let values = types
            .iter()
            .zip(row)
            .map(|(ty, value)| ty.from_wire(value))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        table.add_row(values)?;
    }
    Ok(table)
}
