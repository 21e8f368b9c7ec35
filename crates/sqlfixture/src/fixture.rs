//! Fixture session: setup, verify and teardown against one connection.

use tracing::{debug, info};

use crate::compare::{Comparer, Diff};
use crate::config::FixtureConfig;
use crate::connection::{Connection, DatabaseConnection};
use crate::dataset::DataSet;
use crate::error::{FixtureError, Result};
use crate::operation::Executor;

/// Applies a [`FixtureConfig`] to one connection.
///
/// The fixture borrows nothing from the caller: it owns the connection for
/// its lifetime and gives it back through [`into_inner`](Self::into_inner).
/// Closing the connection stays with the caller.
pub struct Fixture<C: Connection> {
    config: FixtureConfig,
    db: DatabaseConnection<C>,
    executor: Executor,
    comparer: Comparer,
}

impl<C: Connection> Fixture<C> {
    /// Validate `config` and bind it to `conn`.
    pub fn new(config: FixtureConfig, conn: C) -> Result<Self> {
        config.validate()?;
        let db = DatabaseConnection::new(conn, config.database.clone())?;
        let executor = Executor::from_config(&config.database);
        let comparer = config.comparer()?;
        Ok(Self {
            config,
            db,
            executor,
            comparer,
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn database(&mut self) -> &mut DatabaseConnection<C> {
        &mut self.db
    }

    pub fn comparer(&self) -> &Comparer {
        &self.comparer
    }

    /// Replace the comparer built from the verify section.
    pub fn set_comparer(&mut self, comparer: Comparer) {
        self.comparer = comparer;
    }

    pub fn into_inner(self) -> C {
        self.db.into_inner()
    }

    /// Run the `before_sql` scripts, then the setup operation with `dataset`.
    pub fn setup(&mut self, dataset: &dyn DataSet) -> Result<()> {
        run_scripts(&mut self.db, &self.config.setup.before_sql)?;
        let operation = &self.config.setup.operation;
        self.executor.execute(operation, &mut self.db, dataset)?;
        info!("Setup complete ({})", operation);
        Ok(())
    }

    /// Setup with the datasets listed in the configuration.
    pub fn setup_from_config(&mut self) -> Result<()> {
        let dataset = self.config.setup_dataset()?;
        self.setup(&dataset)
    }

    /// Snapshot the tables named in `expected` and compare.
    ///
    /// Tables missing from the database are left out of the snapshot so they
    /// come back as missing-table discrepancies.
    pub fn verify(&mut self, expected: &dyn DataSet) -> Result<Diff> {
        let mut present = Vec::new();
        for name in expected.table_names() {
            match self.db.catalog_table_name(name) {
                Ok(_) => present.push(name),
                Err(FixtureError::NoSuchTable(_)) => debug!("{} not in database", name),
                Err(e) => return Err(e),
            }
        }
        let actual = self.db.create_dataset_for(&present)?;
        let diff = self.comparer.compare(expected, &actual)?;
        if diff.is_empty() {
            info!("Verify passed for {} table(s)", present.len());
        } else {
            info!("Verify found {} discrepancies", diff.len());
        }
        Ok(diff)
    }

    /// Verify against the expected datasets listed in the configuration.
    pub fn verify_from_config(&mut self) -> Result<Diff> {
        let expected = self.config.expected_dataset()?;
        self.verify(&expected)
    }

    /// Run the teardown operation with `dataset`, then the `after_sql` scripts.
    pub fn teardown(&mut self, dataset: &dyn DataSet) -> Result<()> {
        let operation = &self.config.teardown.operation;
        self.executor.execute(operation, &mut self.db, dataset)?;
        run_scripts(&mut self.db, &self.config.teardown.after_sql)?;
        info!("Teardown complete ({})", operation);
        Ok(())
    }

    /// Teardown with the setup datasets listed in the configuration.
    pub fn teardown_from_config(&mut self) -> Result<()> {
        let dataset = self.config.setup_dataset()?;
        self.teardown(&dataset)
    }
}

fn run_scripts<C: Connection>(db: &mut DatabaseConnection<C>, scripts: &[String]) -> Result<()> {
    for sql in scripts {
        debug!("{}", sql);
        db.connection_mut().execute(sql)?;
    }
    Ok(())
}
