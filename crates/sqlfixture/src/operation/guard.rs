//! Scope guards restoring connection state on every exit path.
//!
//! Both guards own the mutable borrow of the connection for their scope and
//! hand it out through `db()`. Restoring happens in `Drop`, so it also runs
//! while unwinding. Restore failures are logged, never raised.

use tracing::{debug, warn};

use crate::connection::{Connection, DatabaseConnection};
use crate::error::{FixtureError, Result};
use crate::vendor::Dialect;

/// Auto-commit off for the guard's lifetime; rolled back unless committed.
pub(crate) struct TransactionGuard<'a, C: Connection> {
    db: &'a mut DatabaseConnection<C>,
    committed: bool,
}

impl<'a, C: Connection> TransactionGuard<'a, C> {
    /// Turn auto-commit off.
    ///
    /// # Errors
    ///
    /// `ExclusiveTransaction` if auto-commit is already off: the caller owns
    /// a transaction this one must not interfere with.
    pub fn begin(db: &'a mut DatabaseConnection<C>) -> Result<Self> {
        if !db.connection().auto_commit()? {
            return Err(FixtureError::ExclusiveTransaction);
        }
        db.connection_mut().set_auto_commit(false)?;
        debug!("Transaction started");
        Ok(Self {
            db,
            committed: false,
        })
    }

    pub fn db(&mut self) -> &mut DatabaseConnection<C> {
        self.db
    }

    /// Commit. On failure the guard still rolls back and restores auto-commit.
    pub fn commit(mut self) -> Result<()> {
        self.db.connection_mut().commit()?;
        self.committed = true;
        debug!("Transaction committed");
        Ok(())
    }
}

impl<C: Connection> Drop for TransactionGuard<'_, C> {
    fn drop(&mut self) {
        let conn = self.db.connection_mut();
        if !self.committed {
            match conn.rollback() {
                Ok(()) => debug!("Transaction rolled back"),
                Err(e) => warn!("Rollback failed: {}", e),
            }
        }
        if let Err(e) = conn.set_auto_commit(true) {
            warn!("Failed to restore auto-commit: {}", e);
        }
    }
}

/// Explicit identity values enabled for one table while the guard lives.
///
/// A no-op for vendors without an identity bracket.
pub(crate) struct IdentityInsertGuard<'a, C: Connection> {
    db: &'a mut DatabaseConnection<C>,
    disable: Option<String>,
}

impl<'a, C: Connection> IdentityInsertGuard<'a, C> {
    pub fn enable(db: &'a mut DatabaseConnection<C>, qualified_table: &str) -> Result<Self> {
        let vendor = db.vendor();
        let disable = match vendor.identity_insert_statement(qualified_table, true) {
            Some(enable) => {
                db.connection_mut().execute(&enable)?;
                debug!("{}", enable);
                vendor.identity_insert_statement(qualified_table, false)
            }
            None => None,
        };
        Ok(Self { db, disable })
    }

    pub fn db(&mut self) -> &mut DatabaseConnection<C> {
        self.db
    }
}

impl<C: Connection> Drop for IdentityInsertGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(sql) = self.disable.take() {
            match self.db.connection_mut().execute(&sql) {
                Ok(_) => debug!("{}", sql),
                Err(e) => warn!("Failed to restore identity insert ({}): {}", sql, e),
            }
        }
    }
}
