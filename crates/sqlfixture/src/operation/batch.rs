//! Batched execution of one prepared statement.

use tracing::debug;

use crate::connection::PreparedStatement;
use crate::core::wire::SqlValue;
use crate::error::{FixtureError, Result};

/// Feeds parameter sets into a prepared statement, flushing every
/// `batch_size` rows.
///
/// Errors come back wrapped with the operation, table, statement and the
/// first row of the failed batch. Call [`finish`](Self::finish) to flush the
/// tail; dropping the writer discards queued rows.
pub(crate) struct BatchWriter<'s> {
    statement: Box<dyn PreparedStatement + 's>,
    sql: String,
    operation: &'static str,
    table: String,
    batch_size: usize,
    batched: bool,
    pending: usize,
    first_pending_row: Option<usize>,
    affected: u64,
}

impl<'s> BatchWriter<'s> {
    pub fn new(
        statement: Box<dyn PreparedStatement + 's>,
        sql: String,
        operation: &'static str,
        table: &str,
        batch_size: usize,
        batched: bool,
    ) -> Self {
        Self {
            statement,
            sql,
            operation,
            table: table.to_string(),
            batch_size: batch_size.max(1),
            batched,
            pending: 0,
            first_pending_row: None,
            affected: 0,
        }
    }

    fn wrap(&self, row: Option<usize>, e: FixtureError) -> FixtureError {
        FixtureError::operation(self.operation, &self.table, row, Some(self.sql.clone()), e)
    }

    /// Queue or execute one row's parameters.
    pub fn add(&mut self, row: usize, params: Vec<SqlValue<'static>>) -> Result<()> {
        if !self.batched {
            return match self.statement.execute(&params) {
                Ok(n) => {
                    self.affected += n;
                    Ok(())
                }
                Err(e) => Err(self.wrap(Some(row), e)),
            };
        }

        if let Err(e) = self.statement.add_batch(params) {
            return Err(self.wrap(Some(row), e));
        }
        self.first_pending_row.get_or_insert(row);
        self.pending += 1;
        if self.pending >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let first_row = self.first_pending_row.take();
        let result = self.statement.execute_batch();
        self.statement.clear_batch();
        let count = self.pending;
        self.pending = 0;
        match result {
            Ok(counts) => {
                self.affected += counts.iter().sum::<u64>();
                debug!(
                    "{} {}: flushed batch of {} row(s)",
                    self.operation, self.table, count
                );
                Ok(())
            }
            Err(e) => Err(self.wrap(first_row, e)),
        }
    }

    /// Flush remaining rows and return the total affected row count.
    pub fn finish(mut self) -> Result<u64> {
        self.flush()?;
        Ok(self.affected)
    }
}
