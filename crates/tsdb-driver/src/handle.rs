use std::cell::Cell;
use std::rc::Rc;

use rusqlite::Connection;
use tsdb_errors::{DriverError, Result, TsdbError};

use crate::value::SqlValue;
use crate::NestedTransactionMode;

/// A handle into an open transaction or savepoint, valid only for the
/// duration of the enclosing `transaction` callback. Dropping it does not
/// commit or roll back anything — the enclosing call does that.
pub struct TxHandle<'conn> {
    conn: &'conn Connection,
    mode: NestedTransactionMode,
    depth: usize,
    counter: Rc<Cell<u64>>,
}

impl<'conn> TxHandle<'conn> {
    pub(crate) fn root(conn: &'conn Connection, mode: NestedTransactionMode) -> Self {
        Self {
            conn,
            mode,
            depth: 0,
            counter: Rc::new(Cell::new(0)),
        }
    }

    /// How many transactions/savepoints deep this handle sits. `0` is the
    /// top-level `BEGIN IMMEDIATE`.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn exec(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn run(&self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        let refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        Ok(self.conn.execute(sql, refs.as_slice())?)
    }

    pub fn query<T>(
        &self,
        sql: &str,
        params: &[SqlValue],
        mut map_row: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(refs.as_slice(), |row| map_row(row))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Open a nested transaction as a `SAVEPOINT`. In
    /// [`NestedTransactionMode::NativeUnsupported`] this always fails: the
    /// host's native transaction primitive has already been spent on the
    /// enclosing call and cannot be nested.
    pub fn transaction<T>(&self, body: impl FnOnce(&TxHandle) -> Result<T>) -> Result<T> {
        if self.mode == NestedTransactionMode::NativeUnsupported {
            return Err(TsdbError::Driver(DriverError::NestedTransactionUnsupported));
        }
        let n = self.counter.get() + 1;
        self.counter.set(n);
        let savepoint = format!("tsdb_sp_{n}");
        self.conn.execute_batch(&format!("SAVEPOINT {savepoint}"))?;

        let nested = TxHandle {
            conn: self.conn,
            mode: self.mode,
            depth: self.depth + 1,
            counter: Rc::clone(&self.counter),
        };

        match body(&nested) {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {savepoint}"))?;
                Ok(value)
            }
            Err(err) => {
                // Original error wins; failure to unwind the savepoint is swallowed.
                let _ = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {savepoint}; RELEASE {savepoint}"));
                Err(err)
            }
        }
    }
}
