//! SQLite driver contract (C1): a thin, single-writer async wrapper over
//! `rusqlite`, built around free functions per operation rather than a
//! connection pool, because SQLite's single-writer constraint makes a pool
//! pointless for write traffic.
//!
//! `rusqlite::Connection` is `!Send` across await points, so every operation
//! — reads included — is dispatched as a boxed closure onto a dedicated OS
//! thread that owns the one `Connection` and drains an `std::sync::mpsc`
//! queue. Each queued job carries a `tokio::sync::oneshot` reply channel so
//! async callers can `.await` their result. Because the thread processes
//! jobs strictly one at a time, a transaction never interleaves with any
//! other operation — that guarantee falls out of the queue, not out of
//! explicit locking.

mod handle;
mod value;
mod writer;

use std::thread::JoinHandle;

use rusqlite::Connection;
use tokio::sync::oneshot;
use tsdb_config::DriverOptions;
use tsdb_errors::{DriverError, Result, TsdbError};

pub use handle::TxHandle;
pub use value::SqlValue;

use writer::{BoxedAny, QueuedJob};

/// Nesting behavior for `transaction` called from inside `transaction`
/// (variant set: `native` | `cooperative-savepoint`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestedTransactionMode {
    /// The driver manages its own `BEGIN IMMEDIATE` / `SAVEPOINT`s (default).
    #[default]
    Savepoint,
    /// A host-native transaction primitive backs the top-level transaction;
    /// nested calls are refused rather than emulated.
    NativeUnsupported,
}

/// A single-writer SQLite driver. Cheap to clone-by-reference (callers hold
/// it behind `Arc` or pass `&SqliteDriver`); the writer thread outlives the
/// last clone of the sender and exits once every handle is dropped.
pub struct SqliteDriver {
    job_tx: std::sync::mpsc::Sender<QueuedJob>,
    mode: NestedTransactionMode,
    _writer: JoinHandle<()>,
}

impl SqliteDriver {
    /// Open a connection at `options.database_path`, apply its pragmas, and
    /// spawn the writer thread. Uses cooperative savepoints for nesting.
    pub fn open(options: &DriverOptions) -> Result<Self> {
        Self::open_with_mode(options, NestedTransactionMode::Savepoint)
    }

    pub fn open_with_mode(options: &DriverOptions, mode: NestedTransactionMode) -> Result<Self> {
        let conn = Connection::open(&options.database_path)?;
        for (name, value) in options.pragmas() {
            conn.pragma_update(None, name.as_str(), value.as_str())?;
        }
        let (job_tx, job_rx) = std::sync::mpsc::channel::<QueuedJob>();
        let writer = std::thread::Builder::new()
            .name("tsdb-writer".to_string())
            .spawn(move || writer::run(conn, job_rx))
            .map_err(|_| TsdbError::Driver(DriverError::WriterGone))?;
        Ok(Self {
            job_tx,
            mode,
            _writer: writer,
        })
    }

    async fn submit<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed_job: writer::Job =
            Box::new(move |conn| job(conn).map(|v| Box::new(v) as BoxedAny));
        self.job_tx
            .send(QueuedJob {
                job: boxed_job,
                reply: reply_tx,
            })
            .map_err(|_| TsdbError::Driver(DriverError::WriterGone))?;
        let result = reply_rx
            .await
            .map_err(|_| TsdbError::Driver(DriverError::WriterGone))?;
        result.map(|boxed| {
            *boxed
                .downcast::<T>()
                .expect("submit() job always returns the type it was declared with")
        })
    }

    /// Run arbitrary DDL/DML as a batch (multiple `;`-separated statements
    /// allowed — this is the only entry point that permits that, for schema
    /// bootstrap). No parameter binding.
    pub async fn exec(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.submit(move |conn| Ok(conn.execute_batch(&sql)?))
            .await
    }

    /// Run a single parameterized statement, returning the number of rows
    /// it affected.
    pub async fn run(&self, sql: &str, params: Vec<SqlValue>) -> Result<usize> {
        let sql = sql.to_string();
        self.submit(move |conn| {
            let refs: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
            Ok(conn.execute(&sql, refs.as_slice())?)
        })
        .await
    }

    /// Run a parameterized query, mapping each row with `map_row`.
    pub async fn query<T, F>(&self, sql: &str, params: Vec<SqlValue>, mut map_row: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
    {
        let sql = sql.to_string();
        self.submit(move |conn| {
            let refs: Vec<&dyn rusqlite::ToSql> =
                params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(refs.as_slice(), |row| map_row(row))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
    }

    /// Run `body` inside `BEGIN IMMEDIATE` / `COMMIT`. On `Err`, issues
    /// `ROLLBACK` and returns the original error — if the rollback itself
    /// fails, that failure is swallowed and the original error still wins.
    /// `body` receives a [`TxHandle`] through which it can nest further
    /// transactions as savepoints; there is no way to reach this driver's
    /// own `transaction` from inside `body`, so a callback cannot
    /// accidentally reenter the outer queue and deadlock the writer thread.
    pub async fn transaction<T, F>(&self, body: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&TxHandle) -> Result<T> + Send + 'static,
    {
        let mode = self.mode;
        self.submit(move |conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            let handle = TxHandle::root(conn, mode);
            match body(&handle) {
                Ok(value) => {
                    conn.execute_batch("COMMIT")?;
                    Ok(value)
                }
                Err(err) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    Err(err)
                }
            }
        })
        .await
    }
}
