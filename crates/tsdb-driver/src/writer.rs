use std::any::Any;
use std::sync::mpsc::Receiver;

use rusqlite::Connection;
use tokio::sync::oneshot;
use tsdb_errors::Result;

pub(crate) type BoxedAny = Box<dyn Any + Send>;
pub(crate) type Job = Box<dyn FnOnce(&Connection) -> Result<BoxedAny> + Send>;

pub(crate) struct QueuedJob {
    pub job: Job,
    pub reply: oneshot::Sender<Result<BoxedAny>>,
}

/// The body of the dedicated writer thread: one `Connection`, drained
/// strictly in FIFO order. Because every driver operation — reads included —
/// funnels through this loop, no caller ever observes a partial write: the
/// thread is never between two jobs mid-transaction.
pub(crate) fn run(conn: Connection, job_rx: Receiver<QueuedJob>) {
    while let Ok(QueuedJob { job, reply }) = job_rx.recv() {
        let result = job(&conn);
        // Caller may have dropped its future (e.g. timed out); nothing to do.
        let _ = reply.send(result);
    }
}
