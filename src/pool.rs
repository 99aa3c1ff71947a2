//! Fixed pool of long-lived worker threads.
//!
//! Workers pull one ready descriptor at a time from the hand-off, run one
//! protocol cycle on it, and either release the descriptor (healthy
//! connection, registration stays live) or close it. They share nothing
//! beyond the hand-off and the connection gauge.

use crate::handoff::Handoff;
use crate::metrics::ConnectionGauge;
use crate::net::Conn;
use crate::protocol::{self, Outcome};
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// The pool: a fixed set of workers created once, never resized.
pub struct WorkerPool {
    channel: Arc<Handoff<RawFd>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` named threads pulling from `channel`.
    ///
    /// A thread that cannot be created is fatal to the caller.
    pub fn spawn(
        workers: usize,
        channel: Arc<Handoff<RawFd>>,
        gauge: Arc<ConnectionGauge>,
    ) -> io::Result<WorkerPool> {
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let channel = Arc::clone(&channel);
            let gauge = Arc::clone(&gauge);

            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &channel, &gauge))?;

            handles.push(handle);
        }

        Ok(WorkerPool { channel, handles })
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Cancel the pool: close the channel and join every worker.
    ///
    /// The servers never call this; their pools run for the process
    /// lifetime. Tests and embedders use it for orderly teardown.
    pub fn shutdown(self) {
        self.channel.close();
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

/// One service cycle per delivery; terminal outcomes close here, in the
/// worker, never in the multiplexer.
fn worker_loop(worker_id: usize, channel: &Handoff<RawFd>, gauge: &ConnectionGauge) {
    while let Some(fd) = channel.take() {
        let mut conn = Conn::claim(fd);

        match protocol::serve_once(&mut conn) {
            Ok(Outcome::Served { bytes }) => {
                trace!(worker = worker_id, fd, bytes, "Served request");
                conn.release();
            }
            Ok(Outcome::PeerClosed) => {
                trace!(worker = worker_id, fd, "Peer closed");
                close(conn, gauge);
            }
            Ok(Outcome::Rejected(reason)) => {
                warn!(worker = worker_id, fd, %reason, "Rejected request");
                close(conn, gauge);
            }
            Err(e) => {
                debug!(worker = worker_id, fd, error = %e, "Connection failed");
                close(conn, gauge);
            }
        }
    }

    debug!(worker = worker_id, "Worker stopped");
}

fn close(conn: Conn, gauge: &ConnectionGauge) {
    let fd = conn.fd();
    drop(conn);
    // The decrement must not ride inside the log macro: disabled events
    // skip their field expressions.
    let connections = gauge.disconnected();
    debug!(fd, connections, "Connection closed");
}

/// Worker count used when the configured count is zero: one per core.
pub fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
