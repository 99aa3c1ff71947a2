//! The pooled server: an edge-triggered readiness multiplexer feeding a
//! fixed worker pool through the single-slot hand-off.
//!
//! One thread owns the listener and the poll loop. Accepted sockets are
//! set non-blocking, registered for edge-triggered reads with their own
//! descriptor as the token, and detached; from then on the descriptor
//! surfaces only through readiness events. Each ready descriptor goes to
//! whichever worker is parked in `take()`; while the slot is occupied the
//! multiplexer blocks in `submit()`, which is the backpressure that keeps
//! it from outrunning the pool.
//!
//! A descriptor in flight belongs to exactly one worker. On a healthy
//! cycle the worker releases it and the registration stays put, so the
//! next request raises a fresh edge here; on any terminal outcome the
//! worker closes it, which also clears the registration. This loop never
//! touches a descriptor after submitting it.
//!
//! Listener-side failures are fatal. Connection-side failures never reach
//! this loop.

use crate::handoff::Handoff;
use crate::metrics::ConnectionGauge;
use crate::net;
use crate::pool::{self, WorkerPool};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{AsRawFd, RawFd};
use std::sync::Arc;
use tracing::{debug, info};

// Client tokens are descriptors, which keeps them well away from this.
const LISTENER_TOKEN: Token = Token(usize::MAX);

const EVENT_CAPACITY: usize = 1024;

/// The multiplexer plus everything it shares with its pool.
pub struct PooledServer {
    listener: TcpListener,
    poll: Poll,
    channel: Arc<Handoff<RawFd>>,
    gauge: Arc<ConnectionGauge>,
    workers: usize,
}

impl PooledServer {
    /// Bind the listener and set up the interest set.
    ///
    /// `workers == 0` means one worker per CPU core.
    pub fn bind(port: u16, workers: usize) -> io::Result<PooledServer> {
        let listener = net::bind_listener(port)?;
        listener.set_nonblocking(true)?;

        let poll = Poll::new()?;
        let fd = listener.as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), LISTENER_TOKEN, Interest::READABLE)?;

        let workers = if workers == 0 {
            pool::num_cpus()
        } else {
            workers
        };

        Ok(PooledServer {
            listener,
            poll,
            channel: Arc::new(Handoff::new()),
            gauge: Arc::new(ConnectionGauge::new()),
            workers,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Spawn the pool and run the readiness loop.
    ///
    /// Returns only on a fatal listener/poll error, or with `Ok` if the
    /// hand-off channel is closed out from under the loop.
    pub fn run(self) -> io::Result<()> {
        let PooledServer {
            listener,
            mut poll,
            channel,
            gauge,
            workers,
        } = self;

        let _pool = WorkerPool::spawn(workers, Arc::clone(&channel), Arc::clone(&gauge))?;

        info!(addr = %listener.local_addr()?, workers, "Pooled server ready");

        let mut events = Events::with_capacity(EVENT_CAPACITY);
        loop {
            if let Err(e) = poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => accept_pending(&listener, &poll, &gauge)?,
                    Token(fd) => {
                        // Blocks while the slot is occupied: backpressure.
                        if channel.submit(fd as RawFd).is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Drain the accept backlog.
///
/// One edge can stand for many queued connections, so accepting until
/// the listener reports would-block is mandatory, not an optimization.
fn accept_pending(
    listener: &TcpListener,
    poll: &Poll,
    gauge: &ConnectionGauge,
) -> io::Result<()> {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                let fd = net::detach(stream);
                poll.registry()
                    .register(&mut SourceFd(&fd), Token(fd as usize), Interest::READABLE)?;

                let connections = gauge.connected();
                debug!(fd, peer = %peer, connections, "Accepted connection");
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
