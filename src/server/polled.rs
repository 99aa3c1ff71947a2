//! The polled server: one thread, one readiness loop, no hand-off.
//!
//! Connections are serviced inline as their readiness surfaces, one at a
//! time. Accepted sockets stay in blocking mode; a readiness event is the
//! cue to run one full request cycle, and the cycle's own reads and
//! writes may block. That makes this the baseline a slow or adversarial
//! peer can stall, which is exactly the contrast the pooled server exists
//! to demonstrate.

use crate::metrics::ConnectionGauge;
use crate::net;
use crate::protocol::{self, Outcome};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use slab::Slab;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use tracing::{debug, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

const EVENT_CAPACITY: usize = 1024;

pub struct PolledServer {
    listener: TcpListener,
    poll: Poll,
    connections: Slab<TcpStream>,
    gauge: ConnectionGauge,
}

impl PolledServer {
    pub fn bind(port: u16) -> io::Result<PolledServer> {
        let listener = net::bind_listener(port)?;
        listener.set_nonblocking(true)?;

        let poll = Poll::new()?;
        let fd = listener.as_raw_fd();
        poll.registry()
            .register(&mut SourceFd(&fd), LISTENER_TOKEN, Interest::READABLE)?;

        Ok(PolledServer {
            listener,
            poll,
            connections: Slab::new(),
            gauge: ConnectionGauge::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the readiness loop. Returns only on a fatal error.
    pub fn run(mut self) -> io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "Polled server ready");

        let mut events = Events::with_capacity(EVENT_CAPACITY);
        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => self.accept_pending()?,
                    Token(key) => self.service(key),
                }
            }
        }
    }

    /// Drain the accept backlog; one edge can stand for many connections.
    fn accept_pending(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    let entry = self.connections.vacant_entry();
                    let key = entry.key();
                    let fd = stream.as_raw_fd();
                    self.poll.registry().register(
                        &mut SourceFd(&fd),
                        Token(key),
                        Interest::READABLE,
                    )?;
                    entry.insert(stream);

                    let connections = self.gauge.connected();
                    debug!(key, peer = %peer, connections, "Accepted connection");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Run one request cycle on a ready connection, inline.
    fn service(&mut self, key: usize) {
        // Stale event for a connection already retired this batch.
        if !self.connections.contains(key) {
            return;
        }

        let stream = &mut self.connections[key];
        match protocol::serve_once(stream) {
            Ok(Outcome::Served { bytes }) => {
                debug!(key, bytes, "Served request");
                return;
            }
            Ok(Outcome::PeerClosed) => debug!(key, "Peer closed connection"),
            Ok(Outcome::Rejected(reason)) => {
                warn!(key, reason = %reason, "Rejected request");
            }
            Err(e) => debug!(key, error = %e, "Connection failed"),
        }

        let stream = self.connections.remove(key);
        let fd = stream.as_raw_fd();
        if let Err(e) = self.poll.registry().deregister(&mut SourceFd(&fd)) {
            debug!(key, error = %e, "Deregister failed");
        }
        let connections = self.gauge.disconnected();
        debug!(key, connections, "Connection closed");
    }
}
