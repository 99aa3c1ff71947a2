//! The threaded server: one blocking accept loop, one detached handler
//! thread per connection.
//!
//! The simplest strategy, and the ceiling on per-connection isolation: a
//! stalled peer costs one thread, nothing else. The cost is the thread
//! itself, which is why the pooled server exists.

use crate::metrics::ConnectionGauge;
use crate::net;
use crate::protocol::{self, Outcome};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Everything a handler thread needs to know about its connection.
struct Accepted {
    stream: TcpStream,
    peer: SocketAddr,
    id: u64,
}

pub struct ThreadedServer {
    listener: TcpListener,
    gauge: Arc<ConnectionGauge>,
}

impl ThreadedServer {
    pub fn bind(port: u16) -> io::Result<ThreadedServer> {
        Ok(ThreadedServer {
            listener: net::bind_listener(port)?,
            gauge: Arc::new(ConnectionGauge::new()),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept forever, spawning a handler per connection.
    ///
    /// Handler threads are never joined; each one retires itself when its
    /// connection reaches a terminal outcome. Returns only on a fatal
    /// accept or spawn error.
    pub fn run(self) -> io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "Threaded server ready");

        let mut next_id: u64 = 0;
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let conn = Accepted {
                stream,
                peer,
                id: next_id,
            };
            next_id += 1;

            let connections = self.gauge.connected();
            debug!(id = conn.id, peer = %conn.peer, connections, "Accepted connection");

            let gauge = Arc::clone(&self.gauge);
            thread::Builder::new()
                .name(format!("conn-{}", conn.id))
                .spawn(move || handle(conn, gauge))?;
        }
    }
}

/// Serve request cycles until the connection reaches a terminal outcome.
fn handle(mut conn: Accepted, gauge: Arc<ConnectionGauge>) {
    loop {
        match protocol::serve_once(&mut conn.stream) {
            Ok(Outcome::Served { bytes }) => {
                debug!(id = conn.id, bytes, "Served request");
            }
            Ok(Outcome::PeerClosed) => {
                debug!(id = conn.id, "Peer closed connection");
                break;
            }
            Ok(Outcome::Rejected(reason)) => {
                warn!(id = conn.id, reason = %reason, "Rejected request");
                break;
            }
            Err(e) => {
                debug!(id = conn.id, error = %e, "Connection failed");
                break;
            }
        }
    }

    let connections = gauge.disconnected();
    debug!(id = conn.id, connections, "Connection closed");
}
