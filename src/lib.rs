//! byteswarm: a byte-serving TCP benchmark server.
//!
//! The wire protocol is one line per request: an ASCII decimal byte count
//! terminated by `\n`, answered with exactly that many filler bytes. The
//! point of the repository is to serve that protocol at high connection
//! counts under three different concurrency strategies:
//!
//! - [`server::threaded`]: one handler thread per connection
//! - [`server::polled`]: a single readiness-loop thread servicing
//!   connections inline
//! - [`server::pooled`]: an edge-triggered readiness multiplexer handing
//!   ready sockets to a fixed worker pool through a single-slot
//!   synchronized hand-off
//!
//! All three answer the protocol identically; [`client`] is a
//! multithreaded load generator for driving any of them.

pub mod client;
pub mod config;
pub mod handoff;
pub mod metrics;
pub mod net;
pub mod pool;
pub mod protocol;
pub mod server;

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` controls the filter when set; the default level is `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
