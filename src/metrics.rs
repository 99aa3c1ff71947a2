//! Connection accounting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live-connection gauge shared between the accept and close sites.
///
/// Accepts and closes happen on different threads, hence the atomic; the
/// value feeds log lines only and plays no part in correctness.
#[derive(Debug, Default)]
pub struct ConnectionGauge {
    live: AtomicU64,
}

impl ConnectionGauge {
    pub fn new() -> Self {
        Self {
            live: AtomicU64::new(0),
        }
    }

    /// Record an accepted connection, returning the new live count.
    pub fn connected(&self) -> u64 {
        self.live.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a closed connection, returning the new live count.
    ///
    /// Every call must pair with an earlier [`connected`].
    ///
    /// [`connected`]: ConnectionGauge::connected
    pub fn disconnected(&self) -> u64 {
        self.live.fetch_sub(1, Ordering::Relaxed) - 1
    }

    /// Current number of live connections.
    pub fn current(&self) -> u64 {
        self.live.load(Ordering::Relaxed)
    }
}
