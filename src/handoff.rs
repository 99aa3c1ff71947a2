//! Single-slot synchronized hand-off between one producer and a pool of
//! consumers.
//!
//! The multiplexer deposits one ready descriptor at a time; whichever
//! worker is parked in [`Handoff::take`] picks it up. The slot holds at
//! most one undelivered value, so a producer that outruns the consumers
//! blocks in [`Handoff::submit`] until a worker catches up. That block is
//! the backpressure mechanism; there is no queue to grow.
//!
//! Guarantees:
//! - a deposited value is delivered to exactly one consumer, never
//!   dropped, never duplicated;
//! - `submit` never overwrites an undelivered value;
//! - exactly one waiting consumer wakes per deposit.

use std::sync::{Condvar, Mutex};

struct Slot<T> {
    value: Option<T>,
    closed: bool,
}

/// The hand-off cell. Shared by reference (typically `Arc`) between the
/// producer and every consumer; all coordination state lives inside.
pub struct Handoff<T> {
    slot: Mutex<Slot<T>>,
    /// Signaled by the producer after depositing.
    filled: Condvar,
    /// Signaled by a consumer after clearing the slot.
    emptied: Condvar,
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                closed: false,
            }),
            filled: Condvar::new(),
            emptied: Condvar::new(),
        }
    }

    /// Deposit `value`, blocking while the slot still holds an
    /// undelivered one. Wakes exactly one waiting consumer.
    ///
    /// Returns the value back if the channel was closed before it could
    /// be placed.
    pub fn submit(&self, value: T) -> Result<(), T> {
        let mut slot = self.slot.lock().unwrap();
        while slot.value.is_some() && !slot.closed {
            slot = self.emptied.wait(slot).unwrap();
        }
        if slot.closed {
            return Err(value);
        }
        slot.value = Some(value);
        self.filled.notify_one();
        Ok(())
    }

    /// Wait for a value, clear the slot, and wake the producer.
    ///
    /// Returns `None` once the channel is closed and the slot drained,
    /// which is the consumer's signal to stop.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.slot.lock().unwrap();
        loop {
            if let Some(value) = slot.value.take() {
                self.emptied.notify_one();
                return Some(value);
            }
            if slot.closed {
                return None;
            }
            slot = self.filled.wait(slot).unwrap();
        }
    }

    /// Close the channel and wake every waiter. A value already deposited
    /// is still delivered; new deposits are refused.
    pub fn close(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.closed = true;
        self.filled.notify_all();
        self.emptied.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().unwrap().closed
    }
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}
