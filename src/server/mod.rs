//! The three server variants.
//!
//! All of them answer the same one-line protocol; they differ only in how
//! connections get scheduled onto threads:
//!
//! - [`threaded`]: blocking accept loop, one handler thread per connection
//! - [`polled`]: one readiness loop servicing every connection inline
//! - [`pooled`]: readiness loop handing ready sockets to a worker pool

pub mod polled;
pub mod pooled;
pub mod threaded;
