//! The request/response protocol every server variant speaks.
//!
//! A request is one line: an ASCII decimal byte count terminated by `\n`.
//! The response is exactly that many filler bytes, no framing. A
//! connection serves any number of requests until the peer closes or a
//! request is invalid.

use crate::net::{self, LineRead};
use std::fmt;
use std::io::{self, Read, Write};

/// Bounds both the request line and the largest serviceable byte count.
pub const BUFFER_CAPACITY: usize = 1024;

/// Response payload; the protocol leaves the content unspecified.
static FILL: [u8; BUFFER_CAPACITY] = [b'L'; BUFFER_CAPACITY];

/// Result of one service cycle.
#[derive(Debug)]
pub enum Outcome {
    /// Response written in full; the connection stays open.
    Served { bytes: usize },
    /// Peer closed cleanly before sending a request.
    PeerClosed,
    /// Invalid request; the caller closes the connection.
    Rejected(Reject),
}

/// Why a request was refused.
///
/// Rejections close the connection just like transport failures do, but
/// carry a reason so the two log distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    /// The line did not parse as a base-10 integer.
    Malformed,
    /// Parsed, but outside `1..=BUFFER_CAPACITY`.
    OutOfRange(i64),
    /// No terminator within the line bound.
    Overlong,
}

impl fmt::Display for Reject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reject::Malformed => write!(f, "malformed request line"),
            Reject::OutOfRange(n) => write!(f, "byte count {} out of range", n),
            Reject::Overlong => write!(f, "request line exceeds {} bytes", BUFFER_CAPACITY),
        }
    }
}

/// Run one `AWAIT_REQUEST -> RESPONDING` cycle on `stream`.
///
/// Reads a request line, validates the byte count, writes the response.
/// Transport failures (including a peer close mid-line) surface as `Err`;
/// everything the protocol itself decides comes back as an [`Outcome`].
pub fn serve_once<S: Read + Write>(stream: &mut S) -> io::Result<Outcome> {
    let line = match net::read_line(stream, BUFFER_CAPACITY)? {
        LineRead::Line(line) => line,
        LineRead::Eof => return Ok(Outcome::PeerClosed),
        LineRead::Overlong => return Ok(Outcome::Rejected(Reject::Overlong)),
    };

    let requested = match parse_count(&line) {
        Some(n) => n,
        None => return Ok(Outcome::Rejected(Reject::Malformed)),
    };

    if requested < 1 || requested > BUFFER_CAPACITY as i64 {
        return Ok(Outcome::Rejected(Reject::OutOfRange(requested)));
    }

    let bytes = requested as usize;
    stream.write_all(&FILL[..bytes])?;

    Ok(Outcome::Served { bytes })
}

/// Strict base-10 parse of a request line; surrounding ASCII whitespace
/// (a stray `\r`, say) is tolerated, trailing garbage is not.
fn parse_count(line: &[u8]) -> Option<i64> {
    std::str::from_utf8(line).ok()?.trim().parse().ok()
}
