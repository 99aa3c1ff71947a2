//! Socket primitives shared by the servers and the load client.
//!
//! Thin, policy-free wrappers: listener construction, a bounded line read,
//! and [`Conn`], the owned claim a worker holds on a connection descriptor
//! for the duration of one service cycle.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::{FromRawFd, IntoRawFd, RawFd};

const LISTEN_BACKLOG: i32 = 1024;

/// Create a TCP listener bound to all IPv4 interfaces on `port`.
///
/// Address reuse is enabled so restarts do not trip over sockets still in
/// TIME_WAIT. The listener comes back blocking; readiness-driven callers
/// flip it to non-blocking themselves.
pub fn bind_listener(port: u16) -> io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

/// What a bounded line read produced.
#[derive(Debug, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, terminator stripped.
    Line(Vec<u8>),
    /// Clean close before any byte arrived.
    Eof,
    /// No terminator within `max` bytes.
    Overlong,
}

/// Read one `\n`-terminated line of at most `max` bytes (terminator
/// included), one byte per read call so nothing past the terminator is
/// consumed.
///
/// A peer close mid-line is an error (`UnexpectedEof`), distinct from
/// [`LineRead::Eof`], which is a close before the line started.
pub fn read_line<R: Read>(reader: &mut R, max: usize) -> io::Result<LineRead> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    while line.len() < max {
        match reader.read(&mut byte) {
            Ok(0) => {
                return if line.is_empty() {
                    Ok(LineRead::Eof)
                } else {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed mid-line",
                    ))
                }
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    return Ok(LineRead::Line(line));
                }
                line.push(byte[0]);
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(LineRead::Overlong)
}

/// Detach an accepted stream from its object. From here on the descriptor's
/// lifetime is governed by the poller registration and worker claims.
pub(crate) fn detach(stream: TcpStream) -> RawFd {
    stream.into_raw_fd()
}

/// A worker's owned claim on a connection descriptor.
///
/// Descriptors travel bare through the hand-off; `claim` wraps one for a
/// single service cycle. Dropping the claim closes the connection, which
/// also clears any poller registration. [`Conn::release`] ends the cycle
/// with the descriptor still open, ready for its next readiness edge.
#[derive(Debug)]
pub struct Conn {
    stream: TcpStream,
    fd: RawFd,
}

impl Conn {
    /// Take ownership of `fd` for one service cycle.
    ///
    /// At most one claim may exist per descriptor; the hand-off delivers
    /// each descriptor to exactly one worker, which upholds that.
    pub(crate) fn claim(fd: RawFd) -> Conn {
        // SAFETY: `fd` came from `detach` on an accepted stream and was
        // delivered to this worker alone.
        let stream = unsafe { TcpStream::from_raw_fd(fd) };
        Conn { stream, fd }
    }

    /// The claimed descriptor.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Drop the claim without closing the connection.
    pub(crate) fn release(self) {
        let _ = self.stream.into_raw_fd();
    }
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
