//! Wire-level tests driving live servers over loopback.
//!
//! All three strategies answer the protocol identically, so one battery
//! runs against each. The pooled server gets extra coverage for the parts
//! only it has: the accept drain and the single-slot hand-off.

use byteswarm::server::polled::PolledServer;
use byteswarm::server::pooled::PooledServer;
use byteswarm::server::threaded::ThreadedServer;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;

fn spawn_threaded() -> SocketAddr {
    let server = ThreadedServer::bind(0).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

fn spawn_polled() -> SocketAddr {
    let server = PolledServer::bind(0).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

fn spawn_pooled(workers: usize) -> SocketAddr {
    let server = PooledServer::bind(0, workers).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.run());
    addr
}

/// One full request: send the count, read back exactly that many bytes.
fn request(stream: &mut TcpStream, count: usize) -> Vec<u8> {
    stream.write_all(format!("{count}\n").as_bytes()).unwrap();
    let mut payload = vec![0u8; count];
    stream.read_exact(&mut payload).unwrap();
    payload
}

/// The server must close without sending anything. A reset instead of a
/// clean end-of-stream is fine; it closed with bytes still unread.
fn assert_closed_without_payload(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    match stream.read(&mut buf) {
        Ok(0) => {}
        Ok(n) => panic!("unexpected payload: {:?}", &buf[..n]),
        Err(_) => {}
    }
}

/// The shared battery: every strategy must pass all of it.
fn exercise_wire(addr: SocketAddr) {
    // Exact round trip, then a clean goodbye the server answers with EOF.
    {
        let mut stream = TcpStream::connect(addr).unwrap();
        let payload = request(&mut stream, 100);
        assert!(payload.iter().all(|&b| b == b'L'));

        stream.shutdown(Shutdown::Write).unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }

    // Several requests over one connection.
    {
        let mut stream = TcpStream::connect(addr).unwrap();
        for _ in 0..3 {
            assert_eq!(request(&mut stream, 10), b"L".repeat(10));
        }
    }

    // Invalid requests close the connection without a payload.
    for bad in ["0\n", "-5\n", "1025\n", "nonsense\n"] {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(bad.as_bytes()).unwrap();
        assert_closed_without_payload(&mut stream);
    }

    // So does a line that never terminates within the bound.
    {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&[b'1'; 2000]).unwrap();
        assert_closed_without_payload(&mut stream);
    }

    // Half a request then goodbye: abrupt for this connection only.
    {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"12").unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        assert_closed_without_payload(&mut stream);
    }

    // Connecting and leaving without a word is a graceful close, and the
    // server is still there for the next connection.
    {
        let stream = TcpStream::connect(addr).unwrap();
        drop(stream);

        let mut stream = TcpStream::connect(addr).unwrap();
        assert_eq!(request(&mut stream, 1), b"L");
    }
}

#[test]
fn test_threaded_wire_behavior() {
    exercise_wire(spawn_threaded());
}

#[test]
fn test_polled_wire_behavior() {
    exercise_wire(spawn_polled());
}

#[test]
fn test_pooled_wire_behavior() {
    exercise_wire(spawn_pooled(4));
}

#[test]
fn test_pooled_drains_queued_accepts() {
    let server = PooledServer::bind(0, 4).unwrap();
    let addr = server.local_addr().unwrap();

    // Fill the backlog before the readiness loop starts; one listener
    // event must account for every queued connection.
    let mut queued = Vec::new();
    for _ in 0..8 {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"32\n").unwrap();
        queued.push(stream);
    }

    thread::spawn(move || server.run());

    for stream in &mut queued {
        let mut payload = [0u8; 32];
        stream.read_exact(&mut payload).unwrap();
        assert!(payload.iter().all(|&b| b == b'L'));
    }
}

#[test]
fn test_pooled_single_worker_serves_concurrent_clients() {
    let addr = spawn_pooled(1);

    // With one worker every hand-off exercises the backpressure path;
    // both clients finishing proves no delivery was dropped.
    let handles: Vec<_> = (0..2)
        .map(|_| {
            thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).unwrap();
                for _ in 0..5 {
                    assert_eq!(request(&mut stream, 100).len(), 100);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
