//! The multithreaded load generator behind `loadgen`.
//!
//! Worker threads hammer a server over the wire protocol while a collector
//! thread gathers their per-worker totals into a stats file. Totals travel
//! as formatted text lines over a socket pair, so the collector works the
//! same whether a worker finished cleanly or bailed on an I/O error.

use crate::config::LoadgenArgs;
use crate::net::{self, LineRead};
use std::fs::File;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where the collector appends one stats line per worker.
pub const STATS_FILE: &str = "clientData.txt";

// Stats lines are three labeled u64s; this is generous.
const STATS_LINE_MAX: usize = 256;

/// What one worker accomplished over its whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTotals {
    /// Round trips completed.
    pub requests: u64,
    /// Summed round-trip latency, microseconds.
    pub micros: u64,
    /// Response bytes received.
    pub bytes: u64,
}

/// Render totals as the stats file line, terminator included.
pub fn format_stats(totals: &WorkerTotals) -> String {
    format!(
        "Requests: {}, Request Time: {}, Data Received: {}\n",
        totals.requests, totals.micros, totals.bytes
    )
}

/// One worker's run: open `conns` connections, then drive `rounds` rounds
/// of one request per connection, timing every round trip.
///
/// Any connect/read/write failure ends the run early; the totals
/// accumulated up to that point still stand.
pub fn drive_load(
    target: &str,
    request: usize,
    conns: usize,
    rounds: u64,
    pause: u64,
) -> WorkerTotals {
    let mut totals = WorkerTotals::default();
    if let Err(e) = run_rounds(target, request, conns, rounds, pause, &mut totals) {
        warn!(addr = target, error = %e, "Load run ended early");
    }
    totals
}

fn run_rounds(
    target: &str,
    request: usize,
    conns: usize,
    rounds: u64,
    pause: u64,
    totals: &mut WorkerTotals,
) -> io::Result<()> {
    let mut sockets = Vec::with_capacity(conns);
    for _ in 0..conns {
        sockets.push(TcpStream::connect(target)?);
    }

    let line = format!("{request}\n");
    let mut payload = vec![0u8; request];

    for round in 0..rounds {
        for stream in &mut sockets {
            let started = Instant::now();
            stream.write_all(line.as_bytes())?;
            stream.read_exact(&mut payload)?;
            totals.micros += started.elapsed().as_micros() as u64;
            totals.requests += 1;
            totals.bytes += request as u64;
        }
        if pause > 0 && round + 1 < rounds {
            thread::sleep(Duration::from_secs(pause));
        }
    }

    Ok(())
}

/// Gather one stats line per worker into `sink`.
///
/// Stops early if the reporting channel closes first, so a crashed worker
/// cannot wedge the run.
fn collect<W: Write>(mut reports: UnixStream, sink: &mut W, workers: usize) {
    for _ in 0..workers {
        match net::read_line(&mut reports, STATS_LINE_MAX) {
            Ok(LineRead::Line(line)) => {
                if let Err(e) = sink.write_all(&line).and_then(|_| sink.write_all(b"\n")) {
                    warn!(error = %e, "Stats write failed");
                    return;
                }
            }
            Ok(_) => return,
            Err(e) => {
                warn!(error = %e, "Stats channel failed");
                return;
            }
        }
    }
}

/// Run the whole load session: spawn the collector and the workers, wait
/// for every report, leave the totals in [`STATS_FILE`].
pub fn run(args: LoadgenArgs) -> io::Result<()> {
    let target = format!("{}:{}", args.host, args.port);
    let LoadgenArgs {
        request,
        conns,
        rounds,
        pause,
        workers,
        ..
    } = args;

    info!(addr = %target, workers, conns, rounds, request, "Load run starting");

    let mut stats = File::create(STATS_FILE)?;
    let (reporter, reports) = UnixStream::pair()?;

    let collector = thread::Builder::new()
        .name("collector".into())
        .spawn(move || collect(reports, &mut stats, workers))?;

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let target = target.clone();
        let mut reporter = reporter.try_clone()?;

        let handle = thread::Builder::new()
            .name(format!("load-{worker_id}"))
            .spawn(move || {
                let totals = drive_load(&target, request, conns, rounds, pause);
                debug!(worker = worker_id, requests = totals.requests, "Worker done");
                if let Err(e) = reporter.write_all(format_stats(&totals).as_bytes()) {
                    warn!(worker = worker_id, error = %e, "Stats report failed");
                }
            })?;
        handles.push(handle);
    }
    // The workers hold the only remaining write ends; once they finish the
    // collector sees end-of-stream even if a report went missing.
    drop(reporter);

    for handle in handles {
        let _ = handle.join();
    }
    let _ = collector.join();

    info!(file = STATS_FILE, "Load run complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::threaded::ThreadedServer;

    #[test]
    fn test_stats_line_format() {
        let totals = WorkerTotals {
            requests: 800,
            micros: 123456,
            bytes: 819200,
        };
        assert_eq!(
            format_stats(&totals),
            "Requests: 800, Request Time: 123456, Data Received: 819200\n"
        );
    }

    #[test]
    fn test_drive_load_round_trips() {
        let server = ThreadedServer::bind(0).unwrap();
        let addr = server.local_addr().unwrap();
        thread::spawn(move || server.run());

        let totals = drive_load(&addr.to_string(), 64, 2, 3, 0);
        assert_eq!(totals.requests, 6);
        assert_eq!(totals.bytes, 6 * 64);
    }

    #[test]
    fn test_drive_load_reports_zero_on_refused_connect() {
        // Bind then drop to find a loopback port nobody is listening on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let totals = drive_load(&format!("127.0.0.1:{port}"), 64, 1, 1, 0);
        assert_eq!(totals, WorkerTotals::default());
    }

    #[test]
    fn test_collector_gathers_one_line_per_worker() {
        let (mut first, reports) = UnixStream::pair().unwrap();
        let mut second = first.try_clone().unwrap();

        first
            .write_all(b"Requests: 1, Request Time: 2, Data Received: 3\n")
            .unwrap();
        second
            .write_all(b"Requests: 4, Request Time: 5, Data Received: 6\n")
            .unwrap();

        let mut sink = Vec::new();
        collect(reports, &mut sink, 2);

        let text = String::from_utf8(sink).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("Requests: 1,"));
        assert!(text.contains("Requests: 4,"));
    }
}
