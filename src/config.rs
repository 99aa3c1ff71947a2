//! Command-line configuration for the byteswarm binaries.
//!
//! Each binary carries its own flag set. Parsing is deliberately lenient:
//! an unrecognized or malformed flag prints clap's usage text to standard
//! error and the process carries on with default settings instead of
//! aborting. `--help` and `--version` exit normally.

use clap::error::ErrorKind;
use clap::Parser;

/// Port the servers listen on and the load generator targets by default.
pub const DEFAULT_PORT: u16 = 8989;

/// Worker threads in the pooled server's pool by default.
pub const DEFAULT_WORKERS: usize = 64;

/// Flags for the threaded and polled servers.
#[derive(Parser, Debug)]
#[command(name = "byteswarm-server")]
#[command(version = "0.1.0")]
#[command(about = "A byte-serving TCP benchmark server", long_about = None)]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

/// Flags for the pooled server.
#[derive(Parser, Debug)]
#[command(name = "pooled-server")]
#[command(version = "0.1.0")]
#[command(about = "A byte-serving TCP server with a pooled event loop", long_about = None)]
pub struct PooledArgs {
    /// Port to listen on
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Worker threads servicing connections (0 = one per CPU core)
    #[arg(short = 't', long, default_value_t = DEFAULT_WORKERS)]
    pub threads: usize,
}

/// Flags for the load generator.
#[derive(Parser, Debug)]
#[command(name = "loadgen")]
#[command(version = "0.1.0")]
#[command(about = "Multithreaded load generator for the byteswarm servers", long_about = None)]
pub struct LoadgenArgs {
    /// Server host to connect to
    #[arg(short = 'i', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bytes requested per round trip
    #[arg(short = 'r', long, default_value_t = 1024)]
    pub request: usize,

    /// Connections opened by each worker thread
    #[arg(short = 'n', long, default_value_t = 10)]
    pub conns: usize,

    /// Request rounds driven over every connection
    #[arg(short = 'm', long, default_value_t = 100)]
    pub rounds: u64,

    /// Seconds to pause between rounds
    #[arg(short = 'w', long, default_value_t = 0)]
    pub pause: u64,

    /// Load worker threads
    #[arg(short = 't', long, default_value_t = 8)]
    pub workers: usize,
}

/// Parse the process arguments, falling back to defaults on bad flags.
///
/// The usage/error text still goes to stderr so the mistake is visible.
pub fn parse_or_default<A: Parser>() -> A {
    match A::try_parse() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("{err}");
            A::parse_from(std::env::args_os().take(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let args = ServerArgs::parse_from(["threaded-server"]);
        assert_eq!(args.port, DEFAULT_PORT);
    }

    #[test]
    fn test_server_port_flag() {
        let args = ServerArgs::parse_from(["threaded-server", "-p", "9000"]);
        assert_eq!(args.port, 9000);
    }

    #[test]
    fn test_pooled_defaults() {
        let args = PooledArgs::parse_from(["pooled-server"]);
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.threads, DEFAULT_WORKERS);
    }

    #[test]
    fn test_pooled_thread_flag() {
        let args = PooledArgs::parse_from(["pooled-server", "-p", "9000", "-t", "4"]);
        assert_eq!(args.port, 9000);
        assert_eq!(args.threads, 4);
    }

    #[test]
    fn test_loadgen_defaults() {
        let args = LoadgenArgs::parse_from(["loadgen"]);
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.request, 1024);
        assert_eq!(args.conns, 10);
        assert_eq!(args.rounds, 100);
        assert_eq!(args.pause, 0);
        assert_eq!(args.workers, 8);
    }

    #[test]
    fn test_loadgen_flags() {
        let args = LoadgenArgs::parse_from([
            "loadgen", "-i", "10.0.0.2", "-p", "4000", "-r", "512", "-n", "2", "-m", "5", "-w",
            "1", "-t", "3",
        ]);
        assert_eq!(args.host, "10.0.0.2");
        assert_eq!(args.port, 4000);
        assert_eq!(args.request, 512);
        assert_eq!(args.conns, 2);
        assert_eq!(args.rounds, 5);
        assert_eq!(args.pause, 1);
        assert_eq!(args.workers, 3);
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        assert!(ServerArgs::try_parse_from(["threaded-server", "--bogus"]).is_err());
        assert!(PooledArgs::try_parse_from(["pooled-server", "-z"]).is_err());
    }
}
