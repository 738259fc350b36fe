// CLI entry point for the Mural canvas server.
//
// Takes exactly two positional arguments — the listening port and the board
// dimension — and runs until the listener fails unrecoverably, at which
// point every connected session has already been sent a best-effort Fatal
// and the process exits non-zero. Operational logging goes to stderr via
// `env_logger` (timestamped; level via RUST_LOG, default info).
//
// Usage:
//   mural-server <port> <dim>

use std::process;

use mural_server::{MAX_DIM, ServerConfig, start_server};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = parse_args();
    let (handle, addr) = match start_server(config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start server: {e}");
            process::exit(1);
        }
    };
    println!("Mural server listening on {addr}");

    // The accept loop only exits on an unrecoverable listener error; by the
    // time join returns, the hub has broadcast Fatal to every session.
    handle.join();
    eprintln!("The server has hit an unrecoverable error. Please try to launch again.");
    process::exit(1);
}

/// Parse the two positional arguments into a `ServerConfig`. Uses plain
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> ServerConfig {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        print_usage();
        process::exit(1);
    }
    let port = args[1].parse().unwrap_or_else(|_| {
        eprintln!("invalid port: {}", args[1]);
        process::exit(1);
    });
    let dim: u16 = args[2].parse().unwrap_or_else(|_| {
        eprintln!("invalid board dimension: {}", args[2]);
        process::exit(1);
    });
    if dim == 0 || dim > MAX_DIM {
        eprintln!("board dimension must be between 1 and {MAX_DIM}");
        process::exit(1);
    }
    ServerConfig { port, dim }
}

fn print_usage() {
    eprintln!("Usage: mural-server <port> <dim>");
    eprintln!();
    eprintln!("  <port>   TCP port to listen on (0 lets the OS choose)");
    eprintln!("  <dim>    board dimension (1..=256); the canvas is dim x dim cells");
}
