// TCP listener and server lifecycle.
//
// `start_server` binds the listener, builds the hub, and spawns the accept
// loop on a background thread. Each accepted connection gets its own session
// thread immediately — the accept loop never waits on any session's
// lifetime. The listener runs non-blocking with a short sleep so it can
// observe the shutdown flag.
//
// An accept-loop failure that isn't `WouldBlock` is unrecoverable: the hub
// broadcasts a best-effort `Fatal` to every connected session and the loop
// exits. `ServerHandle::join` is how the binary waits for that; embedders
// and tests use `ServerHandle::stop` for an orderly shutdown instead.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::hub::Hub;
use crate::session::run_session;

/// Largest accepted board dimension. A snapshot of a fully painted board
/// must fit in one frame (`MAX_FRAME_LEN`); 256 leaves headroom for long
/// owner names on every one of the 65536 cells.
pub const MAX_DIM: u16 = 256;

/// Startup parameters: the listening port and the board dimension. Both are
/// fixed for the server's lifetime; a restart resets the board.
pub struct ServerConfig {
    pub port: u16,
    pub dim: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 4444, dim: 32 }
    }
}

/// Handle returned by `start_server` to control the running server.
#[derive(Debug)]
pub struct ServerHandle {
    hub: Arc<Hub>,
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// The hub, for embedders that want to observe or drive it directly.
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Announce shutdown to every connected session, stop accepting, and
    /// wait for the accept thread to exit. Session threads are left to
    /// notice their closed streams on their own; no session ever blocks
    /// another from closing.
    pub fn stop(mut self) {
        self.hub
            .shutdown("Server is shutting down. Terminating all connections.");
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    /// Block until the accept loop exits. Since nothing but `stop` or an
    /// unrecoverable listener error ends the loop, a return from `join`
    /// without a prior `stop` means the server has failed.
    pub fn join(mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// Start the server on a background thread. Returns a handle for stopping
/// or waiting on it, plus the actual bound address (useful with port 0,
/// which lets the OS pick a free port for tests).
pub fn start_server(config: ServerConfig) -> io::Result<(ServerHandle, SocketAddr)> {
    if config.dim == 0 || config.dim > MAX_DIM {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("board dimension must be 1..={MAX_DIM}, got {}", config.dim),
        ));
    }
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;
    let addr = listener.local_addr()?;
    let hub = Arc::new(Hub::new(config.dim));
    let keep_running = Arc::new(AtomicBool::new(true));

    // Non-blocking so the accept loop can check keep_running periodically.
    listener.set_nonblocking(true)?;

    let accept_hub = hub.clone();
    let accept_keep_running = keep_running.clone();
    let thread = thread::spawn(move || {
        accept_loop(listener, accept_hub, accept_keep_running);
    });

    info!(
        "Server has started successfully. Accepting connections on port {}.",
        addr.port()
    );

    Ok((
        ServerHandle {
            hub,
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

fn accept_loop(listener: TcpListener, hub: Arc<Hub>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("accepted connection from {peer}");
                stream.set_nonblocking(false).ok();
                let session_hub = hub.clone();
                thread::spawn(move || {
                    run_session(stream, session_hub);
                });
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                error!("listener failed: {e}");
                hub.shutdown(
                    "The server has hit an unrecoverable error. Terminating all connections.",
                );
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_dimension_rejected() {
        let err = start_server(ServerConfig {
            port: 0,
            dim: MAX_DIM + 1,
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn zero_dimension_rejected() {
        let err = start_server(ServerConfig { port: 0, dim: 0 }).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn largest_dimension_accepted() {
        let (handle, _addr) = start_server(ServerConfig {
            port: 0,
            dim: MAX_DIM,
        })
        .unwrap();
        handle.stop();
    }
}
