// Per-connection state machine.
//
// Every accepted connection runs `run_session` on its own thread: blocking
// framed reads on a cloned read half, with the write half surrendered to the
// hub at login. The session starts unauthenticated, becomes active after a
// successful `Login`, and closes on EOF, I/O error, or protocol violation.
// After login, the only way the session reaches its own client is through
// the hub (`kick`), since the sink lives in the hub's registry.
//
// The placement cooldown is a stored deadline compared against the clock on
// each request, not a spawned timer — sustained request floods cost nothing
// beyond the comparison. Within-cooldown requests are dropped silently on
// the wire and logged server-side.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use mural_protocol::framing::read_frame;
use mural_protocol::message::{ClientMessage, ServerMessage};

use crate::hub::{Hub, send_message};

/// Minimum interval between two accepted placements from one session.
pub const PLACE_COOLDOWN: Duration = Duration::from_millis(500);

/// Read timeout for the login handshake, so a connection that never says
/// anything can't hold a thread forever. Cleared once the session is active.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

enum ReadFailure {
    /// EOF or transport error: the peer is gone, close quietly.
    Stream,
    /// The frame arrived but is not a `ClientMessage`: protocol violation.
    Malformed,
}

/// Drive one client connection from accept to close.
pub fn run_session(stream: TcpStream, hub: Arc<Hub>) {
    let host = match stream.peer_addr() {
        Ok(addr) => addr.ip(),
        Err(_) => return,
    };
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok();

    let mut reader = match stream.try_clone() {
        Ok(clone) => BufReader::new(clone),
        Err(_) => return,
    };

    // Unauthenticated: the first frame must be Login.
    let username = match read_client_message(&mut reader) {
        Ok(ClientMessage::Login { username }) => username,
        Ok(other) => {
            debug!("[{host}] sent {} before logging in", other.kind());
            send_fatal(stream, &bad_request(other.kind()));
            return;
        }
        Err(ReadFailure::Malformed) => {
            send_fatal(stream, &bad_request("UNKNOWN"));
            return;
        }
        Err(ReadFailure::Stream) => return,
    };

    // The write half moves into the hub's registry here; on rejection the
    // hub has already sent LoginError and dropped it.
    if hub.login(&username, host, stream).is_err() {
        return;
    }
    reader.get_ref().set_read_timeout(None).ok();

    // Active: forward placements until EOF or a violation.
    let mut cooldown_until = Instant::now();
    loop {
        match read_client_message(&mut reader) {
            Ok(ClientMessage::PlaceTile { tile }) => {
                let now = Instant::now();
                if now < cooldown_until {
                    warn!("{username} sent a tile too quickly, ignoring it");
                    continue;
                }
                if hub.place_tile(&username, tile) {
                    cooldown_until = now + PLACE_COOLDOWN;
                } else {
                    // Conformant clients validate before sending; an
                    // invalid tile means a broken or hostile peer.
                    hub.kick(&username, host, &bad_request("PLACE_TILE"));
                    return;
                }
            }
            Ok(other) => {
                hub.kick(&username, host, &bad_request(other.kind()));
                return;
            }
            Err(ReadFailure::Malformed) => {
                hub.kick(&username, host, &bad_request("UNKNOWN"));
                return;
            }
            Err(ReadFailure::Stream) => {
                hub.logout(&username, host);
                return;
            }
        }
    }
}

fn read_client_message(reader: &mut BufReader<TcpStream>) -> Result<ClientMessage, ReadFailure> {
    let bytes = read_frame(reader).map_err(|_| ReadFailure::Stream)?;
    serde_json::from_slice(&bytes).map_err(|_| ReadFailure::Malformed)
}

/// Fatal for pre-login violations, where the session still owns the write
/// half itself. Best-effort; the connection is closing either way.
fn send_fatal(stream: TcpStream, reason: &str) {
    let mut sink = BufWriter::new(stream);
    let _ = send_message(
        &mut sink,
        &ServerMessage::Fatal {
            reason: reason.to_string(),
        },
    );
}

fn bad_request(kind: &str) -> String {
    format!("Bad request received: {kind}. Terminating connection.")
}
