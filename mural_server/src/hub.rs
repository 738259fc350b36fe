// The hub: single shared-state owner for the canvas server.
//
// `Hub` holds the username registry, per-host connection counts, and the
// authoritative board behind one `Mutex`. Registry mutation, board mutation,
// and broadcast enumeration all happen inside that one critical section.
// This is the core correctness invariant of the whole server: because login,
// logout, and placement share a single exclusion domain, no session can
// observe a board state between a placement and its broadcast, and a joining
// session's snapshot sits at an exact point in the global broadcast order —
// it will see `TilePlaced` for every placement accepted after its login and
// none of the placements already folded into its snapshot.
//
// Sinks are the write halves of client TCP streams, wrapped in `BufWriter`.
// A write failure on one sink is swallowed and does not abort delivery to
// the rest — that client's own reader thread will hit the broken pipe and
// log itself out.

use std::collections::HashMap;
use std::io::{self, BufWriter};
use std::net::{IpAddr, TcpStream};
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use mural_protocol::board::{Board, Tile};
use mural_protocol::framing::write_frame;
use mural_protocol::message::{AdmissionError, ServerMessage};

/// Maximum simultaneous connections from one host address.
pub const MAX_CONNECTIONS_PER_HOST: u32 = 10;

/// Maximum simultaneous connections server-wide.
pub const MAX_TOTAL_CONNECTIONS: u32 = 100;

/// The shared-state owner. Cheap to share via `Arc`; all methods take
/// `&self` and serialize through the internal lock.
#[derive(Debug)]
pub struct Hub {
    state: Mutex<HubState>,
}

#[derive(Debug)]
struct HubState {
    board: Board,
    /// Registry of live sessions: username -> output sink. Entries are
    /// created by `login` and removed by `logout`/`kick`, nowhere else.
    users: HashMap<String, BufWriter<TcpStream>>,
    connections: HashMap<IpAddr, u32>,
    total_connections: u32,
    max_total_connections: u32,
}

impl Hub {
    pub fn new(dim: u16) -> Self {
        Self::with_connection_limit(dim, MAX_TOTAL_CONNECTIONS)
    }

    /// Like `new` with a lowered total-connection cap. Lets tests exercise
    /// the server-full path without opening a hundred sockets.
    pub fn with_connection_limit(dim: u16, max_total_connections: u32) -> Self {
        Self {
            state: Mutex::new(HubState {
                board: Board::new(dim),
                users: HashMap::new(),
                connections: HashMap::new(),
                total_connections: 0,
                max_total_connections,
            }),
        }
    }

    /// Admit a session. On success, writes `LoginOk` and the board snapshot
    /// to the stream *while still holding the lock* — that pins the snapshot
    /// to this session's exact join point in the broadcast order — and
    /// registers the write half as the session's sink. On rejection, writes
    /// `LoginError` and drops the stream; nothing is registered.
    pub fn login(
        &self,
        username: &str,
        host: IpAddr,
        stream: TcpStream,
    ) -> Result<(), AdmissionError> {
        let mut state = self.state();
        let mut sink = BufWriter::new(stream);

        if let Err(reason) = state.admit(username, host) {
            let _ = send_message(&mut sink, &ServerMessage::LoginError { reason });
            return Err(reason);
        }

        let ok = ServerMessage::LoginOk {
            username: username.to_string(),
        };
        let snapshot = ServerMessage::CanvasSnapshot {
            board: state.board.snapshot(),
        };
        if send_message(&mut sink, &ok)
            .and_then(|()| send_message(&mut sink, &snapshot))
            .is_err()
        {
            // The connection is already dead. Register anyway — the
            // session's read loop will notice and log out normally.
            debug!("login reply to {username:?} failed, connection already gone");
        }

        state.users.insert(username.to_string(), sink);
        *state.connections.entry(host).or_insert(0) += 1;
        state.total_connections += 1;
        info!("{username} has joined the server [{host}]");
        Ok(())
    }

    /// Unregister a session. No-op if the username is already gone, so the
    /// disconnect path may race a kick without harm.
    pub fn logout(&self, username: &str, host: IpAddr) {
        let mut state = self.state();
        if state.remove_user(username, host) {
            info!("{username} has left the server");
        }
    }

    /// Apply one placement and fan it out. Returns false without touching
    /// any state if the tile is invalid — a conformant client never sends
    /// one, so the caller treats that as a protocol violation.
    pub fn place_tile(&self, username: &str, tile: Tile) -> bool {
        let mut state = self.state();
        debug!(
            "{username} requested ({}, {}) -> color {}",
            tile.row, tile.col, tile.color.0
        );
        if !state.board.is_valid(&tile) {
            return false;
        }
        state.board.set_tile(tile.clone());
        state.broadcast(&ServerMessage::TilePlaced { tile });
        true
    }

    /// Send `Fatal` to the named session's own sink and unregister it, in
    /// one critical section. Used for post-login protocol violations, where
    /// the session's write half lives in the registry.
    pub fn kick(&self, username: &str, host: IpAddr, reason: &str) {
        let mut state = self.state();
        warn!("terminating {username}: {reason}");
        if let Some(sink) = state.users.get_mut(username) {
            let fatal = ServerMessage::Fatal {
                reason: reason.to_string(),
            };
            let _ = send_message(sink, &fatal);
        }
        state.remove_user(username, host);
    }

    /// Best-effort `Fatal` to every registered sink. Does not wait for
    /// anything; the process is about to exit.
    pub fn shutdown(&self, reason: &str) {
        let mut state = self.state();
        warn!("shutting down: {reason}");
        state.broadcast(&ServerMessage::Fatal {
            reason: reason.to_string(),
        });
    }

    /// A copy of the board as of now.
    pub fn snapshot(&self) -> Board {
        self.state().board.snapshot()
    }

    /// Number of registered sessions.
    pub fn user_count(&self) -> usize {
        self.state().users.len()
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        // A panic while holding the lock leaves plain data in a consistent
        // state (every mutation is complete before any send), so poisoning
        // is recoverable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HubState {
    /// The admission checks, in order: username uniqueness, then the
    /// per-host cap, then the total cap.
    fn admit(&self, username: &str, host: IpAddr) -> Result<(), AdmissionError> {
        if self.users.contains_key(username) {
            warn!("rejected {username:?} [{host}]: username taken");
            return Err(AdmissionError::UsernameTaken);
        }
        if self.connections.get(&host).copied().unwrap_or(0) >= MAX_CONNECTIONS_PER_HOST {
            warn!("rejected {username:?} [{host}]: host is at max connections");
            return Err(AdmissionError::TooManyConnectionsFromHost);
        }
        if self.total_connections >= self.max_total_connections {
            warn!("rejected {username:?} [{host}]: server full");
            return Err(AdmissionError::ServerFull);
        }
        Ok(())
    }

    /// Drop the registry entry and host count. Returns whether the
    /// username was actually registered.
    fn remove_user(&mut self, username: &str, host: IpAddr) -> bool {
        if self.users.remove(username).is_none() {
            return false;
        }
        if let Some(count) = self.connections.get_mut(&host) {
            *count -= 1;
            if *count == 0 {
                self.connections.remove(&host);
            }
        }
        self.total_connections -= 1;
        true
    }

    /// Push a message to every registered sink. Per-sink failures are
    /// swallowed; the owning session discovers them through its own reads.
    fn broadcast(&mut self, msg: &ServerMessage) {
        for (username, sink) in &mut self.users {
            if send_message(sink, msg).is_err() {
                debug!("broadcast to {username} failed, leaving cleanup to its session");
            }
        }
    }
}

/// Serialize a `ServerMessage` and write it as one frame.
pub(crate) fn send_message(
    sink: &mut BufWriter<TcpStream>,
    msg: &ServerMessage,
) -> io::Result<()> {
    let json = serde_json::to_vec(msg).map_err(io::Error::other)?;
    write_frame(sink, &json)
}
