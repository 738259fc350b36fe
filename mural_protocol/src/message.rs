// Protocol messages for client-server communication.
//
// Two enums define the full protocol vocabulary:
// - `ClientMessage`: sent by canvas clients to the server.
// - `ServerMessage`: sent by the server to canvas clients.
//
// Sequencing contract: the first client message on a connection must be
// `Login`. The server answers with exactly one of `LoginOk` or `LoginError`;
// after `LoginOk` it sends exactly one `CanvasSnapshot` before any
// `TilePlaced` can reach that connection. From then on the client sends any
// number of `PlaceTile`s and must accept `TilePlaced` or `Fatal` at any
// time. Anything else — a second `Login`, a client-originated server
// message, an unparseable frame — is a protocol violation answered with
// `Fatal` and disconnection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, Tile};

/// Messages sent by a client to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Claim a display name (handshake; must be the first message).
    Login { username: String },
    /// Request to overwrite one cell with this tile.
    PlaceTile { tile: Tile },
}

/// Messages sent by the server to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Login accepted; echoes the accepted username.
    LoginOk { username: String },
    /// Login rejected. The connection is closed after this.
    LoginError { reason: AdmissionError },
    /// The full board as of the moment this session was admitted.
    CanvasSnapshot { board: Board },
    /// An accepted placement, broadcast to every connected session
    /// (including the placer's own).
    TilePlaced { tile: Tile },
    /// Unrecoverable protocol violation or server shutdown. The connection
    /// is closed after this.
    Fatal { reason: String },
}

impl ClientMessage {
    /// Wire-facing name of this message kind, used in violation reports.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Login { .. } => "LOGIN",
            ClientMessage::PlaceTile { .. } => "PLACE_TILE",
        }
    }
}

/// Why a login was turned away. Recoverable from the client's side: retry
/// with a different name, or later. Display strings are client-facing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum AdmissionError {
    #[error("Username taken")]
    UsernameTaken,
    #[error("Too many connections from your IP")]
    TooManyConnectionsFromHost,
    #[error("Server full")]
    ServerFull,
}
