// Test-only canvas client for integration tests.
//
// Wraps the real `Client` (from `mural_server::client`) together with a
// local `Board` copy, providing a synchronous, test-friendly API for
// exercising the full pipeline: connect → login → snapshot → place →
// broadcast → identical boards everywhere.
//
// The only test-specific code here is the blocking wrappers around the
// client's inbox. All networking uses the same code paths as a real client.
//
// See `tests/` for the scenarios.

use std::net::SocketAddr;
use std::time::Duration;

use mural_protocol::board::{Board, ColorIndex, Tile};
use mural_protocol::message::ServerMessage;
use mural_server::client::{Client, ConnectError};

/// Default timeout for blocking receive operations.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test client holding the live connection and its view of the board.
pub struct TestCanvasClient {
    pub client: Client,
    pub board: Board,
}

impl TestCanvasClient {
    /// Connect and log in, panicking on rejection.
    pub fn connect(addr: SocketAddr, name: &str) -> Self {
        Self::try_connect(addr, name).expect("TestCanvasClient::connect failed")
    }

    /// Connect and log in, surfacing the typed rejection.
    pub fn try_connect(addr: SocketAddr, name: &str) -> Result<Self, ConnectError> {
        let (client, board) = Client::connect(&loopback(addr), name)?;
        Ok(Self { client, board })
    }

    /// Fire a placement request for `(row, col)` with `color`.
    pub fn place(&mut self, row: u16, col: u16, color: u8) {
        self.client
            .place(row, col, ColorIndex(color))
            .expect("place failed");
    }

    /// Block for the next server message.
    pub fn next_message(&self) -> ServerMessage {
        self.client
            .recv_timeout(RECV_TIMEOUT)
            .expect("timed out waiting for a server message")
    }

    /// Block for the next message, require it to be `TilePlaced`, fold it
    /// into the local board, and return the tile.
    pub fn next_placed(&mut self) -> Tile {
        match self.next_message() {
            ServerMessage::TilePlaced { tile } => {
                self.board.set_tile(tile.clone());
                tile
            }
            other => panic!("expected TilePlaced, got {other:?}"),
        }
    }

    /// Assert that nothing arrives within `window`. Used to show that a
    /// cooldown-dropped request produced no broadcast.
    pub fn assert_quiet(&self, window: Duration) {
        if let Some(msg) = self.client.recv_timeout(window) {
            panic!("expected silence, got {msg:?}");
        }
    }
}

/// The server binds 0.0.0.0; tests reach it over loopback.
pub fn loopback(addr: SocketAddr) -> String {
    format!("127.0.0.1:{}", addr.port())
}
