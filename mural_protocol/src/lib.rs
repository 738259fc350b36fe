// mural_protocol — wire protocol for the Mural collaborative canvas.
//
// This crate defines the message types, framing, and the board data model
// shared by the canvas server (`mural_server`) and any client speaking the
// protocol over TCP. It has no dependency on the server crate and no async
// runtime.
//
// Module overview:
// - `board.rs`:    The canvas data model — `Tile`, `Board`, the color
//                  palette constants. Travels inside `CanvasSnapshot`.
// - `message.rs`:  Client-to-server and server-to-client message enums,
//                  plus the typed login-rejection reasons.
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then JSON payload.
//
// Design decisions:
// - **JSON serialization.** Human-readable on the wire and cheap to evolve.
//   The snapshot is the only large message and boards are small.
// - **Blocking `std::io`.** The server is thread-per-connection with
//   blocking reads, so the framing works on plain `Read`/`Write` and
//   buffered wrappers alike.
// - **Tiles carried whole.** A placement request and its broadcast both
//   carry the full `Tile`, so clients apply broadcasts without any extra
//   lookup and a snapshot cell and a broadcast are the same shape.

pub mod board;
pub mod framing;
pub mod message;

pub use board::{Board, ColorIndex, DEFAULT_COLOR, PALETTE_SIZE, Tile};
pub use framing::{MAX_FRAME_LEN, read_frame, write_frame};
pub use message::{AdmissionError, ClientMessage, ServerMessage};

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn roundtrip_client(msg: &ClientMessage) {
        let json = serde_json::to_vec(msg).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &json).unwrap();

        let mut cursor = Cursor::new(&wire);
        let recovered_json = read_frame(&mut cursor).unwrap();
        let recovered: ClientMessage = serde_json::from_slice(&recovered_json).unwrap();
        assert_eq!(&recovered, msg);
    }

    fn roundtrip_server(msg: &ServerMessage) {
        let json = serde_json::to_vec(msg).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &json).unwrap();

        let mut cursor = Cursor::new(&wire);
        let recovered_json = read_frame(&mut cursor).unwrap();
        let recovered: ServerMessage = serde_json::from_slice(&recovered_json).unwrap();
        assert_eq!(&recovered, msg);
    }

    #[test]
    fn roundtrip_login_and_place() {
        roundtrip_client(&ClientMessage::Login {
            username: "alice".into(),
        });
        roundtrip_client(&ClientMessage::PlaceTile {
            tile: Tile {
                row: 3,
                col: 7,
                owner: "alice".into(),
                color: ColorIndex(4),
                placed_at_ms: 1_700_000_000_000,
            },
        });
    }

    #[test]
    fn roundtrip_snapshot_with_placed_tile() {
        let mut board = Board::new(3);
        board.set_tile(Tile {
            row: 1,
            col: 1,
            owner: "alice".into(),
            color: ColorIndex(4),
            placed_at_ms: 12345,
        });
        roundtrip_server(&ServerMessage::CanvasSnapshot { board });
    }

    #[test]
    fn roundtrip_login_replies() {
        roundtrip_server(&ServerMessage::LoginOk {
            username: "alice".into(),
        });
        for reason in [
            AdmissionError::UsernameTaken,
            AdmissionError::TooManyConnectionsFromHost,
            AdmissionError::ServerFull,
        ] {
            roundtrip_server(&ServerMessage::LoginError { reason });
        }
    }

    #[test]
    fn roundtrip_fatal() {
        roundtrip_server(&ServerMessage::Fatal {
            reason: "Bad request received: LOGIN. Terminating connection.".into(),
        });
    }

    #[test]
    fn admission_error_display_is_client_facing() {
        // These strings are shown verbatim by clients; keep them stable.
        assert_eq!(AdmissionError::UsernameTaken.to_string(), "Username taken");
        assert_eq!(
            AdmissionError::TooManyConnectionsFromHost.to_string(),
            "Too many connections from your IP"
        );
        assert_eq!(AdmissionError::ServerFull.to_string(), "Server full");
    }
}
