// Blocking TCP client for the canvas protocol.
//
// Architecture:
// - `connect()` performs TCP connect + the Login handshake on the calling
//   thread, then spawns a background reader thread.
// - The reader thread calls `read_frame()` in a loop, deserializes
//   `ServerMessage`, and pushes into an `mpsc` channel.
// - The caller holds a `BufWriter<TcpStream>` for sending and drains the
//   inbox with `poll()` (non-blocking) or `recv_timeout()`.
//
// This lives in the server crate rather than a client crate because it has
// zero dependencies beyond protocol framing + std TCP + mpsc, which makes
// it available to integration tests (and any headless embedding) without
// dragging in a UI.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use mural_protocol::board::{Board, ColorIndex, Tile};
use mural_protocol::framing::{read_frame, write_frame};
use mural_protocol::message::{AdmissionError, ClientMessage, ServerMessage};
use thiserror::Error;

/// Why `Client::connect` failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The server answered `LoginError`: recoverable, retry with a
    /// different name or later.
    #[error("login rejected: {0}")]
    Rejected(AdmissionError),
    /// The server answered `Fatal` during the handshake.
    #[error("fatal from server: {0}")]
    Fatal(String),
    /// The server broke the handshake sequence.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A connected canvas client. Dropping it closes the connection.
pub struct Client {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
    username: String,
}

impl Client {
    /// Connect, log in as `username`, and receive the initial snapshot.
    /// Spawns the background reader thread on success.
    pub fn connect(addr: &str, username: &str) -> Result<(Self, Board), ConnectError> {
        let stream = TcpStream::connect(addr)?;

        // Bound the handshake; cleared before the long-lived reader loop.
        stream.set_read_timeout(Some(Duration::from_secs(5))).ok();

        let reader_stream = stream.try_clone()?;
        let mut writer = BufWriter::new(stream);
        let mut reader = BufReader::new(reader_stream);

        send_msg(
            &mut writer,
            &ClientMessage::Login {
                username: username.into(),
            },
        )?;

        match recv_msg(&mut reader)? {
            ServerMessage::LoginOk { .. } => {}
            ServerMessage::LoginError { reason } => return Err(ConnectError::Rejected(reason)),
            ServerMessage::Fatal { reason } => return Err(ConnectError::Fatal(reason)),
            other => {
                return Err(ConnectError::Protocol(format!(
                    "expected LoginOk, got {other:?}"
                )));
            }
        }
        let board = match recv_msg(&mut reader)? {
            ServerMessage::CanvasSnapshot { board } => board,
            other => {
                return Err(ConnectError::Protocol(format!(
                    "expected CanvasSnapshot, got {other:?}"
                )));
            }
        };

        reader.get_ref().set_read_timeout(None).ok();

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || reader_loop(reader, tx));

        Ok((
            Self {
                writer,
                inbox: rx,
                _reader_thread: Some(reader_thread),
                username: username.to_string(),
            },
            board,
        ))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Request to claim `(row, col)` with `color`, stamped with the current
    /// wall-clock time and this client's username.
    pub fn place(&mut self, row: u16, col: u16, color: ColorIndex) -> std::io::Result<()> {
        let tile = Tile {
            row,
            col,
            owner: self.username.clone(),
            color,
            placed_at_ms: now_ms(),
        };
        self.send(&ClientMessage::PlaceTile { tile })
    }

    /// Send an arbitrary client message. Lets tests exercise out-of-sequence
    /// traffic (a second Login, an invalid tile) through a real connection.
    pub fn send(&mut self, msg: &ClientMessage) -> std::io::Result<()> {
        send_msg(&mut self.writer, msg)
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Wait up to `timeout` for the next server message. `None` means the
    /// timeout elapsed or the connection is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ServerMessage> {
        self.inbox.recv_timeout(timeout).ok()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Shut down the socket itself, not just this clone of it: the
        // reader thread holds another clone blocked in a read, so dropping
        // the writer alone would leave the connection open on both sides.
        // The shutdown gives the server its EOF and unblocks the reader.
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn send_msg(writer: &mut BufWriter<TcpStream>, msg: &ClientMessage) -> std::io::Result<()> {
    let json = serde_json::to_vec(msg).map_err(std::io::Error::other)?;
    write_frame(writer, &json)
}

fn recv_msg(reader: &mut BufReader<TcpStream>) -> Result<ServerMessage, ConnectError> {
    let bytes = read_frame(reader)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ConnectError::Protocol(format!("bad server frame: {e}")))
}

/// Reader thread: read framed messages in a loop, push to the channel.
/// Exits on EOF, transport error, malformed frame, or a dropped receiver.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: mpsc::Sender<ServerMessage>) {
    while let Ok(bytes) = read_frame(&mut reader) {
        match serde_json::from_slice::<ServerMessage>(&bytes) {
            Ok(msg) => {
                if tx.send(msg).is_err() {
                    break; // Client dropped the receiver.
                }
            }
            Err(_) => break,
        }
    }
}
