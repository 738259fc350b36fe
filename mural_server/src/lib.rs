// mural_server — the Mural collaborative canvas server.
//
// Many clients connect over TCP, each repeatedly claims one cell of a shared
// grid with a color, and the server keeps one authoritative board that every
// connected client sees identically. The server is a single in-memory
// process: no persistence, a restart resets the board.
//
// Module overview:
// - `hub.rs`:      The shared-state owner — username registry, per-host
//                  connection quotas, the board, and broadcast fan-out, all
//                  behind one lock. The concurrency-critical core.
// - `session.rs`:  Per-connection state machine — login handshake, the
//                  blocking read loop, cooldown enforcement, violation
//                  handling. One thread per connection.
// - `server.rs`:   TCP listener and lifecycle — accepts connections on a
//                  background thread and spawns a session thread for each.
// - `client.rs`:   Blocking protocol client with a background reader thread.
//                  Zero server-state dependencies; used by the integration
//                  tests and by anything embedding a headless client.
//
// Dependencies: `mural_protocol` (shared message types, framing, board).
//
// The server can run standalone (`main.rs`, `mural-server <port> <dim>`) or
// be embedded via `start_server`.

pub mod client;
pub mod hub;
pub mod server;
pub mod session;

pub use server::{MAX_DIM, ServerConfig, ServerHandle, start_server};
