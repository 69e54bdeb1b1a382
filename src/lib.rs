//! Strictly Duel - two-player tic-tac-toe sessions over TCP
//!
//! Connections are paired in arrival order. Each pair shares one
//! [`GameSession`]; each connection is driven by its own
//! [`ParticipantHandler`] task.
//!
//! # Architecture
//!
//! - **Games**: board, positions and win/draw rules
//! - **Protocol**: the line-oriented message vocabulary
//! - **Session**: turn arbitration on a shared board
//! - **Handler**: per-connection read loop and writer
//! - **Matchmaker / Server**: accept loop and pairing
//! - **Client**: terminal client
//!
//! # Example
//!
//! ```no_run
//! use strictly_duel::{GameServer, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = GameServer::bind(&ServerConfig::default()).await?;
//! server.run().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod client;
mod config;
mod games;
mod handler;
mod matchmaker;
mod protocol;
mod server;
mod session;

// Crate-level exports - Game types (tic-tac-toe)
pub use games::tictactoe::{
    Board, LINES, Mark, OutOfRange, Position, Square, check_winner, is_draw, is_full,
};

// Crate-level exports - Wire protocol
pub use protocol::{
    ALL_CONNECTED, ClientCommand, OPPONENT_DISCONNECTED, ProtocolError, ServerMessage,
    WAITING_FOR_OPPONENT, YOUR_TURN,
};

// Crate-level exports - Sessions and handlers
pub use handler::{HandlerPhase, LoopExit, MAX_LINE_BYTES, ParticipantHandler, Seat};
pub use session::{GameSession, MoveError, OUTBOX_CAPACITY, Outbox, Outcome, SessionId};

// Crate-level exports - Server
pub use config::{ConfigError, DEFAULT_PORT, ServerConfig};
pub use matchmaker::{Lobby, Pairing};
pub use server::{GameServer, ServerError};

// Crate-level exports - Client
pub use client::{ClientAction, ClientView, play};
