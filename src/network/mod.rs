//! Network Layer
//!
//! WebSocket server for the match. All game rules live in `game/`;
//! this layer only moves messages and decides when to tick.

pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{ClientMessage, PaddleView, ServerMessage, StateSnapshot};
pub use server::{GameServer, GameServerError, ServerConfig, SessionCommand};
pub use session::{JoinOutcome, MatchSession, SessionError, SessionRegistry};
