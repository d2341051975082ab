//! # Pong Server
//!
//! Authoritative two-player pong over WebSocket.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PONG SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  game/           - Match rules (no I/O)                      │
//! │  ├── state.rs    - Paddles, ball, bounds, score, phase       │
//! │  ├── geometry.rs - Collision, rebound, walls, exits          │
//! │  ├── tick.rs     - Round state machine                       │
//! │  └── events.rs   - Events emitted by the tick                │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server and match task           │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Slot registry and match session           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//!
//! A single match task owns the match state. Connection tasks forward
//! parsed messages to it over a channel and receive snapshots back, so
//! the state is never shared and needs no locks.
//!
//! Given the same sequence of messages and ticks, `game/` produces the
//! same states; only `network/` looks at clocks.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod game;
pub mod network;

// Re-export commonly used types
pub use game::state::{MatchConfig, MatchState, RoundPhase, SessionId, Side};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;
