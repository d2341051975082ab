//! Game Logic Module
//!
//! All match simulation code. No I/O, no clocks: the network layer
//! decides when to call [`tick::tick`].
//!
//! ## Module Structure
//!
//! - `state`: Match state, paddles, ball, bounds, score
//! - `geometry`: Collision, rebound and wall/exit tests
//! - `tick`: Authoritative round state machine
//! - `events`: Game events for logging and tests

pub mod events;
pub mod geometry;
pub mod state;
pub mod tick;

// Re-export key types
pub use events::{GameEvent, GameEventData};
pub use state::{
    Ball, CanvasBounds, MatchConfig, MatchError, MatchState, Paddle, RoundPhase, Score, SessionId,
    Side,
};
pub use tick::{tick, TickResult};
