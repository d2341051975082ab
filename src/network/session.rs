//! Match Session Management
//!
//! Owns the single match: the paddle slot registry, the authoritative
//! match state and the outbound channel of every connected client.
//! Only the match task touches a `MatchSession`; connection tasks talk to
//! it through commands (see `server`).

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace};

use crate::game::state::{MatchConfig, MatchError, MatchState, SessionId, Side};
use crate::game::tick::{tick, TickResult};
use crate::network::protocol::{ClientMessage, ServerMessage, StateSnapshot};

// =============================================================================
// SLOT REGISTRY
// =============================================================================

/// Maps sessions to the two paddle slots.
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    /// Slot occupants, indexed by `Side::index()`.
    slots: [Option<SessionId>; 2],
    /// Reverse lookup.
    lookup: BTreeMap<SessionId, Side>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the first free slot to `id`.
    pub fn join(&mut self, id: SessionId) -> Result<Side, SessionError> {
        if let Some(&side) = self.lookup.get(&id) {
            return Err(SessionError::AlreadyJoined(side));
        }

        let side = Side::ALL
            .into_iter()
            .find(|side| self.slots[side.index()].is_none())
            .ok_or(SessionError::MatchFull)?;

        self.slots[side.index()] = Some(id);
        self.lookup.insert(id, side);
        Ok(side)
    }

    /// Release `id`'s slot, if it holds one.
    pub fn leave(&mut self, id: &SessionId) -> Option<Side> {
        let side = self.lookup.remove(id)?;
        self.slots[side.index()] = None;
        Some(side)
    }

    /// Slot held by `id`.
    pub fn slot_of(&self, id: &SessionId) -> Option<Side> {
        self.lookup.get(id).copied()
    }

    /// Both slots held.
    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Number of held slots.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// No slot held.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Session errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// Both paddle slots are held.
    #[error("Match is full")]
    MatchFull,

    /// Session already holds a slot.
    #[error("Already joined on {0:?} side")]
    AlreadyJoined(Side),

    /// Session has no paddle to move.
    #[error("Session has no paddle")]
    NoPaddle,

    /// Message from a session that is not connected.
    #[error("Unknown session")]
    UnknownSession,

    /// Rejected by the match state.
    #[error(transparent)]
    Match(#[from] MatchError),
}

// =============================================================================
// MATCH SESSION
// =============================================================================

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Slot assigned.
    pub side: Side,
    /// This join filled the second slot and armed the simulation.
    pub armed: bool,
}

/// The match and everyone connected to it.
pub struct MatchSession {
    /// Authoritative match state.
    state: MatchState,
    /// Slot assignments.
    registry: SessionRegistry,
    /// Outbound queue per connected session.
    connections: BTreeMap<SessionId, mpsc::Sender<ServerMessage>>,
    /// Set once, when the second slot first fills.
    simulation_armed: bool,
}

impl MatchSession {
    /// Create a session with no connections.
    pub fn new(config: MatchConfig) -> Self {
        Self {
            state: MatchState::new(config),
            registry: SessionRegistry::new(),
            connections: BTreeMap::new(),
            simulation_armed: false,
        }
    }

    /// Register a connected client's outbound queue.
    pub fn connect(&mut self, id: SessionId, sender: mpsc::Sender<ServerMessage>) {
        self.connections.insert(id, sender);
    }

    /// Drop a client. Its paddle and slot are released immediately.
    pub fn disconnect(&mut self, id: &SessionId) -> Option<Side> {
        self.connections.remove(id);
        let side = self.registry.leave(id)?;
        self.state.remove_paddle(side);
        Some(side)
    }

    /// Give `id` a paddle in the first free slot.
    pub fn join(&mut self, id: SessionId) -> Result<JoinOutcome, SessionError> {
        let side = self.registry.join(id)?;

        if let Err(e) = self.state.place_paddle(side, id) {
            self.registry.leave(&id);
            return Err(e.into());
        }

        let armed = self.registry.is_full() && !self.simulation_armed;
        if armed {
            self.simulation_armed = true;
        }

        Ok(JoinOutcome { side, armed })
    }

    /// Store the desired top edge of `id`'s paddle.
    pub fn update_target(&mut self, id: &SessionId, y: f64) -> Result<(), SessionError> {
        let side = self.registry.slot_of(id).ok_or(SessionError::NoPaddle)?;
        self.state.set_paddle_target(side, y)?;
        Ok(())
    }

    /// Fold a viewport report into the shared bounds.
    pub fn report_canvas_size(&mut self, width: f64, height: f64) -> Result<bool, SessionError> {
        Ok(self.state.report_canvas_size(width, height)?)
    }

    /// Apply one inbound client message.
    pub fn apply(&mut self, id: SessionId, msg: ClientMessage) -> Result<(), SessionError> {
        if !self.connections.contains_key(&id) {
            return Err(SessionError::UnknownSession);
        }

        match msg {
            ClientMessage::CanvasSize { width, height } => {
                if self.report_canvas_size(width, height)? {
                    debug!(
                        "Bounds now {}x{} (report from {})",
                        self.state.bounds.width,
                        self.state.bounds.height,
                        id.short()
                    );
                }
            }
            ClientMessage::NewPlayer => {
                let outcome = self.join(id)?;
                info!(
                    "Session {} joined as {}",
                    id.short(),
                    outcome.side.player_label()
                );
                if outcome.armed {
                    info!("Both slots filled, simulation armed");
                }
            }
            ClientMessage::UpdatePosition { y } => {
                self.update_target(&id, y)?;
                trace!("Session {} target y={}", id.short(), y);
            }
        }

        Ok(())
    }

    /// Run one simulation tick. `None` until the simulation is armed.
    pub fn run_tick(&mut self) -> Option<TickResult> {
        if !self.simulation_armed {
            return None;
        }
        Some(tick(&mut self.state))
    }

    /// Snapshot of the current state.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::from_state(&self.state)
    }

    /// Queue `message` for every connection without waiting.
    ///
    /// A full queue drops the message for that client. Returns how many
    /// clients it was queued for.
    pub fn broadcast(&self, message: &ServerMessage) -> usize {
        let mut delivered = 0;
        for (id, sender) in &self.connections {
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    trace!("Outbound queue full for {}, dropping message", id.short());
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }

    /// Broadcast a state snapshot to everyone.
    pub fn broadcast_state(&self) -> usize {
        self.broadcast(&ServerMessage::State(self.snapshot()))
    }

    /// Match state.
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Slot registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Simulation has been armed.
    pub fn is_armed(&self) -> bool {
        self.simulation_armed
    }

    /// Connected clients (players and spectators).
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Clients holding a paddle.
    pub fn player_count(&self) -> usize {
        self.registry.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
