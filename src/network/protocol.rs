//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is a JSON text frame, internally tagged by `"type"`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::state::{Ball, CanvasBounds, MatchState, Score, Side};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Client's viewport size. Folded into the shared bounds.
    CanvasSize {
        /// Viewport width.
        width: f64,
        /// Viewport height.
        height: f64,
    },

    /// Request a paddle slot.
    NewPlayer,

    /// Desired top edge of the sender's paddle.
    UpdatePosition {
        /// Paddle y.
        y: f64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Sent once after the socket is accepted.
    #[serde(rename_all = "camelCase")]
    Welcome {
        /// Id the client's paddle is keyed by in snapshots.
        session_id: String,
        /// Server version.
        version: String,
    },

    /// Full match snapshot (every broadcast tick).
    State(StateSnapshot),

    /// Server is shutting down.
    Shutdown {
        /// Why.
        reason: String,
    },
}

/// Paddle as seen by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddleView {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Which slot the paddle is in.
    pub side: Side,
}

/// Complete match state as broadcast to every session. No deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Paddles keyed by owning session id.
    pub players: BTreeMap<String, PaddleView>,
    /// The ball.
    pub ball: Ball,
    /// Negotiated bounds.
    pub canvas: CanvasBounds,
    /// Countdown value shown to players.
    pub countdown: u32,
    /// `"player1"` / `"player2"` once the match is won.
    pub winner: Option<String>,
    /// Score.
    pub points: Score,
    /// Ball is live.
    pub is_running: bool,
}

impl StateSnapshot {
    /// Capture the current match state.
    pub fn from_state(state: &MatchState) -> Self {
        let players = Side::ALL
            .iter()
            .filter_map(|&side| state.paddle(side).map(|paddle| (side, paddle)))
            .map(|(side, paddle)| {
                (
                    paddle.owner.to_string(),
                    PaddleView {
                        x: paddle.x,
                        y: paddle.y,
                        width: paddle.width,
                        height: paddle.height,
                        side,
                    },
                )
            })
            .collect();

        Self {
            players,
            ball: state.ball.clone(),
            canvas: state.bounds,
            countdown: state.countdown(),
            winner: state.phase.winner().map(|side| side.player_label().to_string()),
            points: state.score,
            is_running: state.phase.is_running(),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{RoundPhase, SessionId};
    use serde_json::{json, Value};

    #[test]
    fn test_parse_client_messages() {
        let msg = ClientMessage::from_json(r#"{"type":"canvasSize","width":800,"height":600}"#)
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::CanvasSize {
                width: 800.0,
                height: 600.0
            }
        );

        let msg = ClientMessage::from_json(r#"{"type":"newPlayer"}"#).unwrap();
        assert_eq!(msg, ClientMessage::NewPlayer);

        let msg = ClientMessage::from_json(r#"{"type":"updatePosition","y":212.5}"#).unwrap();
        assert_eq!(msg, ClientMessage::UpdatePosition { y: 212.5 });
    }

    #[test]
    fn test_malformed_client_messages_rejected() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"updatePosition"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"updatePosition","y":"up"}"#).is_err());
    }

    #[test]
    fn test_snapshot_wire_shape() {
        let mut state = MatchState::default();
        state.report_canvas_size(800.0, 600.0).unwrap();
        let left = SessionId(uuid::Uuid::from_u128(1));
        state.place_paddle(Side::Left, left).unwrap();

        let json = ServerMessage::State(StateSnapshot::from_state(&state))
            .to_json()
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "state");
        assert_eq!(value["canvas"], json!({"width": 800.0, "height": 600.0}));
        assert_eq!(value["countdown"], 4);
        assert_eq!(value["winner"], Value::Null);
        assert_eq!(value["points"], json!({"player1": 0, "player2": 0}));
        assert_eq!(value["isRunning"], false);
        assert_eq!(value["ball"]["x"], 390.0);
        assert_eq!(value["ball"]["radius"], 10.0);

        let paddle = &value["players"][left.to_string()];
        assert_eq!(paddle["x"], 10.0);
        assert_eq!(paddle["height"], 150.0);
        assert_eq!(paddle["side"], "left");
    }

    #[test]
    fn test_snapshot_winner_label() {
        let mut state = MatchState::default();
        state.phase = RoundPhase::Finished(Side::Right);
        state.score.player2 = 3;

        let snapshot = StateSnapshot::from_state(&state);
        assert_eq!(snapshot.winner.as_deref(), Some("player2"));
        assert_eq!(snapshot.countdown, 0);
        assert!(!snapshot.is_running);
    }

    #[test]
    fn test_welcome_uses_camel_case() {
        let msg = ServerMessage::Welcome {
            session_id: "abc".to_string(),
            version: "0.1.0".to_string(),
        };
        let json = msg.to_json().unwrap();
        assert!(json.contains(r#""type":"welcome""#));
        assert!(json.contains(r#""sessionId":"abc""#));
        assert_eq!(ServerMessage::from_json(&json).unwrap(), msg);
    }
}
