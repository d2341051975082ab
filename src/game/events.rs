//! Game Events
//!
//! Events generated during simulation. The server logs them; tests use
//! them to observe transitions without diffing whole states.

use serde::{Deserialize, Serialize};

use crate::game::state::{Score, Side};

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// A countdown began.
    CountdownStarted {
        /// Starting value.
        from: u32,
    },

    /// The countdown ticked down one step.
    CountdownStep {
        /// Value after the step.
        remaining: u32,
    },

    /// Countdown reached zero; the ball is live.
    RallyStarted,

    /// Ball bounced off the top or bottom wall.
    WallBounce,

    /// Ball hit a paddle.
    PaddleHit {
        /// Paddle that was hit.
        side: Side,
        /// Rebound angle (radians).
        angle: f64,
        /// Ball speed after the hit.
        speed: f64,
    },

    /// Ball left the court.
    PointScored {
        /// Side credited with the point.
        scorer: Side,
        /// Score after the point.
        score: Score,
    },

    /// A side reached the winning score.
    MatchWon {
        /// Winning side.
        winner: Side,
        /// Final score.
        score: Score,
    },
}

/// A game event with its tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Create a countdown-started event.
    pub fn countdown_started(tick: u32, from: u32) -> Self {
        Self::new(tick, GameEventData::CountdownStarted { from })
    }

    /// Create a countdown-step event.
    pub fn countdown_step(tick: u32, remaining: u32) -> Self {
        Self::new(tick, GameEventData::CountdownStep { remaining })
    }

    /// Create a rally-started event.
    pub fn rally_started(tick: u32) -> Self {
        Self::new(tick, GameEventData::RallyStarted)
    }

    /// Create a paddle-hit event.
    pub fn paddle_hit(tick: u32, side: Side, angle: f64, speed: f64) -> Self {
        Self::new(tick, GameEventData::PaddleHit { side, angle, speed })
    }

    /// Create a point-scored event.
    pub fn point_scored(tick: u32, scorer: Side, score: Score) -> Self {
        Self::new(tick, GameEventData::PointScored { scorer, score })
    }

    /// Create a match-won event.
    pub fn match_won(tick: u32, winner: Side, score: Score) -> Self {
        Self::new(tick, GameEventData::MatchWon { winner, score })
    }

    /// Worth an info-level log line.
    pub fn is_notable(&self) -> bool {
        matches!(
            self.data,
            GameEventData::CountdownStarted { .. }
                | GameEventData::RallyStarted
                | GameEventData::PointScored { .. }
                | GameEventData::MatchWon { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notable_events() {
        let score = Score {
            player1: 1,
            player2: 0,
        };
        assert!(GameEvent::point_scored(10, Side::Left, score).is_notable());
        assert!(GameEvent::match_won(20, Side::Left, score).is_notable());
        assert!(GameEvent::rally_started(5).is_notable());
        assert!(!GameEvent::countdown_step(3, 2).is_notable());
        assert!(!GameEvent::new(4, GameEventData::WallBounce).is_notable());
        assert!(!GameEvent::paddle_hit(6, Side::Right, 0.1, 9.0).is_notable());
    }
}
