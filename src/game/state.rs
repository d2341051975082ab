//! Match State Definitions
//!
//! The authoritative record of one match: two paddle slots, the ball,
//! the negotiated canvas bounds, the score and the round phase.
//! Paddles are stored by slot so "first" and "second" player never
//! depend on map iteration order.

use std::f64::consts::FRAC_PI_4;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::events::GameEvent;

// =============================================================================
// RULE CONSTANTS
// =============================================================================

/// Countdown value a round starts from (seconds).
pub const COUNTDOWN_START: u32 = 4;

/// Points needed to win the match.
pub const POINTS_TO_WIN: u32 = 3;

/// Ball radius.
pub const BALL_RADIUS: f64 = 10.0;

/// Horizontal serve velocity.
pub const SERVE_VX: f64 = 5.0;

/// Vertical serve velocity.
pub const SERVE_VY: f64 = 5.0;

/// Ball speed at serve.
pub const SERVE_SPEED: f64 = 7.0;

/// Speed gained on every paddle hit.
pub const SPEED_INCREMENT: f64 = 1.0;

/// Paddle width.
pub const PADDLE_WIDTH: f64 = 10.0;

/// Paddle height.
pub const PADDLE_HEIGHT: f64 = 150.0;

/// X coordinate of the left paddle.
pub const LEFT_PADDLE_X: f64 = 10.0;

/// Distance of the right paddle's x from the right edge.
pub const RIGHT_PADDLE_INSET: f64 = 20.0;

/// Largest rebound angle off a paddle edge (radians).
pub const MAX_BOUNCE_ANGLE: f64 = FRAC_PI_4;

// =============================================================================
// MATCH CONFIG
// =============================================================================

/// Game rules for a match.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchConfig {
    /// Countdown value each round starts from.
    pub countdown_start: u32,
    /// Simulation ticks per countdown step (one second of ticks).
    pub countdown_step_ticks: u32,
    /// Points needed to win.
    pub points_to_win: u32,
    /// Ball radius.
    pub ball_radius: f64,
    /// Serve velocity (x).
    pub serve_vx: f64,
    /// Serve velocity (y).
    pub serve_vy: f64,
    /// Serve speed.
    pub serve_speed: f64,
    /// Speed gained per paddle hit.
    pub speed_increment: f64,
    /// Paddle width.
    pub paddle_width: f64,
    /// Paddle height.
    pub paddle_height: f64,
    /// Left paddle x.
    pub left_paddle_x: f64,
    /// Right paddle inset from the right edge.
    pub right_paddle_inset: f64,
    /// Maximum rebound angle (radians).
    pub max_bounce_angle: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            countdown_start: COUNTDOWN_START,
            countdown_step_ticks: crate::TICK_RATE,
            points_to_win: POINTS_TO_WIN,
            ball_radius: BALL_RADIUS,
            serve_vx: SERVE_VX,
            serve_vy: SERVE_VY,
            serve_speed: SERVE_SPEED,
            speed_increment: SPEED_INCREMENT,
            paddle_width: PADDLE_WIDTH,
            paddle_height: PADDLE_HEIGHT,
            left_paddle_x: LEFT_PADDLE_X,
            right_paddle_inset: RIGHT_PADDLE_INSET,
            max_bounce_angle: MAX_BOUNCE_ANGLE,
        }
    }
}

// =============================================================================
// SESSION ID
// =============================================================================

/// Identifier of one connected client (one WebSocket = one session).
///
/// Implements Ord so registries can keep it in a BTreeMap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Fresh random session id.
    pub fn new_v4() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// SIDE (PADDLE SLOT)
// =============================================================================

/// One of the two paddle slots. Player1 owns the left paddle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Slot 0, player1.
    Left = 0,
    /// Slot 1, player2.
    Right = 1,
}

impl Side {
    /// Both sides in slot order.
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// Slot index (0 or 1).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Horizontal direction a ball leaves this side's paddle in.
    #[inline]
    pub fn rebound_direction(self) -> f64 {
        match self {
            Side::Left => 1.0,
            Side::Right => -1.0,
        }
    }

    /// Wire label ("player1" / "player2").
    pub fn player_label(self) -> &'static str {
        match self {
            Side::Left => "player1",
            Side::Right => "player2",
        }
    }
}

// =============================================================================
// PADDLE
// =============================================================================

/// A client-controlled paddle. `x` is fixed per side, `y` is the top edge.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    /// Session that owns this paddle.
    pub owner: SessionId,
    /// Left edge.
    pub x: f64,
    /// Top edge (server-clamped each tick).
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Paddle {
    /// Create a paddle for `side`, anchored against the current bounds.
    pub fn new(owner: SessionId, side: Side, bounds: CanvasBounds, config: &MatchConfig) -> Self {
        Self {
            owner,
            x: Self::anchor_x(side, bounds, config),
            y: 0.0,
            width: config.paddle_width,
            height: config.paddle_height,
        }
    }

    /// Fixed x for a side.
    pub fn anchor_x(side: Side, bounds: CanvasBounds, config: &MatchConfig) -> f64 {
        match side {
            Side::Left => config.left_paddle_x,
            Side::Right => bounds.width - config.right_paddle_inset,
        }
    }

    /// Vertical centre.
    #[inline]
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Keep the paddle inside `[0, height]`. On a court shorter than the
    /// paddle the top edge stays at 0.
    pub fn clamp_to(&mut self, bounds: CanvasBounds) {
        if self.y + self.height > bounds.height {
            self.y = bounds.height - self.height;
        }
        if self.y < 0.0 {
            self.y = 0.0;
        }
    }
}

// =============================================================================
// BALL
// =============================================================================

/// The match ball. `(x, y)` is the centre.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// Centre x.
    pub x: f64,
    /// Centre y.
    pub y: f64,
    /// Velocity x (units per tick).
    pub vx: f64,
    /// Velocity y (units per tick).
    pub vy: f64,
    /// Scalar speed used on the next rebound.
    pub speed: f64,
    /// Radius.
    pub radius: f64,
}

impl Ball {
    /// Ball at the origin with serve velocity.
    pub fn new(config: &MatchConfig) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            vx: config.serve_vx,
            vy: config.serve_vy,
            speed: config.serve_speed,
            radius: config.ball_radius,
        }
    }

    /// Re-centre in `bounds` and restore serve velocity.
    pub fn serve(&mut self, bounds: CanvasBounds, config: &MatchConfig) {
        self.x = bounds.width / 2.0 - self.radius;
        self.y = bounds.height / 2.0 - self.radius;
        self.vx = config.serve_vx;
        self.vy = config.serve_vy;
        self.speed = config.serve_speed;
    }
}

// =============================================================================
// CANVAS BOUNDS
// =============================================================================

/// Shared coordinate space: the smallest viewport any client reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CanvasBounds {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl CanvasBounds {
    /// Create bounds.
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both axes have been reported.
    pub fn is_known(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Fold in one report: set directly while unknown, otherwise shrink
    /// each axis independently. Returns true if anything changed.
    pub fn narrow(&mut self, width: f64, height: f64) -> bool {
        let before = *self;
        if !self.is_known() {
            self.width = width;
            self.height = height;
        } else {
            self.width = self.width.min(width);
            self.height = self.height.min(height);
        }
        before != *self
    }

    /// X coordinate of the court's midline.
    #[inline]
    pub fn midline(&self) -> f64 {
        self.width / 2.0
    }
}

// =============================================================================
// SCORE
// =============================================================================

/// Points per player. Only ever increases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Left player's points.
    pub player1: u32,
    /// Right player's points.
    pub player2: u32,
}

impl Score {
    /// Award one point. Returns the side's new total.
    pub fn award(&mut self, side: Side) -> u32 {
        let points = match side {
            Side::Left => &mut self.player1,
            Side::Right => &mut self.player2,
        };
        *points = points.saturating_add(1);
        *points
    }

    /// Side with the higher score; player1 on a tie.
    pub fn leader(&self) -> Side {
        if self.player1 < self.player2 {
            Side::Right
        } else {
            Side::Left
        }
    }
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle of the match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Waiting for the simulation to be armed.
    #[default]
    Idle,
    /// Counting down to the next rally (seconds remaining).
    CountingDown(u32),
    /// Ball in play.
    Rallying,
    /// Match over. Terminal.
    Finished(Side),
}

impl RoundPhase {
    /// Ball is being simulated.
    pub fn is_running(&self) -> bool {
        matches!(self, RoundPhase::Rallying)
    }

    /// Winner, once finished.
    pub fn winner(&self) -> Option<Side> {
        match self {
            RoundPhase::Finished(side) => Some(*side),
            _ => None,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            RoundPhase::Idle => "idle",
            RoundPhase::CountingDown(_) => "counting_down",
            RoundPhase::Rallying => "rallying",
            RoundPhase::Finished(_) => "finished",
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Match state errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// Canvas report with a non-finite or non-positive dimension.
    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas {
        /// Reported width.
        width: f64,
        /// Reported height.
        height: f64,
    },

    /// Paddle slot already holds a paddle.
    #[error("{0:?} slot already occupied")]
    SlotOccupied(Side),

    /// No paddle in that slot.
    #[error("no paddle on {0:?} side")]
    EmptySlot(Side),

    /// Paddle target is not a finite number.
    #[error("invalid paddle position {0}")]
    InvalidPosition(f64),
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Complete state of a match.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Rules this match runs with.
    pub config: MatchConfig,

    /// Simulation ticks run since the match was armed.
    pub tick: u32,

    /// Current round phase.
    pub phase: RoundPhase,

    /// Paddle slots, indexed by `Side::index()`.
    pub paddles: [Option<Paddle>; 2],

    /// The ball.
    pub ball: Ball,

    /// Negotiated canvas bounds.
    pub bounds: CanvasBounds,

    /// Score.
    pub score: Score,

    /// Ticks since the last countdown step.
    pub countdown_elapsed: u32,

    /// Ball has been centred in known bounds at least once.
    pub ball_placed: bool,

    /// Events generated this tick (drained by the tick).
    pub pending_events: Vec<GameEvent>,
}

impl MatchState {
    /// Create a new match state with zeroed bounds and no paddles.
    pub fn new(config: MatchConfig) -> Self {
        let ball = Ball::new(&config);
        Self {
            config,
            tick: 0,
            phase: RoundPhase::Idle,
            paddles: [None, None],
            ball,
            bounds: CanvasBounds::default(),
            score: Score::default(),
            countdown_elapsed: 0,
            ball_placed: false,
            pending_events: Vec::new(),
        }
    }

    /// Fold a client's viewport report into the shared bounds.
    ///
    /// Narrowing re-anchors the right paddle so it stays on the court.
    /// The first time bounds become known the ball is served from the centre.
    pub fn report_canvas_size(&mut self, width: f64, height: f64) -> Result<bool, MatchError> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(MatchError::InvalidCanvas { width, height });
        }

        let changed = self.bounds.narrow(width, height);

        if changed {
            let right_x = self.bounds.width - self.config.right_paddle_inset;
            if let Some(paddle) = self.paddle_mut(Side::Right) {
                paddle.x = right_x;
            }
        }

        if self.bounds.is_known() && !self.ball_placed {
            self.ball.serve(self.bounds, &self.config);
            self.ball_placed = true;
        }

        Ok(changed)
    }

    /// Put a new paddle for `owner` into `side`'s slot.
    pub fn place_paddle(&mut self, side: Side, owner: SessionId) -> Result<&Paddle, MatchError> {
        let slot = &mut self.paddles[side.index()];
        if slot.is_some() {
            return Err(MatchError::SlotOccupied(side));
        }
        Ok(&*slot.insert(Paddle::new(owner, side, self.bounds, &self.config)))
    }

    /// Remove the paddle in `side`'s slot.
    pub fn remove_paddle(&mut self, side: Side) -> Option<Paddle> {
        self.paddles[side.index()].take()
    }

    /// Store a paddle's desired top edge verbatim. Clamped by the tick.
    pub fn set_paddle_target(&mut self, side: Side, y: f64) -> Result<(), MatchError> {
        if !y.is_finite() {
            return Err(MatchError::InvalidPosition(y));
        }
        let paddle = self.paddle_mut(side).ok_or(MatchError::EmptySlot(side))?;
        paddle.y = y;
        Ok(())
    }

    /// Paddle in a slot.
    pub fn paddle(&self, side: Side) -> Option<&Paddle> {
        self.paddles[side.index()].as_ref()
    }

    /// Paddle in a slot, mutably.
    pub fn paddle_mut(&mut self, side: Side) -> Option<&mut Paddle> {
        self.paddles[side.index()].as_mut()
    }

    /// Number of paddles present.
    pub fn paddle_count(&self) -> usize {
        self.paddles.iter().filter(|p| p.is_some()).count()
    }

    /// Both slots hold a paddle.
    pub fn has_both_paddles(&self) -> bool {
        self.paddle_count() == 2
    }

    /// Clamp every paddle inside the bounds.
    pub fn clamp_paddles(&mut self) {
        let bounds = self.bounds;
        for paddle in self.paddles.iter_mut().flatten() {
            paddle.clamp_to(bounds);
        }
    }

    /// Serve the ball from the centre of the court.
    pub fn recenter_ball(&mut self) {
        self.ball.serve(self.bounds, &self.config);
    }

    /// Countdown value as shown to clients.
    pub fn countdown(&self) -> u32 {
        match self.phase {
            RoundPhase::Idle => self.config.countdown_start,
            RoundPhase::CountingDown(remaining) => remaining,
            RoundPhase::Rallying | RoundPhase::Finished(_) => 0,
        }
    }

    /// Match has a winner.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, RoundPhase::Finished(_))
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

impl Default for MatchState {
    fn default() -> Self {
        Self::new(MatchConfig::default())
    }
}

// =============================================================================
// TESTS
// =============================================================================
