//! Authoritative Simulation Tick
//!
//! Drives the round lifecycle:
//!
//! ```text
//! Idle ──armed──▶ CountingDown(4) ──1s steps──▶ Rallying ──exit──▶ CountingDown(4)
//!                                                   │
//!                                                   └──winning exit──▶ Finished
//! ```
//!
//! The countdown cadence is counted in ticks so a run of `tick` calls is
//! fully deterministic.

use crate::game::events::{GameEvent, GameEventData};
use crate::game::geometry::{
    apply_rebound, court_direction, court_side, detect_collision, horizontal_exit, integrate, rebound_angle,
    reflect_walls,
};
use crate::game::state::{MatchState, RoundPhase, Side};

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Tick was skipped (empty paddle slot or unknown bounds)
    pub paused: bool,
    /// Whether the match is over
    pub match_ended: bool,
    /// Winner (once the match has ended)
    pub winner: Option<Side>,
}

/// Run one simulation tick.
///
/// Only call once the match is armed (both slots filled at least once).
/// While a slot is empty, or no client has reported a canvas size yet,
/// the tick does nothing and reports `paused`.
pub fn tick(state: &mut MatchState) -> TickResult {
    let mut result = TickResult::default();

    if let RoundPhase::Finished(winner) = state.phase {
        result.match_ended = true;
        result.winner = Some(winner);
        return result;
    }

    if !state.has_both_paddles() || !state.bounds.is_known() {
        result.paused = true;
        return result;
    }

    state.tick += 1;

    match state.phase {
        RoundPhase::Idle => start_countdown(state),
        RoundPhase::CountingDown(remaining) => {
            state.clamp_paddles();
            advance_countdown(state, remaining);
        }
        RoundPhase::Rallying => step_rally(state),
        RoundPhase::Finished(_) => {}
    }

    result.winner = state.phase.winner();
    result.match_ended = result.winner.is_some();
    result.events = state.take_events();
    result
}

/// Begin a countdown. Only reachable from `Idle` and from a score, so a
/// second countdown can never run alongside the first.
fn start_countdown(state: &mut MatchState) {
    let from = state.config.countdown_start;
    state.countdown_elapsed = 0;
    state.push_event(GameEvent::countdown_started(state.tick, from));

    if from == 0 {
        begin_rally(state);
    } else {
        state.phase = RoundPhase::CountingDown(from);
    }
}

fn advance_countdown(state: &mut MatchState, remaining: u32) {
    state.countdown_elapsed += 1;
    if state.countdown_elapsed < state.config.countdown_step_ticks {
        return;
    }

    state.countdown_elapsed = 0;
    let remaining = remaining.saturating_sub(1);
    state.push_event(GameEvent::countdown_step(state.tick, remaining));

    if remaining == 0 {
        begin_rally(state);
    } else {
        state.phase = RoundPhase::CountingDown(remaining);
    }
}

fn begin_rally(state: &mut MatchState) {
    state.phase = RoundPhase::Rallying;
    state.push_event(GameEvent::rally_started(state.tick));
}

/// One physics step while the ball is live.
fn step_rally(state: &mut MatchState) {
    // 1. Move the ball
    integrate(&mut state.ball);

    // 2. Horizontal exit ends the rally
    if let Some(scorer) = horizontal_exit(&state.ball, state.bounds) {
        score_point(state, scorer);
        return;
    }

    // 3. Top/bottom walls
    if reflect_walls(&mut state.ball, state.bounds) {
        state.push_event(GameEvent::new(state.tick, GameEventData::WallBounce));
    }

    // 4. Keep paddles on the court
    state.clamp_paddles();

    // 5. Only the paddle on the ball's half can be hit
    let side = court_side(&state.ball, state.bounds);
    let hit = state
        .paddle(side)
        .filter(|paddle| detect_collision(&state.ball, paddle))
        .map(|paddle| rebound_angle(&state.ball, paddle, state.config.max_bounce_angle));

    if let Some(angle) = hit {
        let direction = court_direction(&state.ball, state.bounds);
        apply_rebound(
            &mut state.ball,
            angle,
            direction,
            state.config.speed_increment,
        );
        state.push_event(GameEvent::paddle_hit(state.tick, side, angle, state.ball.speed));
    }
}

/// Credit `scorer`, re-serve, and either count down again or end the match.
fn score_point(state: &mut MatchState, scorer: Side) {
    let points = state.score.award(scorer);
    state.recenter_ball();
    state.push_event(GameEvent::point_scored(state.tick, scorer, state.score));

    if points >= state.config.points_to_win {
        let winner = state.score.leader();
        state.phase = RoundPhase::Finished(winner);
        state.push_event(GameEvent::match_won(state.tick, winner, state.score));
    } else {
        start_countdown(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{CanvasBounds, MatchConfig, SessionId};
    use proptest::prelude::*;

    fn session(n: u128) -> SessionId {
        SessionId(uuid::Uuid::from_u128(n))
    }

    /// 800x600 court with both paddles placed.
    fn armed_state() -> MatchState {
        let mut state = MatchState::new(MatchConfig::default());
        state.report_canvas_size(800.0, 600.0).unwrap();
        state.place_paddle(Side::Left, session(1)).unwrap();
        state.place_paddle(Side::Right, session(2)).unwrap();
        state
    }

    /// Armed state already in the rally, paddles parked at the top.
    fn rallying_state() -> MatchState {
        let mut state = armed_state();
        state.phase = RoundPhase::Rallying;
        state
    }

    fn run_ticks(state: &mut MatchState, n: u32) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.extend(tick(state).events);
        }
        events
    }

    #[test]
    fn test_full_countdown_to_rally() {
        let mut state = armed_state();
        let step = state.config.countdown_step_ticks;

        let result = tick(&mut state);
        assert_eq!(state.phase, RoundPhase::CountingDown(4));
        assert_eq!(
            result.events[0].data,
            GameEventData::CountdownStarted { from: 4 }
        );

        run_ticks(&mut state, step);
        assert_eq!(state.phase, RoundPhase::CountingDown(3));

        run_ticks(&mut state, step * 2);
        assert_eq!(state.phase, RoundPhase::CountingDown(1));

        run_ticks(&mut state, step - 1);
        assert_eq!(state.phase, RoundPhase::CountingDown(1));

        let result = tick(&mut state);
        assert_eq!(state.phase, RoundPhase::Rallying);
        assert!(result.events.iter().any(|e| e.data == GameEventData::RallyStarted));

        // Ball has not moved during the countdown
        assert_eq!(state.ball.x, 390.0);
        assert_eq!(state.ball.y, 290.0);
        assert_eq!(state.ball.vx, 5.0);
        assert_eq!(state.ball.vy, 5.0);
        assert_eq!(state.ball.speed, 7.0);
    }

    #[test]
    fn test_idle_waits_for_both_paddles() {
        let mut state = MatchState::default();
        state.report_canvas_size(800.0, 600.0).unwrap();
        state.place_paddle(Side::Left, session(1)).unwrap();

        let result = tick(&mut state);
        assert!(result.paused);
        assert_eq!(state.phase, RoundPhase::Idle);
        assert_eq!(state.tick, 0);
    }

    #[test]
    fn test_unknown_bounds_pause_the_match() {
        let mut state = MatchState::default();
        state.place_paddle(Side::Left, session(1)).unwrap();
        state.place_paddle(Side::Right, session(2)).unwrap();

        for _ in 0..2000 {
            assert!(tick(&mut state).paused);
        }
        assert_eq!(state.phase, RoundPhase::Idle);
        assert_eq!(state.score.player1 + state.score.player2, 0);
        assert_eq!(state.paddle(Side::Left).unwrap().y, 0.0);

        // First canvas report unblocks the countdown
        state.report_canvas_size(800.0, 600.0).unwrap();
        assert_eq!(state.bounds, CanvasBounds::new(800.0, 600.0));
        let result = tick(&mut state);
        assert!(!result.paused);
        assert_eq!(state.phase, RoundPhase::CountingDown(4));
    }

    #[test]
    fn test_free_flight_step() {
        let mut state = rallying_state();
        state.ball.x = 400.0;
        state.ball.y = 300.0;
        state.ball.vx = 3.0;
        state.ball.vy = -2.5;

        tick(&mut state);
        assert_eq!(state.ball.x, 403.0);
        assert_eq!(state.ball.y, 297.5);
        assert_eq!(state.ball.vy, -2.5);
    }

    #[test]
    fn test_wall_bounce_in_rally() {
        let mut state = rallying_state();
        state.ball.x = 400.0;
        state.ball.y = 12.0;
        state.ball.vx = 5.0;
        state.ball.vy = -5.0;

        let result = tick(&mut state);
        assert_eq!(state.ball.vy, 5.0);
        assert_eq!(state.ball.vx, 5.0);
        assert!(result.events.iter().any(|e| e.data == GameEventData::WallBounce));
    }

    #[test]
    fn test_left_paddle_center_hit() {
        let mut state = rallying_state();
        state.set_paddle_target(Side::Left, 200.0).unwrap();
        // Centre of the left paddle is y = 275
        state.ball.x = 32.0;
        state.ball.y = 275.0;
        state.ball.vx = -5.0;
        state.ball.vy = 0.0;

        let result = tick(&mut state);
        assert_eq!(state.ball.vx, 7.0);
        assert_eq!(state.ball.vy, 0.0);
        assert_eq!(state.ball.speed, 8.0);
        assert!(matches!(
            result.events.last().map(|e| &e.data),
            Some(GameEventData::PaddleHit { side: Side::Left, .. })
        ));
    }

    #[test]
    fn test_right_paddle_sends_ball_left() {
        let mut state = rallying_state();
        state.set_paddle_target(Side::Right, 100.0).unwrap();
        state.ball.x = 768.0;
        state.ball.y = 175.0;
        state.ball.vx = 5.0;
        state.ball.vy = 0.0;

        tick(&mut state);
        assert_eq!(state.ball.vx, -7.0);
        assert_eq!(state.ball.speed, 8.0);
    }

    #[test]
    fn test_paddle_clamped_during_rally() {
        let mut state = rallying_state();
        state.set_paddle_target(Side::Right, 10_000.0).unwrap();
        state.ball.x = 400.0;
        state.ball.y = 300.0;

        tick(&mut state);
        assert_eq!(state.paddle(Side::Right).unwrap().y, 450.0);
    }

    #[test]
    fn test_right_exit_scores_player1() {
        let mut state = rallying_state();
        state.ball.x = 786.0;
        state.ball.y = 300.0;
        state.ball.vx = 5.0;
        state.ball.speed = 12.0;

        let result = tick(&mut state);
        assert_eq!(state.score.player1, 1);
        assert_eq!(state.score.player2, 0);
        assert_eq!(state.phase, RoundPhase::CountingDown(4));
        assert_eq!(state.ball.x, 390.0);
        assert_eq!(state.ball.y, 290.0);
        assert_eq!(state.ball.speed, 7.0);
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            GameEventData::PointScored { scorer: Side::Left, .. }
        )));
    }

    #[test]
    fn test_left_exit_scores_player2() {
        let mut state = rallying_state();
        state.set_paddle_target(Side::Left, 400.0).unwrap();
        state.ball.x = -8.0;
        state.ball.y = 100.0;
        state.ball.vx = -5.0;

        tick(&mut state);
        assert_eq!(state.score.player2, 1);
        assert_eq!(state.score.player1, 0);
        assert_eq!(state.phase, RoundPhase::CountingDown(4));
    }

    #[test]
    fn test_third_point_finishes_match() {
        let mut state = rallying_state();
        state.score.player1 = 2;
        state.score.player2 = 1;
        state.ball.x = 786.0;
        state.ball.y = 300.0;
        state.ball.vx = 5.0;

        let result = tick(&mut state);
        assert_eq!(state.phase, RoundPhase::Finished(Side::Left));
        assert!(result.match_ended);
        assert_eq!(result.winner, Some(Side::Left));
        assert!(result.events.iter().any(|e| matches!(
            e.data,
            GameEventData::MatchWon { winner: Side::Left, .. }
        )));
    }

    #[test]
    fn test_player2_can_win() {
        let mut state = rallying_state();
        state.score.player2 = 2;
        state.set_paddle_target(Side::Left, 400.0).unwrap();
        state.ball.x = -8.0;
        state.ball.y = 100.0;
        state.ball.vx = -5.0;

        tick(&mut state);
        assert_eq!(state.phase, RoundPhase::Finished(Side::Right));
        assert_eq!(state.score.player1, 0);
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut state = rallying_state();
        state.phase = RoundPhase::Finished(Side::Right);
        state.ball.x = 100.0;
        let ticks_before = state.tick;

        let result = run_ticks(&mut state, 500);
        assert!(result.is_empty());
        assert_eq!(state.phase, RoundPhase::Finished(Side::Right));
        assert_eq!(state.ball.x, 100.0);
        assert_eq!(state.tick, ticks_before);
    }

    #[test]
    fn test_missing_paddle_pauses_rally() {
        let mut state = rallying_state();
        state.ball.x = 400.0;
        state.remove_paddle(Side::Right);

        let result = tick(&mut state);
        assert!(result.paused);
        assert_eq!(state.ball.x, 400.0);

        state.place_paddle(Side::Right, session(3)).unwrap();
        let result = tick(&mut state);
        assert!(!result.paused);
        assert_eq!(state.ball.x, 400.0 + state.ball.vx);
    }

    #[test]
    fn test_speed_keeps_growing() {
        let mut state = rallying_state();
        state.set_paddle_target(Side::Left, 200.0).unwrap();

        for expected in 8..20 {
            state.ball.x = 32.0;
            state.ball.y = 275.0;
            state.ball.vx = -5.0;
            state.ball.vy = 0.0;
            tick(&mut state);
            assert!(state.ball.vx > 0.0);
            assert_eq!(state.ball.speed, expected as f64);
        }
    }

    proptest! {
        #[test]
        fn prop_exits_are_scored_exclusively(exits in prop::collection::vec(any::<bool>(), 0..5)) {
            let mut state = rallying_state();
            // Park paddles out of the ball's path
            state.set_paddle_target(Side::Left, 450.0).unwrap();
            state.set_paddle_target(Side::Right, 450.0).unwrap();

            let mut expected = (0u32, 0u32);
            for exit_right in exits {
                if state.is_finished() {
                    break;
                }
                state.phase = RoundPhase::Rallying;
                state.ball.y = 100.0;
                state.ball.vy = 0.0;
                if exit_right {
                    state.ball.x = 786.0;
                    state.ball.vx = 5.0;
                    expected.0 += 1;
                } else {
                    state.ball.x = -8.0;
                    state.ball.vx = -5.0;
                    expected.1 += 1;
                }
                tick(&mut state);
                prop_assert_eq!((state.score.player1, state.score.player2), expected);
            }
            prop_assert_eq!(state.score.player1 + state.score.player2, expected.0 + expected.1);
        }
    }
}
