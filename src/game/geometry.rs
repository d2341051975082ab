//! Ball/Paddle Geometry
//!
//! Pure collision and rebound functions. No state of their own;
//! the tick feeds them the match's ball, paddles and bounds.

use crate::game::state::{Ball, CanvasBounds, Paddle, Side};

/// Strict AABB overlap between the ball's bounding square and a paddle.
#[inline]
pub fn detect_collision(ball: &Ball, paddle: &Paddle) -> bool {
    let ball_left = ball.x - ball.radius;
    let ball_right = ball.x + ball.radius;
    let ball_top = ball.y - ball.radius;
    let ball_bottom = ball.y + ball.radius;

    paddle.x < ball_right
        && paddle.y < ball_bottom
        && paddle.x + paddle.width > ball_left
        && paddle.y + paddle.height > ball_top
}

/// Rebound angle for a hit: the ball's offset from the paddle centre,
/// normalized to `[-1, 1]` by the half-height, scaled to `max_angle`.
///
/// Top edge gives `-max_angle`, centre `0`, bottom edge `+max_angle`.
pub fn rebound_angle(ball: &Ball, paddle: &Paddle, max_angle: f64) -> f64 {
    let half_height = paddle.height / 2.0;
    if half_height <= 0.0 {
        return 0.0;
    }
    let offset = ((ball.y - paddle.center_y()) / half_height).clamp(-1.0, 1.0);
    max_angle * offset
}

/// Send the ball off at `angle` in `direction` (+1 right, -1 left) at its
/// current speed, then speed it up by `increment`.
pub fn apply_rebound(ball: &mut Ball, angle: f64, direction: f64, increment: f64) {
    ball.vx = direction * ball.speed * angle.cos();
    ball.vy = ball.speed * angle.sin();
    ball.speed += increment;
}

/// Side of the court the ball is on. Decides which paddle can be hit
/// and which way the rebound travels.
#[inline]
pub fn court_side(ball: &Ball, bounds: CanvasBounds) -> Side {
    if ball.x + ball.radius < bounds.midline() {
        Side::Left
    } else {
        Side::Right
    }
}

/// Horizontal direction a rebound off the ball's current half travels in:
/// `+1` on the left half, `-1` on the right.
#[inline]
pub fn court_direction(ball: &Ball, bounds: CanvasBounds) -> f64 {
    court_side(ball, bounds).rebound_direction()
}

/// Elastic reflection off the top and bottom walls. Returns true on a bounce.
pub fn reflect_walls(ball: &mut Ball, bounds: CanvasBounds) -> bool {
    if ball.y + ball.radius > bounds.height || ball.y - ball.radius < 0.0 {
        ball.vy = -ball.vy;
        true
    } else {
        false
    }
}

/// Side that scores if the ball has left the court horizontally.
///
/// Past the right edge scores for player1 (left); past the left edge for player2.
pub fn horizontal_exit(ball: &Ball, bounds: CanvasBounds) -> Option<Side> {
    if ball.x + ball.radius >= bounds.width {
        Some(Side::Left)
    } else if ball.x + ball.radius < 0.0 {
        Some(Side::Right)
    } else {
        None
    }
}

/// Advance the ball by one tick of velocity.
#[inline]
pub fn integrate(ball: &mut Ball) {
    ball.x += ball.vx;
    ball.y += ball.vy;
}
