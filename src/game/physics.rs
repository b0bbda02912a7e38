//! Target oscillation and proximity tests

use super::rules::TargetSpec;

/// Vertical travel direction of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
        }
    }
}

/// Physics system for target motion and hit proximity
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Advance a target one tick inside `[min_y, max_y]`.
    /// Clamps to the bound it reaches and flips direction there.
    /// Returns (new_y, new_direction)
    pub fn oscillate(y: f64, direction: Direction, spec: &TargetSpec) -> (f64, Direction) {
        let next = y + direction.sign() * spec.speed;

        if next >= spec.max_y {
            (spec.max_y, Direction::Up)
        } else if next <= spec.min_y {
            (spec.min_y, Direction::Down)
        } else {
            (next, direction)
        }
    }

    /// Whether a projectile at `projectile_x` has just crossed the `column_x`
    /// within one tick of travel
    pub fn crossed_column(projectile_x: f64, column_x: f64, travel: f64) -> bool {
        (projectile_x - column_x).abs() < travel
    }

    /// One-dimensional proximity along y
    pub fn within_radius(target_y: f64, projectile_y: f64, radius: f64) -> bool {
        (target_y - projectile_y).abs() <= radius
    }
}
