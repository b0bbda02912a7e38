//! Match tuning constants

use std::time::Duration;

use crate::util::time::DEFAULT_TICK_MILLIS;

/// Which of the two targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetId {
    One,
    Two,
}

impl TargetId {
    /// Hit priority order
    pub const ALL: [TargetId; 2] = [TargetId::One, TargetId::Two];

    pub fn number(self) -> u8 {
        match self {
            TargetId::One => 1,
            TargetId::Two => 2,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(TargetId::One),
            2 => Some(TargetId::Two),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self.number() as usize - 1
    }
}

/// Static description of one target
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    /// Fixed x column
    pub x: f64,
    /// Hit radius along y
    pub radius: f64,
    /// Travel per tick
    pub speed: f64,
    /// Points awarded on hit
    pub points: u32,
    pub min_y: f64,
    pub max_y: f64,
    /// Position after a match reset
    pub start_y: f64,
}

impl TargetSpec {
    pub fn for_target(id: TargetId) -> Self {
        match id {
            TargetId::One => Self {
                x: 400.0,
                radius: 30.0,
                speed: 1.0,
                points: 1,
                min_y: 100.0,
                max_y: 500.0,
                start_y: 300.0,
            },
            TargetId::Two => Self {
                x: 600.0,
                radius: 15.0,
                speed: 2.0,
                points: 2,
                min_y: 100.0,
                max_y: 500.0,
                start_y: 300.0,
            },
        }
    }
}

/// Full rule set for a match
#[derive(Debug, Clone)]
pub struct GameRules {
    pub field_width: f64,
    pub field_height: f64,
    /// Projectiles leave the shooter at this x
    pub shooter_base_width: f64,
    /// Vertical span divided into shooter lanes
    pub lane_span: f64,
    pub projectile_speed: f64,
    pub starting_shots: u32,
    pub winning_score: u32,
    pub tick: Duration,
    pub targets: [TargetSpec; 2],
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 600.0,
            shooter_base_width: 72.0,
            lane_span: 500.0,
            projectile_speed: 10.0,
            starting_shots: 15,
            winning_score: 6,
            tick: Duration::from_millis(DEFAULT_TICK_MILLIS),
            targets: [
                TargetSpec::for_target(TargetId::One),
                TargetSpec::for_target(TargetId::Two),
            ],
        }
    }
}

impl GameRules {
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn target(&self, id: TargetId) -> &TargetSpec {
        &self.targets[id.index()]
    }

    /// Projectile y for the shooter at `index` among `player_count` players
    pub fn lane_y(&self, index: usize, player_count: usize) -> f64 {
        let step = self.lane_span / (player_count as f64 + 1.0);
        step * (index as f64 + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_numbers_round_trip() {
        for id in TargetId::ALL {
            assert_eq!(TargetId::from_number(id.number()), Some(id));
        }
        assert_eq!(TargetId::from_number(3), None);
    }

    #[test]
    fn lanes_split_the_span_evenly() {
        let rules = GameRules::default();
        assert_eq!(rules.lane_y(0, 1), 250.0);
        assert_eq!(rules.lane_y(0, 4), 100.0);
        assert_eq!(rules.lane_y(3, 4), 400.0);
    }

    #[test]
    fn far_target_is_worth_more() {
        let rules = GameRules::default();
        assert!(rules.target(TargetId::Two).points > rules.target(TargetId::One).points);
        assert!(rules.target(TargetId::Two).x > rules.target(TargetId::One).x);
    }
}
