//! Snapshot building for network transmission

use crate::net::protocol::{GameStateView, PlayerSnapshot, ServerFrame};

use super::world::{MatchPhase, World};

/// Builds immutable state views from the world
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Capture the current world state
    pub fn build(world: &World) -> GameStateView {
        let [target1_y, target2_y] = world.target_ys();

        GameStateView {
            running: world.phase().in_match(),
            paused: world.phase() == MatchPhase::Paused,
            target1_y,
            target2_y,
            pause_owner: world.pause_owner().map(str::to_string),
            players: world
                .players()
                .iter()
                .map(|p| PlayerSnapshot {
                    name: p.name.clone(),
                    score: p.score,
                    shots: p.shots_remaining,
                })
                .collect(),
        }
    }

    /// Capture and wrap as a `GAME_STATE` frame
    pub fn frame(world: &World) -> ServerFrame {
        ServerFrame::GameState(Self::build(world))
    }
}
