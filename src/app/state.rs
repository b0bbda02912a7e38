//! Application state shared across sessions

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::game::{GameRules, MatchController, Simulation};
use crate::net::BroadcastHub;
use crate::store::{FileLeaderboard, LeaderboardStore, MemoryLeaderboard};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub hub: BroadcastHub,
    pub controller: Arc<MatchController>,
    pub leaderboard: Arc<dyn LeaderboardStore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let leaderboard: Arc<dyn LeaderboardStore> = match &config.leaderboard_path {
            Some(path) => {
                info!(path = %path.display(), "Using file leaderboard");
                Arc::new(FileLeaderboard::new(path.clone()))
            }
            None => {
                info!("Using in-memory leaderboard");
                Arc::new(MemoryLeaderboard::new())
            }
        };

        let rules = GameRules::default().with_tick(config.tick);
        Self::with_parts(config, rules, leaderboard)
    }

    /// Assemble from explicit rules and store
    pub fn with_parts(config: Config, rules: GameRules, leaderboard: Arc<dyn LeaderboardStore>) -> Self {
        let hub = BroadcastHub::default();
        let controller = Arc::new(MatchController::new(rules, hub.clone(), Arc::clone(&leaderboard)));

        Self {
            config: Arc::new(config),
            hub,
            controller,
            leaderboard,
        }
    }

    /// Start the target oscillators
    pub fn start_simulation(&self) -> Simulation {
        Simulation::start(Arc::clone(&self.controller))
    }
}
