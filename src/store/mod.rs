//! Win tracking collaborator

pub mod file;
pub mod leaderboard;

pub use file::FileLeaderboard;
pub use leaderboard::{LeaderboardEntry, LeaderboardError, LeaderboardStore, MemoryLeaderboard};
