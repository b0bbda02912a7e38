//! Leaderboard store interface and the in-memory implementation

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One row of the win table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub wins: u32,
}

/// Persistent win counts.
///
/// Calls may block; the match controller only invokes them from blocking
/// tasks and never while it holds the world lock.
pub trait LeaderboardStore: Send + Sync {
    /// Add one win for `name`, creating the row if needed
    fn record_win(&self, name: &str) -> Result<(), LeaderboardError>;

    /// All rows, most wins first
    fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError>;
}

/// Leaderboard errors
#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("Leaderboard I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Leaderboard data is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Leaderboard task failed: {0}")]
    Task(String),
}

/// Most wins first, ties by name
pub fn sort_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.name.cmp(&b.name)));
}

/// Win counts kept for the lifetime of the process
#[derive(Default)]
pub struct MemoryLeaderboard {
    wins: RwLock<HashMap<String, u32>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaderboardStore for MemoryLeaderboard {
    fn record_win(&self, name: &str) -> Result<(), LeaderboardError> {
        *self.wins.write().entry(name.to_string()).or_insert(0) += 1;
        Ok(())
    }

    fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let mut entries: Vec<LeaderboardEntry> = self
            .wins
            .read()
            .iter()
            .map(|(name, wins)| LeaderboardEntry {
                name: name.clone(),
                wins: *wins,
            })
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[test]
    fn wins_accumulate_and_sort_descending() {
        let store = MemoryLeaderboard::new();
        assert_ok!(store.record_win("bob"));
        assert_ok!(store.record_win("alice"));
        assert_ok!(store.record_win("alice"));
        assert_ok!(store.record_win("carol"));

        let table = assert_ok!(store.leaderboard());
        let rows: Vec<(&str, u32)> = table.iter().map(|e| (e.name.as_str(), e.wins)).collect();
        assert_eq!(rows, vec![("alice", 2), ("bob", 1), ("carol", 1)]);
    }

    #[test]
    fn empty_store_has_empty_table() {
        let store = MemoryLeaderboard::new();
        assert!(assert_ok!(store.leaderboard()).is_empty());
    }
}
