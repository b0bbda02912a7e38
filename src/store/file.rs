//! JSON file backed leaderboard

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::leaderboard::{sort_entries, LeaderboardEntry, LeaderboardError, LeaderboardStore};

/// Row as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WinRecord {
    name: String,
    wins: u32,
    last_win_at: DateTime<Utc>,
}

/// Win counts persisted to a single JSON file.
/// The whole file is rewritten on each win.
pub struct FileLeaderboard {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl FileLeaderboard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<WinRecord>, LeaderboardError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, records: &[WinRecord]) -> Result<(), LeaderboardError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LeaderboardStore for FileLeaderboard {
    fn record_win(&self, name: &str) -> Result<(), LeaderboardError> {
        let _guard = self.write_lock.lock();
        let mut records = self.load()?;
        let now = Utc::now();

        match records.iter_mut().find(|r| r.name == name) {
            Some(record) => {
                record.wins += 1;
                record.last_win_at = now;
            }
            None => records.push(WinRecord {
                name: name.to_string(),
                wins: 1,
                last_win_at: now,
            }),
        }

        self.save(&records)?;
        debug!(player = %name, path = %self.path.display(), "Win persisted");
        Ok(())
    }

    fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, LeaderboardError> {
        let mut entries: Vec<LeaderboardEntry> = self
            .load()?
            .into_iter()
            .map(|r| LeaderboardEntry {
                name: r.name,
                wins: r.wins,
            })
            .collect();
        sort_entries(&mut entries);
        Ok(entries)
    }
}
