//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::util::time::DEFAULT_TICK_MILLIS;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text
    pub json_logs: bool,
    /// Maximum simultaneous connections
    pub max_players: usize,
    /// JSON file backing the leaderboard; in-memory when absent
    pub leaderboard_path: Option<PathBuf>,
    /// Simulation tick for oscillators and projectile flights
    pub tick: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:5555".to_string())
        };

        let max_players = match env::var("MAX_PLAYERS") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("MAX_PLAYERS"))?,
            Err(_) => 4,
        };

        let json_logs = match env::var("LOG_FORMAT") {
            Ok(raw) => parse_log_format(&raw)?,
            Err(_) => false,
        };

        let tick_ms = match env::var("TICK_MS") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("TICK_MS"))?,
            Err(_) => DEFAULT_TICK_MILLIS,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            json_logs,
            max_players,
            leaderboard_path: env::var("LEADERBOARD_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            tick: Duration::from_millis(tick_ms),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 5555)),
            log_level: "info".to_string(),
            json_logs: false,
            max_players: 4,
            leaderboard_path: None,
            tick: Duration::from_millis(DEFAULT_TICK_MILLIS),
        }
    }
}

/// `LOG_FORMAT`: `json`, or `text` (the default)
fn parse_log_format(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(true),
        "" | "text" => Ok(false),
        _ => Err(ConfigError::Invalid("LOG_FORMAT")),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_listen_on_5555_with_four_seats() {
        let config = Config::default();
        assert_eq!(config.server_addr.port(), 5555);
        assert_eq!(config.max_players, 4);
        assert_eq!(config.tick, Duration::from_millis(16));
        assert!(config.leaderboard_path.is_none());
    }

    #[test]
    fn log_format_accepts_json_or_text_only() {
        assert!(parse_log_format("json").unwrap());
        assert!(parse_log_format(" JSON ").unwrap());
        assert!(!parse_log_format("text").unwrap());
        assert!(!parse_log_format("").unwrap());
        assert!(matches!(
            parse_log_format("xml"),
            Err(ConfigError::Invalid("LOG_FORMAT"))
        ));
    }

    #[test]
    fn config_error_messages_name_the_variable() {
        let err = ConfigError::Invalid("MAX_PLAYERS");
        assert!(err.to_string().contains("MAX_PLAYERS"));
    }
}
