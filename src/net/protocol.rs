//! Line protocol frame definitions
//! These are the wire types for client-server communication. Every frame is a
//! single line of UTF-8 text; fields are separated by `:` and player rows in a
//! state frame by `,` and `;`.

use std::fmt;
use std::str::FromStr;

use crate::game::rules::TargetId;
use crate::store::LeaderboardEntry;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    /// Register a display name for this connection
    Name(String),
    /// Ready for the next match, or resume if this player paused
    Ready,
    /// Pause the running match
    Pause,
    /// Fire an arrow
    Shoot,
    /// Client has seen the end-of-match frame
    GameOverAck,
    /// Request the win table
    Leaderboard,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    NameAccepted,
    Error(String),
    GameStarted,
    GamePaused(String),
    GameResumed,
    WaitingPlayers,
    /// Every ready flag was cleared
    ResetReady,
    /// Match over; `None` when nobody won
    GameOver(Option<String>),
    Arrow {
        player: String,
        y: f64,
        arrow_id: String,
    },
    ArrowPosition {
        player: String,
        x: f64,
        y: f64,
        arrow_id: String,
    },
    Hit {
        player: String,
        target: TargetId,
        x: f64,
        y: f64,
        arrow_id: String,
    },
    Miss {
        player: String,
        arrow_id: String,
    },
    GameState(GameStateView),
    Leaderboard(Vec<LeaderboardEntry>),
}

/// Full world state as sent to clients
#[derive(Debug, Clone, PartialEq)]
pub struct GameStateView {
    /// Match in progress (also true while paused)
    pub running: bool,
    pub paused: bool,
    pub target1_y: f64,
    pub target2_y: f64,
    pub pause_owner: Option<String>,
    pub players: Vec<PlayerSnapshot>,
}

/// Player row in a state frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub name: String,
    pub score: u32,
    pub shots: u32,
}

/// Frame decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Empty frame")]
    Empty,

    #[error("Unknown frame: {0}")]
    UnknownTag(String),

    #[error("Frame {tag} is missing field {field}")]
    MissingField {
        tag: &'static str,
        field: &'static str,
    },

    #[error("Frame {tag} has invalid {field}: {value:?}")]
    InvalidField {
        tag: &'static str,
        field: &'static str,
        value: String,
    },
}

const NO_WINNER: &str = "None";
const NO_PAUSE_OWNER: &str = "null";

/// Coordinates always carry a fractional part (`300.0`)
fn coord(value: f64) -> String {
    format!("{value:?}")
}

impl fmt::Display for ClientFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFrame::Name(name) => write!(f, "NAME:{name}"),
            ClientFrame::Ready => f.write_str("READY"),
            ClientFrame::Pause => f.write_str("PAUSE"),
            ClientFrame::Shoot => f.write_str("SHOOT"),
            ClientFrame::GameOverAck => f.write_str("GAME_OVER_ACK"),
            ClientFrame::Leaderboard => f.write_str("LEADERBOARD"),
        }
    }
}

impl FromStr for ClientFrame {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        match line {
            "READY" => return Ok(ClientFrame::Ready),
            "PAUSE" => return Ok(ClientFrame::Pause),
            "SHOOT" => return Ok(ClientFrame::Shoot),
            "GAME_OVER_ACK" => return Ok(ClientFrame::GameOverAck),
            "LEADERBOARD" => return Ok(ClientFrame::Leaderboard),
            _ => {}
        }

        match line.split_once(':') {
            Some(("NAME", name)) => Ok(ClientFrame::Name(name.to_string())),
            _ => Err(ProtocolError::UnknownTag(line.to_string())),
        }
    }
}

impl fmt::Display for ServerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerFrame::NameAccepted => f.write_str("NAME_ACCEPTED"),
            ServerFrame::Error(msg) => write!(f, "ERROR:{msg}"),
            ServerFrame::GameStarted => f.write_str("GAME_STARTED"),
            ServerFrame::GamePaused(player) => write!(f, "GAME_PAUSED:{player}"),
            ServerFrame::GameResumed => f.write_str("GAME_RESUMED"),
            ServerFrame::WaitingPlayers => f.write_str("WAITING_PLAYERS"),
            ServerFrame::ResetReady => f.write_str("RESET_READY"),
            ServerFrame::GameOver(winner) => {
                write!(f, "GAME_OVER:{}", winner.as_deref().unwrap_or(NO_WINNER))
            }
            ServerFrame::Arrow {
                player,
                y,
                arrow_id,
            } => write!(f, "ARROW:{player}:{}:{arrow_id}", coord(*y)),
            ServerFrame::ArrowPosition {
                player,
                x,
                y,
                arrow_id,
            } => write!(
                f,
                "ARROW_POSITION:{player}:{}:{}:{arrow_id}",
                coord(*x),
                coord(*y)
            ),
            ServerFrame::Hit {
                player,
                target,
                x,
                y,
                arrow_id,
            } => write!(
                f,
                "HIT:{player}:{}:{}:{}:{arrow_id}",
                target.number(),
                coord(*x),
                coord(*y)
            ),
            ServerFrame::Miss { player, arrow_id } => write!(f, "MISS:{player}:{arrow_id}"),
            ServerFrame::GameState(state) => write!(f, "{state}"),
            ServerFrame::Leaderboard(entries) => {
                f.write_str("LEADERBOARD:")?;
                for entry in entries {
                    write!(f, "{},{};", entry.name, entry.wins)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for GameStateView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GAME_STATE:{}:{}:{}:{}:{}:{}:",
            self.running,
            self.paused,
            coord(self.target1_y),
            coord(self.target2_y),
            self.pause_owner.as_deref().unwrap_or(NO_PAUSE_OWNER),
            self.players.len()
        )?;
        for p in &self.players {
            write!(f, "{},{},{};", p.name, p.score, p.shots)?;
        }
        Ok(())
    }
}

/// Pull the next `:`-separated field or report which one is missing
fn field<'a>(
    parts: &mut impl Iterator<Item = &'a str>,
    tag: &'static str,
    name: &'static str,
) -> Result<&'a str, ProtocolError> {
    parts
        .next()
        .ok_or(ProtocolError::MissingField { tag, field: name })
}

fn parse_num<T: FromStr>(raw: &str, tag: &'static str, name: &'static str) -> Result<T, ProtocolError> {
    raw.parse().map_err(|_| ProtocolError::InvalidField {
        tag,
        field: name,
        value: raw.to_string(),
    })
}

fn parse_bool(raw: &str, tag: &'static str, name: &'static str) -> Result<bool, ProtocolError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ProtocolError::InvalidField {
            tag,
            field: name,
            value: raw.to_string(),
        }),
    }
}

impl FromStr for ServerFrame {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }

        match line {
            "NAME_ACCEPTED" => return Ok(ServerFrame::NameAccepted),
            "GAME_STARTED" => return Ok(ServerFrame::GameStarted),
            "GAME_RESUMED" => return Ok(ServerFrame::GameResumed),
            "WAITING_PLAYERS" => return Ok(ServerFrame::WaitingPlayers),
            "RESET_READY" => return Ok(ServerFrame::ResetReady),
            _ => {}
        }

        let Some((tag, rest)) = line.split_once(':') else {
            return Err(ProtocolError::UnknownTag(line.to_string()));
        };

        match tag {
            "ERROR" => Ok(ServerFrame::Error(rest.to_string())),
            "GAME_PAUSED" => Ok(ServerFrame::GamePaused(rest.to_string())),
            "GAME_OVER" => Ok(ServerFrame::GameOver(
                (rest != NO_WINNER).then(|| rest.to_string()),
            )),
            "ARROW" => {
                let mut parts = rest.splitn(3, ':');
                let player = field(&mut parts, "ARROW", "player")?.to_string();
                let y = parse_num(field(&mut parts, "ARROW", "y")?, "ARROW", "y")?;
                let arrow_id = field(&mut parts, "ARROW", "arrow_id")?.to_string();
                Ok(ServerFrame::Arrow {
                    player,
                    y,
                    arrow_id,
                })
            }
            "ARROW_POSITION" => {
                const TAG: &str = "ARROW_POSITION";
                let mut parts = rest.splitn(4, ':');
                let player = field(&mut parts, TAG, "player")?.to_string();
                let x = parse_num(field(&mut parts, TAG, "x")?, TAG, "x")?;
                let y = parse_num(field(&mut parts, TAG, "y")?, TAG, "y")?;
                let arrow_id = field(&mut parts, TAG, "arrow_id")?.to_string();
                Ok(ServerFrame::ArrowPosition {
                    player,
                    x,
                    y,
                    arrow_id,
                })
            }
            "HIT" => {
                let mut parts = rest.splitn(5, ':');
                let player = field(&mut parts, "HIT", "player")?.to_string();
                let raw_target = field(&mut parts, "HIT", "target")?;
                let target = parse_num::<u8>(raw_target, "HIT", "target")
                    .ok()
                    .and_then(TargetId::from_number)
                    .ok_or_else(|| ProtocolError::InvalidField {
                        tag: "HIT",
                        field: "target",
                        value: raw_target.to_string(),
                    })?;
                let x = parse_num(field(&mut parts, "HIT", "x")?, "HIT", "x")?;
                let y = parse_num(field(&mut parts, "HIT", "y")?, "HIT", "y")?;
                let arrow_id = field(&mut parts, "HIT", "arrow_id")?.to_string();
                Ok(ServerFrame::Hit {
                    player,
                    target,
                    x,
                    y,
                    arrow_id,
                })
            }
            "MISS" => {
                let mut parts = rest.splitn(2, ':');
                let player = field(&mut parts, "MISS", "player")?.to_string();
                let arrow_id = field(&mut parts, "MISS", "arrow_id")?.to_string();
                Ok(ServerFrame::Miss { player, arrow_id })
            }
            "GAME_STATE" => parse_game_state(rest).map(ServerFrame::GameState),
            "LEADERBOARD" => {
                let entries = rest
                    .split(';')
                    .filter(|row| !row.is_empty())
                    .map(|row| -> Result<LeaderboardEntry, ProtocolError> {
                        let (name, wins) =
                            row.split_once(',').ok_or(ProtocolError::MissingField {
                                tag: "LEADERBOARD",
                                field: "wins",
                            })?;
                        Ok(LeaderboardEntry {
                            name: name.to_string(),
                            wins: parse_num(wins, "LEADERBOARD", "wins")?,
                        })
                    })
                    .collect::<Result<Vec<_>, ProtocolError>>()?;
                Ok(ServerFrame::Leaderboard(entries))
            }
            _ => Err(ProtocolError::UnknownTag(line.to_string())),
        }
    }
}

fn parse_game_state(rest: &str) -> Result<GameStateView, ProtocolError> {
    const TAG: &str = "GAME_STATE";
    let mut parts = rest.splitn(7, ':');

    let running = parse_bool(field(&mut parts, TAG, "running")?, TAG, "running")?;
    let paused = parse_bool(field(&mut parts, TAG, "paused")?, TAG, "paused")?;
    let target1_y = parse_num(field(&mut parts, TAG, "target1_y")?, TAG, "target1_y")?;
    let target2_y = parse_num(field(&mut parts, TAG, "target2_y")?, TAG, "target2_y")?;
    let owner = field(&mut parts, TAG, "pause_owner")?;
    let count: usize = parse_num(field(&mut parts, TAG, "player_count")?, TAG, "player_count")?;
    let rows = field(&mut parts, TAG, "players")?;

    let players = rows
        .split(';')
        .filter(|row| !row.is_empty())
        .map(|row| -> Result<PlayerSnapshot, ProtocolError> {
            let mut cols = row.split(',');
            let name = field(&mut cols, TAG, "name")?.to_string();
            let score = parse_num(field(&mut cols, TAG, "score")?, TAG, "score")?;
            let shots = parse_num(field(&mut cols, TAG, "shots")?, TAG, "shots")?;
            Ok(PlayerSnapshot { name, score, shots })
        })
        .collect::<Result<Vec<_>, ProtocolError>>()?;

    if players.len() != count {
        return Err(ProtocolError::InvalidField {
            tag: TAG,
            field: "player_count",
            value: count.to_string(),
        });
    }

    Ok(GameStateView {
        running,
        paused,
        target1_y,
        target2_y,
        pause_owner: (owner != NO_PAUSE_OWNER).then(|| owner.to_string()),
        players,
    })
}
