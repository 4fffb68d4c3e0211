//! Runtime configuration: command-line flags plus the optional JSON rules file.

use std::{
    env, fs,
    io::ErrorKind,
    net::{IpAddr, SocketAddr},
    ops::RangeInclusive,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::error::ConfigError;

/// Default location on disk where the controller looks for the JSON rules file.
const DEFAULT_CONFIG_PATH: &str = "config/rules.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "PARTY_BOARD_CONFIG_PATH";

/// Command-line flags accepted by the controller binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "party-board-back", about = "Controller for the physical party board game")]
pub struct Cli {
    /// Address the peripheral bus listens on.
    #[arg(long, env = "PARTY_BOARD_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,
    /// Port the peripheral bus listens on.
    #[arg(long, env = "PARTY_BOARD_PORT", default_value_t = 1883)]
    pub port: u16,
    /// Identity announced by the controller on the bus.
    #[arg(long, env = "PARTY_BOARD_CLIENT_ID", default_value = "game-controller")]
    pub client_id: String,
    /// Number of stations taking part in the session.
    #[arg(
        long,
        env = "PARTY_BOARD_PLAYERS",
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(2..=8)
    )]
    pub players: u8,
    /// Score a player must reach to win.
    #[arg(
        long,
        env = "PARTY_BOARD_WIN_POINTS",
        default_value_t = 50,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub win_points: u32,
    /// Use the one-cell debug board, manual minigame election and verbose logs.
    #[arg(long, env = "PARTY_BOARD_DEBUG")]
    pub debug: bool,
    /// Path to the JSON rules file.
    #[arg(long, env = CONFIG_PATH_ENV)]
    pub config: Option<PathBuf>,
}

/// Immutable runtime configuration shared across the controller.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Socket address the peripheral bus binds to.
    pub listen: SocketAddr,
    /// Identity announced by the controller.
    pub client_id: String,
    /// Number of stations (player ids run from 1 to this value).
    pub players: u8,
    /// Win threshold checked after every turn.
    pub win_points: u32,
    /// Debug toggle.
    pub debug: bool,
    /// Tunable game rules.
    pub rules: GameRules,
}

impl AppConfig {
    /// Merge parsed flags with the rules file they point at.
    pub fn from_cli(cli: Cli) -> Self {
        let rules = GameRules::load(cli.config.as_deref());
        Self {
            listen: SocketAddr::new(cli.bind, cli.port),
            client_id: cli.client_id,
            players: cli.players,
            win_points: cli.win_points,
            debug: cli.debug,
            rules,
        }
    }
}

/// Delay unit used for every scripted display pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    beat: Duration,
}

impl Pacing {
    /// Pace display sequences with the given beat.
    pub fn new(beat: Duration) -> Self {
        Self { beat }
    }

    /// No pauses at all.
    pub fn instant() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Length of a single beat.
    pub fn beat(&self) -> Duration {
        self.beat
    }

    /// Sleep for `beats` units; returns immediately when pacing is disabled.
    pub async fn pause(&self, beats: u32) {
        if self.beat.is_zero() || beats == 0 {
            return;
        }
        tokio::time::sleep(self.beat * beats).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

/// Numeric knobs of the board game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    /// Faces of the dice rolled at the start of a turn.
    pub dice: RangeInclusive<u32>,
    /// Points granted by a Gain Points cell.
    pub gain_points: RangeInclusive<u32>,
    /// Points taken by a Lose Points cell.
    pub lose_points: RangeInclusive<u32>,
    /// Steps travelled by Move Forward / Move Backward cells.
    pub cell_moves: RangeInclusive<u32>,
    /// Points shared among minigame winners.
    pub minigame_reward: u32,
    /// Pause unit for scripted display sequences.
    pub pacing: Pacing,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            dice: 1..=6,
            gain_points: 5..=10,
            lose_points: 1..=5,
            cell_moves: 1..=3,
            minigame_reward: 10,
            pacing: Pacing::default(),
        }
    }
}

impl GameRules {
    /// Load the rules file, falling back to the built-in rules on any problem.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(resolve_config_path);
        match Self::from_path(&path) {
            Ok(rules) => {
                info!(path = %path.display(), "loaded game rules from config");
                rules
            }
            Err(ConfigError::Read(err)) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "rules file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load rules; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Read, parse and validate a rules file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse and validate rules from a JSON document.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawRules = serde_json::from_str(contents)?;
        raw.validate()?;
        Ok(raw.into())
    }
}

/// JSON representation of the rules file located at [`DEFAULT_CONFIG_PATH`].
#[derive(Debug, Deserialize, Validate)]
#[serde(default)]
struct RawRules {
    #[validate(nested)]
    dice: RawRange,
    #[validate(nested)]
    gain_points: RawRange,
    #[validate(nested)]
    lose_points: RawRange,
    #[validate(nested)]
    cell_moves: RawRange,
    minigame_reward: u32,
    #[validate(range(max = 60_000))]
    pace_ms: u64,
}

impl Default for RawRules {
    fn default() -> Self {
        let rules = GameRules::default();
        Self {
            dice: rules.dice.into(),
            gain_points: rules.gain_points.into(),
            lose_points: rules.lose_points.into(),
            cell_moves: rules.cell_moves.into(),
            minigame_reward: rules.minigame_reward,
            pace_ms: rules.pacing.beat().as_millis() as u64,
        }
    }
}

impl From<RawRules> for GameRules {
    fn from(value: RawRules) -> Self {
        Self {
            dice: value.dice.into(),
            gain_points: value.gain_points.into(),
            lose_points: value.lose_points.into(),
            cell_moves: value.cell_moves.into(),
            minigame_reward: value.minigame_reward,
            pacing: Pacing::new(Duration::from_millis(value.pace_ms)),
        }
    }
}

/// JSON representation of an inclusive `{ "min": .., "max": .. }` range.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_range"))]
struct RawRange {
    #[validate(range(min = 1))]
    min: u32,
    max: u32,
}

fn validate_range(range: &RawRange) -> Result<(), ValidationError> {
    if range.min > range.max {
        let mut err = ValidationError::new("range_order");
        err.message = Some(format!("min {} exceeds max {}", range.min, range.max).into());
        return Err(err);
    }
    Ok(())
}

impl From<RangeInclusive<u32>> for RawRange {
    fn from(value: RangeInclusive<u32>) -> Self {
        Self {
            min: *value.start(),
            max: *value.end(),
        }
    }
}

impl From<RawRange> for RangeInclusive<u32> {
    fn from(value: RawRange) -> Self {
        value.min..=value.max
    }
}

/// Resolve the rules path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_rules_keep_defaults() {
        let rules = GameRules::from_json(r#"{ "dice": { "min": 2, "max": 4 } }"#).unwrap();
        assert_eq!(rules.dice, 2..=4);
        assert_eq!(rules.gain_points, 5..=10);
        assert_eq!(rules.minigame_reward, 10);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = GameRules::from_json(r#"{ "cell_moves": { "min": 3, "max": 1 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_dice_face_is_rejected() {
        let err = GameRules::from_json(r#"{ "dice": { "min": 0, "max": 6 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn pace_is_read_in_milliseconds() {
        let rules = GameRules::from_json(r#"{ "pace_ms": 250 }"#).unwrap();
        assert_eq!(rules.pacing.beat(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let rules = GameRules::load(Some(Path::new("/nonexistent/rules.json")));
        assert_eq!(rules, GameRules::default());
    }

    #[test]
    fn cli_rejects_single_player() {
        let parsed = Cli::try_parse_from(["party-board-back", "--players", "1"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn cli_defaults_match_the_reference_setup() {
        let cli = Cli::try_parse_from(["party-board-back"]).unwrap();
        assert_eq!(cli.players, 2);
        assert_eq!(cli.win_points, 50);
        assert_eq!(cli.client_id, "game-controller");
        assert!(!cli.debug);
    }
}
