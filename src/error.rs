use std::io;

use thiserror::Error;
use validator::ValidationErrors;

use crate::{bus::PlayerId, state::state_machine::InvalidTransition};

/// Errors raised while loading the rules file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read rules file: {0}")]
    Read(#[from] io::Error),
    /// File is not valid JSON for the rules schema.
    #[error("failed to parse rules file: {0}")]
    Parse(#[from] serde_json::Error),
    /// File parsed but holds out-of-range values.
    #[error("invalid rules: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Errors surfaced by the peripheral bus adapter.
#[derive(Debug, Error)]
pub enum BusError {
    /// No station with this id is attached to the bus.
    #[error("station {0} is not connected")]
    StationOffline(PlayerId),
    /// The topic does not address a single station.
    #[error("topic `{0}` does not name a station")]
    UnroutableTopic(String),
    /// The station's writer task is gone.
    #[error("station {0} connection closed")]
    ConnectionClosed(PlayerId),
    /// Envelope could not be encoded.
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
    /// Listener could not be bound.
    #[error("failed to bind bus listener: {0}")]
    Bind(#[source] io::Error),
}

/// Fatal errors of the orchestration loop.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The phase machine refused a transition; the game flow is inconsistent.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// A minigame session was opened while another one was still routed.
    #[error("a minigame session is already active")]
    SessionAlreadyActive,
    /// The roster holds no players.
    #[error("no players registered")]
    EmptyRoster,
}
