use serde::Serialize;

use crate::{bus::PlayerId, state::player::Player};

/// Snapshot returned by the `/health` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process serves requests.
    pub status: String,
    /// Current game phase.
    pub phase: String,
    /// Number of phase transitions applied so far.
    pub version: usize,
    /// Index of the player on turn.
    pub turn: usize,
    /// Stations currently holding a socket.
    pub attached: Vec<PlayerId>,
    pub players: Vec<PlayerStatus>,
}

/// Public view of one player.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PlayerStatus {
    pub id: PlayerId,
    pub score: u32,
    pub position: usize,
    pub connected: bool,
}

impl From<&Player> for PlayerStatus {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            score: player.score,
            position: player.position,
            connected: player.connected,
        }
    }
}
