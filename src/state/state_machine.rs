use std::fmt;

use thiserror::Error;
use tracing::info;

/// Global phase of the board game. Decides which inbound events are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    /// Stations are announcing themselves.
    AwaitingPlayers,
    /// Turn bookkeeping, announcements and cell effects; no peripheral input.
    Playing,
    /// Waiting for the current player's roll button.
    RollingDice,
    /// Waiting for the current player's hall-sensor pulses.
    Moving,
    /// A minigame session owns the button topics.
    Minigame,
    /// The current player picks a minigame by hand (debug mode).
    MinigameElection,
    /// A winner (or draw) has been declared.
    GameOver,
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GamePhase::AwaitingPlayers => "awaiting_players",
            GamePhase::Playing => "playing",
            GamePhase::RollingDice => "rolling_dice",
            GamePhase::Moving => "moving",
            GamePhase::Minigame => "minigame",
            GamePhase::MinigameElection => "minigame_election",
            GamePhase::GameOver => "game_over",
        };
        f.write_str(label)
    }
}

/// Events that drive the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Every station has announced itself.
    AllPlayersConnected,
    /// The current player must press the roll button.
    DiceRequested,
    /// The current player must move the meeple.
    MovementRequested,
    /// The meeple reached its target cell.
    CellReached,
    /// The current player must pick a minigame by hand.
    MinigameElectionStarted,
    /// A minigame session took over the button topics.
    MinigameStarted,
    /// The minigame session returned its winners.
    MinigameFinished,
    /// A player reached the win threshold.
    GameWon,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: GamePhase,
    /// Number of transitions applied so far.
    pub version: usize,
}

/// Single owner of the global phase. Every change goes through [`apply`](Self::apply).
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: GamePhase,
    version: usize,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::AwaitingPlayers,
            version: 0,
        }
    }
}

impl PhaseMachine {
    /// Create a new state machine waiting for players.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Validate and apply a transition, emitting the audit record.
    pub fn apply(&mut self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        let from = self.phase;
        self.phase = next;
        self.version += 1;
        info!(
            from = %from,
            to = %next,
            event = ?event,
            version = self.version,
            "phase transition"
        );
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (GamePhase::AwaitingPlayers, GameEvent::AllPlayersConnected) => GamePhase::Playing,
            (GamePhase::Playing, GameEvent::DiceRequested) => GamePhase::RollingDice,
            (GamePhase::RollingDice | GamePhase::Playing, GameEvent::MovementRequested) => {
                GamePhase::Moving
            }
            (GamePhase::Moving, GameEvent::CellReached) => GamePhase::Playing,
            (GamePhase::Playing, GameEvent::MinigameElectionStarted) => {
                GamePhase::MinigameElection
            }
            (GamePhase::Playing | GamePhase::MinigameElection, GameEvent::MinigameStarted) => {
                GamePhase::Minigame
            }
            (GamePhase::Minigame, GameEvent::MinigameFinished) => GamePhase::Playing,
            (GamePhase::Playing, GameEvent::GameWon) => GamePhase::GameOver,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
