//! Game orchestration: the phase-routed dispatcher and the blocking turn loop.

use std::{
    ops::RangeInclusive,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock as SyncRwLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use futures::future::BoxFuture;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use crate::{
    bus::{Channel, Dispatcher, InboundEvent, MessageBus, PlayerId},
    config::{AppConfig, GameRules},
    dto::peripheral::{ButtonPayload, LcdMessage, PressKind},
    error::ControllerError,
    minigames::{MinigameEngine, MinigameKind, SessionCore},
    services::{
        announcer::Announcer,
        melodies,
        scoring::{self, GameOutcome, MinigameAward},
    },
    state::{
        board::{Board, CellEffect},
        gate::WaitGate,
        player::{Connection, Player, Roster},
        state_machine::{GameEvent, GamePhase, PhaseMachine, Snapshot},
    },
};

/// Handler responsible for inbound events in a given phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseHandler {
    /// Station connection announcements.
    Connection,
    /// The current player's roll button.
    Dice,
    /// The current player's hall-sensor pulses.
    Movement,
    /// Forward to the running minigame session.
    Session,
    /// The current player's manual minigame pick.
    Election,
}

impl PhaseHandler {
    /// Total mapping from phase to handler; `None` drops every event.
    pub fn for_phase(phase: GamePhase) -> Option<Self> {
        match phase {
            GamePhase::AwaitingPlayers => Some(PhaseHandler::Connection),
            GamePhase::RollingDice => Some(PhaseHandler::Dice),
            GamePhase::Moving => Some(PhaseHandler::Movement),
            GamePhase::Minigame => Some(PhaseHandler::Session),
            GamePhase::MinigameElection => Some(PhaseHandler::Election),
            GamePhase::Playing | GamePhase::GameOver => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Default)]
struct Election {
    options: Vec<MinigameKind>,
    index: usize,
    choice: Option<MinigameKind>,
}

/// Drives one game session from player connection to game over.
pub struct GameController {
    bus: Arc<dyn MessageBus>,
    announcer: Announcer,
    board: Board,
    rules: GameRules,
    win_points: u32,
    manual_election: bool,
    // Sync lock: the minigame engine flips the phase from a plain closure.
    machine: SyncRwLock<PhaseMachine>,
    phase_tx: watch::Sender<GamePhase>,
    roster: RwLock<Roster>,
    turn: AtomicUsize,
    players_gate: WaitGate,
    dice_gate: WaitGate,
    movement_gate: WaitGate,
    election_gate: WaitGate,
    election: Mutex<Election>,
    minigames: MinigameEngine,
    rng: Mutex<StdRng>,
}

impl GameController {
    /// Controller for the configured session: classic board, or the debug
    /// board with manual minigame election when debugging.
    pub fn new(config: &AppConfig, bus: Arc<dyn MessageBus>) -> Arc<Self> {
        let board = if config.debug {
            Board::debug()
        } else {
            Board::classic()
        };
        Arc::new(Self::with_parts(config, bus, board, StdRng::from_os_rng()))
    }

    /// Controller with an explicit board and random source.
    pub fn with_parts(
        config: &AppConfig,
        bus: Arc<dyn MessageBus>,
        board: Board,
        rng: StdRng,
    ) -> Self {
        let roster = Roster::new(config.players);
        let announcer = Announcer::new(Arc::clone(&bus), roster.ids());
        let (phase_tx, _) = watch::channel(GamePhase::AwaitingPlayers);
        Self {
            minigames: MinigameEngine::new(Arc::clone(&bus)),
            bus,
            announcer,
            board,
            rules: config.rules.clone(),
            win_points: config.win_points,
            manual_election: config.debug,
            machine: SyncRwLock::new(PhaseMachine::new()),
            phase_tx,
            roster: RwLock::new(roster),
            turn: AtomicUsize::new(0),
            players_gate: WaitGate::new(),
            dice_gate: WaitGate::new(),
            movement_gate: WaitGate::new(),
            election_gate: WaitGate::new(),
            election: Mutex::new(Election::default()),
            rng: Mutex::new(rng),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.machine().phase()
    }

    /// Current phase plus transition count.
    pub fn snapshot(&self) -> Snapshot {
        self.machine().snapshot()
    }

    /// Observe phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<GamePhase> {
        self.phase_tx.subscribe()
    }

    /// Index of the player on turn.
    pub fn turn(&self) -> usize {
        self.turn.load(Ordering::Acquire)
    }

    /// Copy of every player's state.
    pub async fn players(&self) -> Vec<Player> {
        self.roster.read().await.players().to_vec()
    }

    /// Station id of the player on turn.
    pub async fn current_player_id(&self) -> Option<PlayerId> {
        self.roster
            .read()
            .await
            .at(self.turn())
            .map(|player| player.id)
    }

    /// Wait for every station, then play turns until somebody wins.
    pub async fn run(&self) -> Result<GameOutcome, ControllerError> {
        if self.roster.read().await.is_empty() {
            return Err(ControllerError::EmptyRoster);
        }
        self.wait_for_players().await?;
        self.welcome().await;

        loop {
            self.play_turn().await?;
            self.show_stats().await;
            if let Some(outcome) = self.check_winner().await? {
                return Ok(outcome);
            }
            self.advance_turn().await;
        }
    }

    fn machine(&self) -> std::sync::RwLockReadGuard<'_, PhaseMachine> {
        self.machine.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Single writer of the global phase.
    fn transition(&self, event: GameEvent) -> Result<GamePhase, ControllerError> {
        let next = self
            .machine
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event)?;
        self.phase_tx.send_replace(next);
        Ok(next)
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn roll(&self, range: &RangeInclusive<u32>) -> u32 {
        self.rng().random_range(range.clone())
    }

    fn election(&self) -> MutexGuard<'_, Election> {
        self.election.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn route(&self, event: InboundEvent) {
        let phase = self.phase();
        match PhaseHandler::for_phase(phase) {
            Some(PhaseHandler::Connection) => self.on_connection(&event).await,
            Some(PhaseHandler::Dice) => self.on_dice(&event).await,
            Some(PhaseHandler::Movement) => self.on_movement(&event).await,
            Some(PhaseHandler::Session) => {
                if !self.minigames.forward(&event) {
                    debug!(topic = %event.topic, "no minigame session to forward to");
                }
            }
            Some(PhaseHandler::Election) => self.on_election(&event).await,
            None => debug!(phase = %phase, topic = %event.topic, "event dropped in this phase"),
        }
    }

    /// Whether `event` was published by the current player on `channel`.
    async fn from_current_player(&self, event: &InboundEvent, channel: Channel) -> bool {
        let Some((id, received)) = event.station() else {
            debug!(topic = %event.topic, "event on an unknown topic dropped");
            return false;
        };
        if received != channel {
            debug!(topic = %event.topic, expected = %channel, "event on another channel dropped");
            return false;
        }
        let current = self.current_player_id().await;
        if current != Some(id) {
            debug!(station = id, current = ?current, "event from a player not on turn dropped");
            return false;
        }
        true
    }

    async fn on_connection(&self, event: &InboundEvent) {
        let Some((id, Channel::Connection)) = event.station() else {
            debug!(topic = %event.topic, "non-connection event dropped while awaiting players");
            return;
        };
        let result = self.roster.write().await.connect(id);
        match result {
            Connection::OutOfRange => debug!(station = id, "station outside the roster ignored"),
            Connection::AlreadyConnected => debug!(station = id, "duplicate connection ignored"),
            Connection::Connected { all_connected } => {
                info!(station = id, "player connected");
                self.announcer.show(
                    id,
                    &LcdMessage::lines("Connected", &format!("You are Player {id}")),
                );
                if all_connected {
                    self.players_gate.signal();
                }
            }
        }
    }

    async fn on_dice(&self, event: &InboundEvent) {
        if self.from_current_player(event, Channel::Button).await {
            self.dice_gate.signal();
        }
    }

    async fn on_movement(&self, event: &InboundEvent) {
        if self.from_current_player(event, Channel::Movement).await {
            self.movement_gate.signal();
        }
    }

    async fn on_election(&self, event: &InboundEvent) {
        if !self.from_current_player(event, Channel::Button).await {
            return;
        }
        let Some(kind) = ButtonPayload::press_kind(&event.payload) else {
            debug!(payload = %event.payload, "malformed election press dropped");
            return;
        };
        let mut election = self.election();
        if election.options.is_empty() || election.choice.is_some() {
            return;
        }
        match kind {
            PressKind::Short => {
                election.index = (election.index + 1) % election.options.len();
                let shown = election.options[election.index];
                self.announcer.show_all(&LcdMessage::line(shown.label()));
            }
            PressKind::Long => {
                let picked = election.options[election.index];
                election.choice = Some(picked);
                info!(game = %picked, "minigame elected");
                self.election_gate.signal();
            }
        }
    }

    async fn wait_for_players(&self) -> Result<(), ControllerError> {
        let filter = Channel::Connection.any_station();
        self.bus.subscribe(&filter);
        info!("waiting for players to connect");
        // The gate is fresh; a station may already have completed the roster.
        if !self.roster.read().await.all_connected() {
            self.players_gate.wait().await;
        }
        self.bus.unsubscribe(&filter);
        self.transition(GameEvent::AllPlayersConnected)?;
        info!("all players connected");
        self.rules.pacing.pause(2).await;
        Ok(())
    }

    async fn welcome(&self) {
        self.announcer.show_all(&LcdMessage::lines("Welcome to", "The Game"));
        self.announcer.tune_all(melodies::GAME_TUNE);
        self.rules.pacing.pause(5).await;
    }

    async fn current_player(&self) -> Result<Player, ControllerError> {
        self.roster
            .read()
            .await
            .at(self.turn())
            .cloned()
            .ok_or(ControllerError::EmptyRoster)
    }

    async fn play_turn(&self) -> Result<(), ControllerError> {
        let player = self.current_player().await?;
        let id = player.id;
        info!(turn = self.turn(), player = id, "turn started");

        if player.skip_next_turn {
            if let Some(player) = self.roster.write().await.get_mut(id) {
                player.skip_next_turn = false;
            }
            info!(player = id, "turn skipped");
            self.announcer.show_split(
                id,
                &LcdMessage::line("Turn skipped!"),
                &LcdMessage::lines(&format!("Player {id}'s"), "turn skipped!"),
            );
            self.rules.pacing.pause(3).await;
            return Ok(());
        }

        self.announcer.turn_indicator(id, true);
        self.announcer.tune(id, melodies::YOUR_TURN_SOUND);
        self.announcer.show_split(
            id,
            &LcdMessage::line("Your turn!"),
            &LcdMessage::line(&format!("Player {id} turn!")),
        );
        self.rules.pacing.pause(3).await;

        let steps = self.roll_dice(id).await?;
        self.move_player(id, steps, Direction::Forward).await?;
        self.resolve_cell(id).await?;
        self.announcer.turn_indicator(id, false);
        Ok(())
    }

    async fn roll_dice(&self, id: PlayerId) -> Result<u32, ControllerError> {
        let topic = Channel::Button.topic(id);
        self.announcer.show(id, &LcdMessage::lines("Roll the dice", "Press the button"));

        self.dice_gate.arm();
        self.transition(GameEvent::DiceRequested)?;
        self.bus.subscribe(&topic);
        self.dice_gate.wait().await;
        self.bus.unsubscribe(&topic);

        let result = self.roll(&self.rules.dice);
        info!(player = id, result, "dice rolled");
        self.announcer.show_split(
            id,
            &LcdMessage::lines("Dice rolled", &result.to_string()),
            &LcdMessage::lines(&format!("Player {id}"), &format!("rolled {result}")),
        );
        self.rules.pacing.pause(4).await;
        Ok(result)
    }

    /// Wait for one hall-sensor pulse per step, then commit the move.
    async fn move_player(
        &self,
        id: PlayerId,
        steps: u32,
        direction: Direction,
    ) -> Result<(), ControllerError> {
        let topic = Channel::Movement.topic(id);
        self.movement_gate.arm();
        self.transition(GameEvent::MovementRequested)?;
        self.bus.subscribe(&topic);
        for left in (1..=steps).rev() {
            let remaining = format!("{left} moves left");
            self.announcer.show_split(
                id,
                &LcdMessage::lines("Move the meeple.", &remaining),
                &LcdMessage::lines(&format!("P{id} moving."), &remaining),
            );
            // Each wait consumes its pulse, leaving the gate armed for the next step.
            self.movement_gate.wait().await;
            self.announcer.tune_all(melodies::MOVE_SOUND);
        }
        self.bus.unsubscribe(&topic);

        let position = {
            let mut roster = self.roster.write().await;
            let Some(player) = roster.get_mut(id) else {
                return Err(ControllerError::EmptyRoster);
            };
            let size = self.board.size();
            match direction {
                Direction::Forward => player.move_forward(steps as usize, size),
                Direction::Backward => player.move_backward(steps as usize, size),
            }
            player.position
        };
        self.transition(GameEvent::CellReached)?;

        info!(player = id, position, cell = %self.board.cell(position), "player moved");
        self.announcer.show_split(
            id,
            &LcdMessage::lines("Moved to", &format!("cell {position}")),
            &LcdMessage::lines(&format!("Player {id} moved"), &format!("to cell {position}")),
        );
        self.rules.pacing.pause(4).await;
        Ok(())
    }

    async fn cell_of(&self, id: PlayerId) -> CellEffect {
        let position = self
            .roster
            .read()
            .await
            .get(id)
            .map(|player| player.position)
            .unwrap_or_default();
        self.board.cell(position)
    }

    /// Apply the landing cell and whatever it chains into.
    async fn resolve_cell(&self, id: PlayerId) -> Result<(), ControllerError> {
        let mut pending = Some(self.cell_of(id).await);
        while let Some(effect) = pending {
            pending = self.apply_effect(id, effect).await?;
        }
        Ok(())
    }

    /// Apply one effect; returns the follow-up effect, if any.
    async fn apply_effect(
        &self,
        id: PlayerId,
        effect: CellEffect,
    ) -> Result<Option<CellEffect>, ControllerError> {
        info!(player = id, effect = %effect, "cell effect");
        let pacing = self.rules.pacing;
        let landed = |tune: melodies::Tune| {
            self.announcer.tune_all(tune);
            self.announcer.show_split(
                id,
                &LcdMessage::line(effect.label()),
                &LcdMessage::lines(
                    &format!("Player {id} landed"),
                    &format!("on {}", effect.label()),
                ),
            );
        };

        match effect {
            CellEffect::Start => Ok(None),
            CellEffect::GainPoints => {
                landed(melodies::GAIN_POINTS_TUNE);
                pacing.pause(4).await;
                let points = self.roll(&self.rules.gain_points);
                self.update_player(id, |player| player.gain_points(points)).await;
                self.announcer.show_split(
                    id,
                    &LcdMessage::lines("You gained", &format!("{points:2} points")),
                    &LcdMessage::lines(
                        &format!("Player {id} gained"),
                        &format!("{points:2} points"),
                    ),
                );
                pacing.pause(4).await;
                Ok(None)
            }
            CellEffect::LosePoints => {
                landed(melodies::LOSE_POINTS_TUNE);
                pacing.pause(4).await;
                let points = self.roll(&self.rules.lose_points);
                self.update_player(id, |player| player.lose_points(points)).await;
                self.announcer.show_split(
                    id,
                    &LcdMessage::lines("You lost", &format!("{points:2} points")),
                    &LcdMessage::lines(&format!("Player {id} lost"), &format!("{points:2} points")),
                );
                pacing.pause(4).await;
                Ok(None)
            }
            CellEffect::MoveForward | CellEffect::MoveBackward => {
                let (tune, direction, label) = match effect {
                    CellEffect::MoveForward => {
                        (melodies::MOVE_FORWARD_TUNE, Direction::Forward, "forward")
                    }
                    _ => (melodies::MOVE_BACKWARD_TUNE, Direction::Backward, "back"),
                };
                landed(tune);
                pacing.pause(4).await;
                let steps = self.roll(&self.rules.cell_moves);
                self.announcer.show_split(
                    id,
                    &LcdMessage::lines(&format!("Move {steps}"), &format!("steps {label}")),
                    &LcdMessage::lines(
                        &format!("Player {id} moves"),
                        &format!("{steps} steps {label}"),
                    ),
                );
                pacing.pause(4).await;
                self.move_player(id, steps, direction).await?;
                Ok(Some(self.cell_of(id).await))
            }
            CellEffect::Minigame => {
                self.minigame(id).await?;
                Ok(None)
            }
            CellEffect::Death => {
                landed(melodies::DEATH_TUNE);
                pacing.pause(4).await;
                self.announcer.show_split(
                    id,
                    &LcdMessage::line("You died"),
                    &LcdMessage::line(&format!("Player {id} died")),
                );
                pacing.pause(2).await;
                self.update_player(id, |player| player.lose_points(player.score)).await;
                self.announcer.show_split(
                    id,
                    &LcdMessage::lines("You lose", "all your points"),
                    &LcdMessage::lines(&format!("Player {id} lost"), "all points"),
                );
                pacing.pause(4).await;
                Ok(None)
            }
            CellEffect::SkipTurn => {
                landed(melodies::SKIP_TURN_TUNE);
                pacing.pause(4).await;
                self.announcer.show(id, &LcdMessage::lines("You will lose", "next turn"));
                pacing.pause(2).await;
                self.update_player(id, |player| player.skip_next_turn = true).await;
                Ok(None)
            }
            CellEffect::RandomEvent => {
                landed(melodies::RANDOM_EVENT_TUNE);
                pacing.pause(4).await;
                let labels = CellEffect::RANDOM_CANDIDATES.map(CellEffect::label);
                self.announcer.animate_options(&labels, pacing).await;
                let picked = CellEffect::random_event(&mut *self.rng());
                info!(player = id, picked = %picked, "random event resolved");
                Ok(Some(picked))
            }
        }
    }

    async fn update_player<F>(&self, id: PlayerId, update: F)
    where
        F: FnOnce(&mut Player),
    {
        if let Some(player) = self.roster.write().await.get_mut(id) {
            update(player);
        }
    }

    async fn minigame(&self, id: PlayerId) -> Result<(), ControllerError> {
        self.announcer.tune_all(melodies::MINIGAME_CELL_TUNE);
        self.announcer.show_all(&LcdMessage::line("Minigame Time!"));
        self.rules.pacing.pause(4).await;

        let participants = self.roster.read().await.ids();
        let options = MinigameKind::available(participants.len());
        let Some(&fallback) = options.first() else {
            debug!(players = participants.len(), "no minigame fits the roster");
            return Ok(());
        };
        let kind = if self.manual_election {
            self.elect_minigame(id, options).await?
        } else {
            let labels: Vec<&str> = options.iter().map(|kind| kind.label()).collect();
            self.announcer.animate_options(&labels, self.rules.pacing).await;
            let index = self.rng().random_range(0..options.len());
            options.get(index).copied().unwrap_or(fallback)
        };

        let core = SessionCore::new(
            participants.clone(),
            self.announcer.with_stations(participants),
            self.rules.pacing,
        );
        let game = kind.create(core, &mut *self.rng());
        let winners = self
            .minigames
            .play(game, || self.transition(GameEvent::MinigameStarted).map(|_| ()))
            .await?;
        self.transition(GameEvent::MinigameFinished)?;

        let award = {
            let mut roster = self.roster.write().await;
            scoring::award_minigame(&mut roster, &winners, self.rules.minigame_reward)
        };
        info!(game = %kind, award = ?award, "minigame rewarded");
        self.announce_award(&award).await;
        self.rules.pacing.pause(4).await;
        Ok(())
    }

    /// Let the current player cycle through `options` and pick one.
    async fn elect_minigame(
        &self,
        id: PlayerId,
        options: Vec<MinigameKind>,
    ) -> Result<MinigameKind, ControllerError> {
        let first = options[0];
        *self.election() = Election {
            options,
            index: 0,
            choice: None,
        };
        self.announcer.show_all(&LcdMessage::line(first.label()));

        let topic = Channel::Button.topic(id);
        self.election_gate.arm();
        self.transition(GameEvent::MinigameElectionStarted)?;
        self.bus.subscribe(&topic);
        self.election_gate.wait().await;
        self.bus.unsubscribe(&topic);

        let mut election = self.election();
        let choice = election.choice.take().unwrap_or(first);
        election.options.clear();
        Ok(choice)
    }

    async fn announce_award(&self, award: &MinigameAward) {
        let pacing = self.rules.pacing;
        match award {
            MinigameAward::Nobody => {
                self.announcer.show_all(&LcdMessage::lines("No winners", "0 points"));
                self.announcer.tune_all(melodies::LOSING_SOUND);
            }
            MinigameAward::Single { id, points } => {
                let id = *id;
                self.announcer.tune(id, melodies::WINNING_SOUND);
                self.announcer.play_others(id, &melodies::LOSING_SOUND.into());
                self.announcer.show_split(
                    id,
                    &LcdMessage::line("You won!"),
                    &LcdMessage::line("You lost"),
                );
                pacing.pause(3).await;
                self.announcer.show_split(
                    id,
                    &LcdMessage::lines("Great job!", "Congratulations!"),
                    &LcdMessage::lines("Better luck", "next time"),
                );
                pacing.pause(3).await;
                self.announcer.show_split(
                    id,
                    &LcdMessage::lines("You won", &format!("{points} points")),
                    &LcdMessage::lines(&format!("Player {id} won"), &format!("{points} points")),
                );
                pacing.pause(3).await;
            }
            MinigameAward::Shared { ids, points_each } => {
                self.announcer.show_all(&LcdMessage::lines(
                    "Draw!",
                    &format!("{points_each} points each"),
                ));
                for &id in ids {
                    self.announcer.tune(id, melodies::WINNING_SOUND);
                }
            }
        }
    }

    /// Scores of every player, two per screen.
    async fn show_stats(&self) {
        let players = self.players().await;
        for page in players.chunks(2) {
            let line = |player: &Player| format!("P{}: {} points", player.id, player.score);
            let top = page.first().map(line).unwrap_or_default();
            let down = page.get(1).map(line).unwrap_or_default();
            self.announcer.show_all(&LcdMessage::raw(top, down));
            self.rules.pacing.pause(3).await;
        }
    }

    async fn check_winner(&self) -> Result<Option<GameOutcome>, ControllerError> {
        let outcome = {
            let roster = self.roster.read().await;
            scoring::check_winner(roster.players(), self.win_points)
        };
        let Some(outcome) = outcome else {
            return Ok(None);
        };
        self.transition(GameEvent::GameWon)?;

        let verdict = match &outcome {
            GameOutcome::Winner { id, score } => {
                info!(winner = id, score, "game over");
                format!("Player {id} wins!")
            }
            GameOutcome::Draw { ids, score } => {
                info!(players = ?ids, score, "game over in a draw");
                "Draw!".to_string()
            }
        };
        self.announcer.show_all(&LcdMessage::lines("Game Over", &verdict));
        self.announcer.tune_all(melodies::GAME_OVER_TUNE);
        self.rules.pacing.pause(5).await;
        Ok(Some(outcome))
    }

    async fn advance_turn(&self) {
        let count = self.roster.read().await.len().max(1);
        let next = (self.turn() + 1) % count;
        self.turn.store(next, Ordering::Release);
    }
}

impl Dispatcher for GameController {
    fn dispatch(&self, event: InboundEvent) -> BoxFuture<'_, ()> {
        Box::pin(self.route(event))
    }
}
