//! Minigame engine: the session contract, the variant registry and the
//! routing slot that hands button events to the running session.

pub mod hot_potato;
pub mod last_stick;
pub mod number_guesser;
pub mod timers;
pub mod tug_of_war;

use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use rand::Rng;
use tracing::{debug, info};

use crate::{
    bus::{Channel, InboundEvent, MessageBus, PlayerId},
    config::Pacing,
    dto::peripheral::{ButtonPayload, LcdMessage, PressKind},
    error::ControllerError,
    services::announcer::Announcer,
    state::gate::WaitGate,
};

use self::{
    hot_potato::HotPotato, last_stick::LastStickStanding, number_guesser::NumberGuesser,
    timers::SessionTimers, tug_of_war::TugOfWar,
};

/// Beats each introduction screen stays up.
const INTRO_BEATS: u32 = 3;

/// A self-contained sub-game played by every participant.
pub trait Minigame: Send + Sync {
    fn kind(&self) -> MinigameKind;

    /// Shared session plumbing.
    fn core(&self) -> &SessionCore;

    /// Scripted rules screens shown before play starts.
    fn introduce(&self) -> BoxFuture<'_, ()>;

    /// Show the opening state and schedule timers. Called once the session
    /// is routed but before any button topic is subscribed.
    fn start(&self);

    /// Handle one button event; only called while this session is routed.
    fn on_event(&self, event: &InboundEvent);

    /// Winning participants, valid once the session terminated.
    fn winners(&self) -> Vec<PlayerId>;

    /// Closing screens shown after termination.
    fn conclude(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Block until the session terminates, tear its timers down and return
    /// the winners.
    fn run(&self) -> BoxFuture<'_, Vec<PlayerId>> {
        Box::pin(async move {
            let core = self.core();
            core.termination.wait().await;
            core.timers.cancel_all();
            self.conclude().await;
            let winners = self.winners();
            info!(game = %self.kind(), winners = ?winners, "minigame finished");
            winners
        })
    }
}

/// Registry of playable minigames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinigameKind {
    HotPotato,
    LastStickStanding,
    NumberGuesser,
    TugOfWar,
}

impl MinigameKind {
    /// Every variant, in name order.
    pub const ALL: [MinigameKind; 4] = [
        MinigameKind::HotPotato,
        MinigameKind::LastStickStanding,
        MinigameKind::NumberGuesser,
        MinigameKind::TugOfWar,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MinigameKind::HotPotato => "Hot Potato",
            MinigameKind::LastStickStanding => "Last Stick",
            MinigameKind::NumberGuesser => "Number Guesser",
            MinigameKind::TugOfWar => "Tug of War",
        }
    }

    /// Whether the variant can be played by `participants` players.
    pub fn supports(self, participants: usize) -> bool {
        match self {
            MinigameKind::TugOfWar => participants == 2,
            _ => participants >= 2,
        }
    }

    /// Variants playable by `participants` players, in name order.
    pub fn available(participants: usize) -> Vec<MinigameKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| kind.supports(participants))
            .collect()
    }

    /// Build a fresh session of this variant.
    pub fn create<R: Rng>(self, core: SessionCore, rng: &mut R) -> Arc<dyn Minigame> {
        match self {
            MinigameKind::HotPotato => Arc::new(HotPotato::new(core, rng)),
            MinigameKind::LastStickStanding => Arc::new(LastStickStanding::new(core)),
            MinigameKind::NumberGuesser => Arc::new(NumberGuesser::new(core, rng)),
            MinigameKind::TugOfWar => Arc::new(TugOfWar::new(core)),
        }
    }
}

impl fmt::Display for MinigameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One-way "session over" flag plus the gate `run` blocks on.
///
/// Exactly one caller of [`finish`](Self::finish) wins; every other code
/// path must check [`is_finished`](Self::is_finished) and back off.
#[derive(Debug, Default)]
pub struct TerminationGate {
    finished: AtomicBool,
    gate: WaitGate,
}

impl TerminationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the flag; `true` only for the first caller.
    pub fn finish(&self) -> bool {
        if self.finished.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.gate.signal();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        self.gate.wait().await;
    }
}

/// Plumbing shared by every session: who plays, how to reach them, timers
/// and the termination gate.
pub struct SessionCore {
    participants: Vec<PlayerId>,
    announcer: Announcer,
    pacing: Pacing,
    timers: SessionTimers,
    termination: Arc<TerminationGate>,
}

impl SessionCore {
    pub fn new(participants: Vec<PlayerId>, announcer: Announcer, pacing: Pacing) -> Self {
        Self {
            participants,
            announcer,
            pacing,
            timers: SessionTimers::new(),
            termination: Arc::new(TerminationGate::new()),
        }
    }

    pub fn participants(&self) -> &[PlayerId] {
        &self.participants
    }

    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn timers(&self) -> &SessionTimers {
        &self.timers
    }

    pub fn termination(&self) -> &Arc<TerminationGate> {
        &self.termination
    }

    /// Participants other than `loser`.
    pub fn everyone_but(&self, loser: PlayerId) -> Vec<PlayerId> {
        self.participants
            .iter()
            .copied()
            .filter(|&id| id != loser)
            .collect()
    }

    /// Decode a button press from a participant of a live session.
    ///
    /// Presses after termination, from outsiders, on other topics or with
    /// malformed payloads are dropped here.
    pub fn press(&self, event: &InboundEvent) -> Option<(PlayerId, PressKind)> {
        if self.termination.is_finished() {
            debug!(topic = %event.topic, "press after termination ignored");
            return None;
        }
        let (id, channel) = event.station()?;
        if channel != Channel::Button {
            debug!(topic = %event.topic, "non-button event ignored by minigame");
            return None;
        }
        if !self.participants.contains(&id) {
            debug!(station = id, "press from non-participant ignored");
            return None;
        }
        let Some(kind) = ButtonPayload::press_kind(&event.payload) else {
            debug!(station = id, payload = %event.payload, "malformed button payload dropped");
            return None;
        };
        Some((id, kind))
    }

    /// Show each screen to everybody, then count down.
    pub async fn introduce(&self, screens: &[(&str, &str)]) {
        for (top, down) in screens {
            self.announcer.show_all(&LcdMessage::lines(top, down));
            self.pacing.pause(INTRO_BEATS).await;
        }
        self.announcer.countdown(self.pacing).await;
    }
}

/// Routes button events to the running session and enforces the
/// one-session-at-a-time rule.
pub struct MinigameEngine {
    bus: Arc<dyn MessageBus>,
    active: Mutex<Option<Arc<dyn Minigame>>>,
}

impl MinigameEngine {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self {
            bus,
            active: Mutex::new(None),
        }
    }

    /// Whether a session is currently routed.
    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Hand an event to the routed session; `false` when there is none.
    pub fn forward(&self, event: &InboundEvent) -> bool {
        let session = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match session {
            Some(session) => {
                session.on_event(event);
                true
            }
            None => false,
        }
    }

    /// Play one session to completion.
    ///
    /// `go_live` runs after the session is routed and before button topics
    /// are subscribed; it flips the global phase. On return the session is
    /// unrouted, unsubscribed and has no pending timers.
    pub async fn play<F>(
        &self,
        game: Arc<dyn Minigame>,
        go_live: F,
    ) -> Result<Vec<PlayerId>, ControllerError>
    where
        F: FnOnce() -> Result<(), ControllerError>,
    {
        info!(game = %game.kind(), participants = ?game.core().participants(), "minigame starting");
        game.introduce().await;

        {
            let mut slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(ControllerError::SessionAlreadyActive);
            }
            *slot = Some(Arc::clone(&game));
        }
        if let Err(err) = go_live() {
            self.teardown(&game, false);
            return Err(err);
        }

        game.start();
        let filter = Channel::Button.any_station();
        self.bus.subscribe(&filter);
        let winners = game.run().await;
        self.teardown(&game, true);
        Ok(winners)
    }

    fn teardown(&self, game: &Arc<dyn Minigame>, subscribed: bool) {
        if subscribed {
            self.bus.unsubscribe(&Channel::Button.any_station());
        }
        game.core().timers().cancel_all();
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::testing::RecordingBus;

    /// Session core over a recording bus with no display pauses.
    pub(crate) fn test_core(participants: Vec<PlayerId>) -> (Arc<RecordingBus>, SessionCore) {
        let bus = Arc::new(RecordingBus::new());
        let announcer = Announcer::new(bus.clone(), participants.clone());
        let core = SessionCore::new(participants, announcer, Pacing::instant());
        (bus, core)
    }

    pub(crate) fn press(id: PlayerId, kind: &str) -> InboundEvent {
        InboundEvent::new(
            Channel::Button.topic(id),
            format!(r#"{{"type":"{kind}"}}"#),
        )
    }

    #[test]
    fn registry_respects_participant_counts() {
        assert_eq!(MinigameKind::available(2), MinigameKind::ALL.to_vec());
        assert!(!MinigameKind::available(3).contains(&MinigameKind::TugOfWar));
        assert!(MinigameKind::available(1).is_empty());
    }

    #[test]
    fn termination_has_a_single_winner() {
        let gate = TerminationGate::new();
        assert!(gate.finish());
        assert!(!gate.finish());
        assert!(gate.is_finished());
    }

    #[test]
    fn press_filtering() {
        let (_bus, core) = test_core(vec![1, 2]);
        assert_eq!(core.press(&press(1, "short")), Some((1, PressKind::Short)));
        assert_eq!(core.press(&press(3, "short")), None);
        assert_eq!(
            core.press(&InboundEvent::new(Channel::Button.topic(1), "garbage")),
            None
        );
        assert_eq!(
            core.press(&InboundEvent::new(Channel::Movement.topic(1), "")),
            None
        );
        core.termination().finish();
        assert_eq!(core.press(&press(1, "long")), None);
    }

    #[tokio::test]
    async fn engine_routes_only_while_playing() {
        let bus = Arc::new(RecordingBus::new());
        let engine = Arc::new(MinigameEngine::new(bus.clone()));
        let (_, core) = test_core(vec![1, 2]);
        let game = Arc::new(TugOfWar::new(core));

        assert!(!engine.forward(&press(1, "short")));

        let play = {
            let engine = Arc::clone(&engine);
            let game: Arc<dyn Minigame> = game.clone();
            tokio::spawn(async move { engine.play(game, || Ok(())).await })
        };
        while !engine.is_active() || bus.subscriptions().is_empty() {
            tokio::task::yield_now().await;
        }

        for _ in 0..6 {
            assert!(engine.forward(&press(2, "long")));
        }
        let winners = play.await.unwrap().unwrap();
        assert_eq!(winners, vec![2]);

        assert!(!engine.is_active());
        assert_eq!(
            bus.history(),
            vec![
                format!("+{}", Channel::Button.any_station()),
                format!("-{}", Channel::Button.any_station()),
            ]
        );
        assert_eq!(game.core().timers().pending(), 0);
    }

    #[tokio::test]
    async fn engine_refuses_a_second_session() {
        let bus = Arc::new(RecordingBus::new());
        let engine = MinigameEngine::new(bus.clone());
        let (_, first) = test_core(vec![1, 2]);
        let (_, second) = test_core(vec![1, 2]);
        *engine.active.lock().unwrap() = Some(Arc::new(TugOfWar::new(first)));

        let result = engine.play(Arc::new(TugOfWar::new(second)), || Ok(())).await;
        assert!(matches!(result, Err(ControllerError::SessionAlreadyActive)));
    }

    #[tokio::test]
    async fn failed_go_live_unroutes_the_session() {
        let bus = Arc::new(RecordingBus::new());
        let engine = MinigameEngine::new(bus.clone());
        let (_, core) = test_core(vec![1, 2]);

        let result = engine
            .play(Arc::new(TugOfWar::new(core)), || {
                Err(ControllerError::EmptyRoster)
            })
            .await;
        assert!(matches!(result, Err(ControllerError::EmptyRoster)));
        assert!(!engine.is_active());
        assert!(bus.history().is_empty());
    }
}
