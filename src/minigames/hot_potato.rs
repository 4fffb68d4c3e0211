//! Hot potato: pass the potato before the hidden countdown runs out.

use std::{
    ops::RangeInclusive,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::future::BoxFuture;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Minigame, MinigameKind, SessionCore, timers::TimerId};
use crate::{
    bus::{InboundEvent, PlayerId},
    dto::peripheral::LcdMessage,
};

/// Bounds of the hidden countdown, in seconds.
const COUNTDOWN_SECS: RangeInclusive<u64> = 10..=30;
/// Alert interval at the start of the countdown.
const ALERT_BASE: Duration = Duration::from_millis(1_500);
/// Added to every alert interval so the alert never degenerates into a tone.
const ALERT_FLOOR: Duration = Duration::from_millis(100);

const ALERT_TONE: u32 = 1_000;
const PASS_TONE: u32 = 500;
const EXPLOSION_TONE: u32 = 100;

const INTRO: &[(&str, &str)] = &[
    ("Hot Potato!", ""),
    ("Press button to", "pass the potato!"),
    ("Pass it quickly!", "It's hot!"),
    ("Avoid holding it", "when it blows!"),
];

/// Gap before the next alert given the countdown left.
pub fn alert_interval(remaining: Duration, total: Duration) -> Duration {
    if total.is_zero() {
        return ALERT_FLOOR;
    }
    let ratio = remaining.as_secs_f64() / total.as_secs_f64();
    ALERT_BASE.mul_f64(ratio.clamp(0.0, 1.0)) + ALERT_FLOOR
}

#[derive(Debug)]
struct PotatoState {
    /// Index into the participant list.
    holder: usize,
    deadline: Option<Instant>,
    alert: Option<TimerId>,
    loser: Option<PlayerId>,
}

pub struct HotPotato {
    core: SessionCore,
    countdown: Duration,
    state: Arc<Mutex<PotatoState>>,
}

impl HotPotato {
    /// Random countdown and random first holder.
    pub fn new<R: Rng>(core: SessionCore, rng: &mut R) -> Self {
        let countdown = Duration::from_secs(rng.random_range(COUNTDOWN_SECS));
        let holder = rng.random_range(0..core.participants().len().max(1));
        Self::with_setup(core, countdown, holder)
    }

    /// Fixed countdown and first holder index.
    pub fn with_setup(core: SessionCore, countdown: Duration, holder: usize) -> Self {
        debug!(
            countdown_secs = countdown.as_secs(),
            holder = core.participants().get(holder).copied(),
            "hot potato set up"
        );
        Self {
            core,
            countdown,
            state: Arc::new(Mutex::new(PotatoState {
                holder,
                deadline: None,
                alert: None,
                loser: None,
            })),
        }
    }

    /// Participant currently holding the potato.
    pub fn holder(&self) -> Option<PlayerId> {
        let holder = self.lock().holder;
        self.core.participants().get(holder).copied()
    }

    fn lock(&self) -> MutexGuard<'_, PotatoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_holder(&self, holder: PlayerId) {
        self.core.announcer().show_split(
            holder,
            &LcdMessage::lines("You have", "the potato!"),
            &LcdMessage::lines(&format!("Player {holder} has"), "the potato!"),
        );
    }

    /// Replace the alert with a fresh one paced from the time left.
    fn restart_alert(&self, state: &mut PotatoState) {
        if let Some(previous) = state.alert.take() {
            self.core.timers().cancel(previous);
        }
        let Some(deadline) = state.deadline else {
            return;
        };
        let total = self.countdown;
        let first = alert_interval(deadline.saturating_duration_since(Instant::now()), total);
        let termination = Arc::clone(self.core.termination());
        let announcer = self.core.announcer().clone();
        let id = self.core.timers().schedule_periodic(first, move || {
            if termination.is_finished() {
                return None;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            announcer.beep_all(ALERT_TONE, 100);
            Some(alert_interval(remaining, total))
        });
        state.alert = Some(id);
    }

    fn schedule_explosion(&self) {
        let state = Arc::clone(&self.state);
        let termination = Arc::clone(self.core.termination());
        let announcer = self.core.announcer().clone();
        let participants = self.core.participants().to_vec();
        self.core.timers().schedule_once(self.countdown, move || {
            let loser = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if !termination.finish() {
                    return;
                }
                let loser = participants.get(state.holder).copied();
                state.loser = loser;
                loser
            };
            info!(loser = ?loser, "the potato exploded");
            announcer.beep_all(EXPLOSION_TONE, 2_000);
            announcer.show_all(&LcdMessage::lines("BOOM!", "Potato exploded!"));
        });
    }
}

impl Minigame for HotPotato {
    fn kind(&self) -> MinigameKind {
        MinigameKind::HotPotato
    }

    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn introduce(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.core.introduce(INTRO))
    }

    fn start(&self) {
        let holder = {
            let mut state = self.lock();
            state.deadline = Some(Instant::now() + self.countdown);
            self.restart_alert(&mut state);
            self.core.participants().get(state.holder).copied()
        };
        self.schedule_explosion();
        if let Some(holder) = holder {
            self.show_holder(holder);
        }
    }

    fn on_event(&self, event: &InboundEvent) {
        let Some((id, _)) = self.core.press(event) else {
            return;
        };
        let participants = self.core.participants();
        let next = {
            let mut state = self.lock();
            // The explosion flips the flag under this lock; re-check here.
            if self.core.termination().is_finished() {
                debug!(station = id, "pass after explosion ignored");
                return;
            }
            if participants.get(state.holder) != Some(&id) {
                debug!(station = id, "press from non-holder ignored");
                return;
            }
            state.holder = (state.holder + 1) % participants.len();
            self.restart_alert(&mut state);
            participants[state.holder]
        };
        debug!(from = id, to = next, "potato passed");
        self.core.announcer().beep(next, PASS_TONE, 100);
        self.show_holder(next);
    }

    fn winners(&self) -> Vec<PlayerId> {
        match self.lock().loser {
            Some(loser) => self.core.everyone_but(loser),
            None => Vec::new(),
        }
    }

    fn conclude(&self) -> BoxFuture<'_, ()> {
        let pacing = self.core.pacing();
        Box::pin(async move { pacing.pause(3).await })
    }
}
