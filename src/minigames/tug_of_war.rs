//! Tug of war: two players hammer their buttons to drag the rope past the
//! threshold on their side.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tracing::{debug, info};

use super::{Minigame, MinigameKind, SessionCore};
use crate::{
    bus::{InboundEvent, PlayerId},
    dto::peripheral::{LCD_WIDTH, LcdMessage, PressKind},
};

/// Absolute tally that ends the game.
pub const THRESHOLD: i32 = 16;
/// Tally change per press.
pub const PULL: i32 = 3;

const HEADER: &str = "P1-Tug of War-P2";

const INTRO: &[(&str, &str)] = &[
    ("Tug of War", ""),
    ("Pull the rope", "to your side"),
    ("Long: Pull the", "rope"),
];

#[derive(Debug, Default)]
struct RopeState {
    /// Negative favours the first participant, positive the second.
    tally: i32,
    winner: Option<PlayerId>,
}

pub struct TugOfWar {
    core: SessionCore,
    state: Mutex<RopeState>,
}

impl TugOfWar {
    pub fn new(core: SessionCore) -> Self {
        Self {
            core,
            state: Mutex::new(RopeState::default()),
        }
    }

    pub fn tally(&self) -> i32 {
        self.lock().tally
    }

    fn lock(&self) -> MutexGuard<'_, RopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Rope drawn across a display line, slack on the losing side.
fn rope(tally: i32) -> String {
    let shift = (tally.unsigned_abs() as usize).min(LCD_WIDTH);
    let taut = "-".repeat(LCD_WIDTH - shift);
    let slack = " ".repeat(shift);
    if tally < 0 {
        taut + &slack
    } else {
        slack + &taut
    }
}

impl Minigame for TugOfWar {
    fn kind(&self) -> MinigameKind {
        MinigameKind::TugOfWar
    }

    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn introduce(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.core.introduce(INTRO))
    }

    fn start(&self) {
        self.core
            .announcer()
            .show_all(&LcdMessage::raw(HEADER, rope(0)));
    }

    fn on_event(&self, event: &InboundEvent) {
        let Some((id, kind)) = self.core.press(event) else {
            return;
        };
        if kind != PressKind::Long {
            debug!(station = id, "short press does not pull");
            return;
        }
        let pull = match self.core.participants().iter().position(|&p| p == id) {
            Some(0) => -PULL,
            Some(1) => PULL,
            _ => {
                debug!(station = id, "press from a third player ignored");
                return;
            }
        };

        let mut state = self.lock();
        if state.winner.is_some() {
            return;
        }
        state.tally += pull;
        let tally = state.tally;
        debug!(station = id, tally, "rope pulled");
        self.core.announcer().beep(id, 500, 100);
        self.core
            .announcer()
            .show_all(&LcdMessage::raw(HEADER, rope(tally)));

        if tally.abs() >= THRESHOLD {
            state.winner = Some(id);
            info!(winner = id, tally, "rope pulled over the line");
            self.core.termination().finish();
        }
    }

    fn winners(&self) -> Vec<PlayerId> {
        self.lock().winner.into_iter().collect()
    }

    fn conclude(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let pacing = self.core.pacing();
            pacing.pause(2).await;
            self.core
                .announcer()
                .show_all(&LcdMessage::lines("Tug of War", "finished!"));
            pacing.pause(3).await;
        })
    }
}
