//! Last stick standing: players take turns removing sticks; whoever takes
//! the last one loses.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use tracing::{debug, info};

use super::{Minigame, MinigameKind, SessionCore};
use crate::{
    bus::{InboundEvent, PlayerId},
    dto::peripheral::{LCD_WIDTH, LcdMessage, PressKind},
};

pub const INITIAL_PILE: u32 = 12;
pub const MAX_TAKE: u32 = 2;

const INTRO: &[(&str, &str)] = &[
    ("Last Stick", "Standing"),
    ("If you take", "the last stick"),
    ("You lose!", ""),
    ("Short:", "Take 1-2 sticks"),
    ("Long:", "Confirm"),
];

#[derive(Debug)]
struct PileState {
    pile: u32,
    take: u32,
    /// Index of the player on turn.
    current: usize,
    loser: Option<PlayerId>,
}

pub struct LastStickStanding {
    core: SessionCore,
    state: Mutex<PileState>,
}

impl LastStickStanding {
    pub fn new(core: SessionCore) -> Self {
        Self::with_pile(core, INITIAL_PILE)
    }

    pub fn with_pile(core: SessionCore, pile: u32) -> Self {
        Self {
            core,
            state: Mutex::new(PileState {
                pile,
                take: 1,
                current: 0,
                loser: None,
            }),
        }
    }

    /// Sticks left.
    pub fn pile(&self) -> u32 {
        self.lock().pile
    }

    /// Amount the current player would take on commit.
    pub fn take(&self) -> u32 {
        self.lock().take
    }

    fn lock(&self) -> MutexGuard<'_, PileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_turn(&self, state: &PileState) {
        let Some(&current) = self.core.participants().get(state.current) else {
            return;
        };
        let sticks = sticks_visual(state.pile);
        self.core.announcer().show_split(
            current,
            &LcdMessage::raw(format!("Take: {} sticks", state.take), sticks.clone()),
            &LcdMessage::raw(format!("Wait for P{current}"), sticks),
        );
    }
}

/// One bar per stick, count right-aligned.
fn sticks_visual(pile: u32) -> String {
    let bars = (pile as usize).min(LCD_WIDTH - 2);
    format!(
        "{}{:>width$}",
        "|".repeat(bars),
        pile,
        width = LCD_WIDTH - bars
    )
}

impl Minigame for LastStickStanding {
    fn kind(&self) -> MinigameKind {
        MinigameKind::LastStickStanding
    }

    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn introduce(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.core.introduce(INTRO))
    }

    fn start(&self) {
        let state = self.lock();
        debug!(pile = state.pile, "last stick standing started");
        self.show_turn(&state);
    }

    fn on_event(&self, event: &InboundEvent) {
        let Some((id, kind)) = self.core.press(event) else {
            return;
        };
        let mut state = self.lock();
        if state.loser.is_some() {
            return;
        }
        if self.core.participants().get(state.current) != Some(&id) {
            debug!(station = id, "press out of turn ignored");
            return;
        }

        match kind {
            PressKind::Short => {
                state.take = if state.pile > MAX_TAKE {
                    state.take % MAX_TAKE + 1
                } else {
                    1
                };
                debug!(station = id, take = state.take, "take amount changed");
                self.show_turn(&state);
            }
            PressKind::Long => {
                let taken = state.take.min(state.pile);
                state.pile -= taken;
                debug!(station = id, taken, pile = state.pile, "sticks taken");
                if state.pile > 0 {
                    state.current = (state.current + 1) % self.core.participants().len();
                    state.take = 1;
                    self.show_turn(&state);
                } else {
                    state.loser = Some(id);
                    info!(loser = id, "last stick taken");
                    self.core.termination().finish();
                }
            }
        }
    }

    fn winners(&self) -> Vec<PlayerId> {
        match self.lock().loser {
            Some(loser) => self.core.everyone_but(loser),
            None => Vec::new(),
        }
    }

    fn conclude(&self) -> BoxFuture<'_, ()> {
        let pacing = self.core.pacing();
        Box::pin(async move { pacing.pause(2).await })
    }
}
