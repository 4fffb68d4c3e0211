//! Number guesser: everyone secretly dials a number; the closest guess that
//! does not overshoot the hidden target wins.

use std::{
    collections::BTreeMap,
    ops::RangeInclusive,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures::future::BoxFuture;
use rand::Rng;
use tracing::{debug, info};

use super::{Minigame, MinigameKind, SessionCore};
use crate::{
    bus::{InboundEvent, PlayerId},
    dto::peripheral::{LcdMessage, PressKind},
};

pub const GUESS_RANGE: RangeInclusive<u32> = 1..=5;

const INTRO: &[(&str, &str)] = &[
    ("Number Guesser", ""),
    ("Guess a number", "from 1 to 5"),
    ("Don't go over", "the secret one!"),
    ("Short: +1", "Long: Lock in"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Guess {
    value: u32,
    locked: bool,
}

#[derive(Debug)]
struct GuessState {
    guesses: BTreeMap<PlayerId, Guess>,
    done: bool,
}

pub struct NumberGuesser {
    core: SessionCore,
    target: u32,
    state: Mutex<GuessState>,
}

impl NumberGuesser {
    pub fn new<R: Rng>(core: SessionCore, rng: &mut R) -> Self {
        let target = rng.random_range(GUESS_RANGE);
        Self::with_target(core, target)
    }

    pub fn with_target(core: SessionCore, target: u32) -> Self {
        debug!(secret = target, "number guesser set up");
        let guesses = core
            .participants()
            .iter()
            .map(|&id| {
                (
                    id,
                    Guess {
                        value: *GUESS_RANGE.start(),
                        locked: false,
                    },
                )
            })
            .collect();
        Self {
            core,
            target,
            state: Mutex::new(GuessState {
                guesses,
                done: false,
            }),
        }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Current guess of a participant.
    pub fn guess(&self, id: PlayerId) -> Option<u32> {
        self.lock().guesses.get(&id).map(|guess| guess.value)
    }

    fn lock(&self) -> MutexGuard<'_, GuessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn show_guess(&self, id: PlayerId, guess: Guess) {
        let down = if guess.locked { "Locked in" } else { "Long: lock in" };
        self.core
            .announcer()
            .show(id, &LcdMessage::lines(&format!("Guess: {}", guess.value), down));
    }
}

/// Players whose guess is the highest one not above `target`.
pub fn closest_without_going_over(
    guesses: impl IntoIterator<Item = (PlayerId, u32)>,
    target: u32,
) -> Vec<PlayerId> {
    let eligible: Vec<(PlayerId, u32)> = guesses
        .into_iter()
        .filter(|&(_, value)| value <= target)
        .collect();
    let Some(best) = eligible.iter().map(|&(_, value)| value).max() else {
        return Vec::new();
    };
    eligible
        .into_iter()
        .filter(|&(_, value)| value == best)
        .map(|(id, _)| id)
        .collect()
}

impl Minigame for NumberGuesser {
    fn kind(&self) -> MinigameKind {
        MinigameKind::NumberGuesser
    }

    fn core(&self) -> &SessionCore {
        &self.core
    }

    fn introduce(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.core.introduce(INTRO))
    }

    fn start(&self) {
        let state = self.lock();
        for (&id, &guess) in &state.guesses {
            self.show_guess(id, guess);
        }
    }

    fn on_event(&self, event: &InboundEvent) {
        let Some((id, kind)) = self.core.press(event) else {
            return;
        };
        let mut state = self.lock();
        if state.done {
            return;
        }
        let Some(guess) = state.guesses.get_mut(&id) else {
            return;
        };
        if guess.locked {
            debug!(station = id, "press after lock-in ignored");
            return;
        }

        match kind {
            PressKind::Short => {
                guess.value = if guess.value >= *GUESS_RANGE.end() {
                    *GUESS_RANGE.start()
                } else {
                    guess.value + 1
                };
            }
            PressKind::Long => {
                guess.locked = true;
                debug!(station = id, guess = guess.value, "guess locked");
            }
        }
        let shown = *guess;
        self.show_guess(id, shown);

        if state.guesses.values().all(|guess| guess.locked) {
            state.done = true;
            info!(secret = self.target, "every guess locked in");
            self.core.termination().finish();
        }
    }

    fn winners(&self) -> Vec<PlayerId> {
        let state = self.lock();
        closest_without_going_over(
            state.guesses.iter().map(|(&id, guess)| (id, guess.value)),
            self.target,
        )
    }

    fn conclude(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.core.announcer().show_all(&LcdMessage::lines(
                "The number was",
                &self.target.to_string(),
            ));
            self.core.pacing().pause(3).await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::minigames::tests::{press, test_core};

    fn dial(game: &NumberGuesser, id: PlayerId, value: u32) {
        for _ in *GUESS_RANGE.start()..value {
            game.on_event(&press(id, "short"));
        }
        game.on_event(&press(id, "long"));
    }

    #[tokio::test]
    async fn overshooting_guess_is_excluded() {
        let (_bus, core) = test_core(vec![1, 2]);
        let game = NumberGuesser::with_target(core, 3);
        game.start();

        dial(&game, 1, 2);
        assert!(!game.core().termination().is_finished());
        dial(&game, 2, 5);

        assert_eq!(game.run().await, vec![1]);
    }

    #[test]
    fn nobody_under_the_target_means_no_winner() {
        assert!(closest_without_going_over([(1, 4), (2, 5)], 3).is_empty());
    }

    #[test]
    fn equal_best_guesses_share_the_win() {
        assert_eq!(
            closest_without_going_over([(1, 2), (2, 3), (3, 3), (4, 1)], 4),
            vec![2, 3]
        );
    }

    #[test]
    fn guess_wraps_at_the_top_of_the_range() {
        let (_bus, core) = test_core(vec![1, 2]);
        let game = NumberGuesser::with_target(core, 1);
        for _ in 0..5 {
            game.on_event(&press(1, "short"));
        }
        assert_eq!(game.guess(1), Some(1));
    }

    #[test]
    fn locked_guess_cannot_change() {
        let (_bus, core) = test_core(vec![1, 2]);
        let game = NumberGuesser::with_target(core, 1);
        game.on_event(&press(1, "short"));
        game.on_event(&press(1, "long"));
        game.on_event(&press(1, "short"));
        assert_eq!(game.guess(1), Some(2));
        assert!(!game.core().termination().is_finished());
    }

    #[test]
    fn target_stays_in_range() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let (_bus, core) = test_core(vec![1, 2]);
            let game = NumberGuesser::new(core, &mut rng);
            assert!(GUESS_RANGE.contains(&game.target()));
        }
    }
}
