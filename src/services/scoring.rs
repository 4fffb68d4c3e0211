//! Win detection and minigame reward distribution.

use crate::{
    bus::PlayerId,
    state::player::{Player, Roster},
};

/// Result of a win check once somebody reached the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameOutcome {
    /// A single player holds the highest qualifying score.
    Winner { id: PlayerId, score: u32 },
    /// Several qualifying players share the highest score.
    Draw { ids: Vec<PlayerId>, score: u32 },
}

/// Decide whether the game is over.
///
/// Players at or above `threshold` qualify; the highest score among them wins
/// and a tie on that score is a draw. `None` while nobody qualifies.
pub fn check_winner(players: &[Player], threshold: u32) -> Option<GameOutcome> {
    let best = players
        .iter()
        .filter(|player| player.score >= threshold)
        .map(|player| player.score)
        .max()?;

    let leaders: Vec<PlayerId> = players
        .iter()
        .filter(|player| player.score == best)
        .map(|player| player.id)
        .collect();

    match leaders.as_slice() {
        [id] => Some(GameOutcome::Winner {
            id: *id,
            score: best,
        }),
        _ => Some(GameOutcome::Draw {
            ids: leaders,
            score: best,
        }),
    }
}

/// Points handed out at the end of a minigame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinigameAward {
    /// Nobody won.
    Nobody,
    /// Sole winner takes the whole reward.
    Single { id: PlayerId, points: u32 },
    /// Reward split evenly (rounded down) among winners.
    Shared { ids: Vec<PlayerId>, points_each: u32 },
}

/// Credit `reward` to the minigame winners. Unknown ids are ignored.
pub fn award_minigame(roster: &mut Roster, winners: &[PlayerId], reward: u32) -> MinigameAward {
    let mut ids: Vec<PlayerId> = winners
        .iter()
        .copied()
        .filter(|id| roster.get(*id).is_some())
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let award = match ids.as_slice() {
        [] => return MinigameAward::Nobody,
        [id] => MinigameAward::Single {
            id: *id,
            points: reward,
        },
        many => MinigameAward::Shared {
            ids: many.to_vec(),
            points_each: reward / many.len() as u32,
        },
    };

    let points = match &award {
        MinigameAward::Single { points, .. } => *points,
        MinigameAward::Shared { points_each, .. } => *points_each,
        MinigameAward::Nobody => 0,
    };
    for id in &ids {
        if let Some(player) = roster.get_mut(*id) {
            player.gain_points(points);
        }
    }
    award
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster_with(scores: &[u32]) -> Roster {
        let mut roster = Roster::new(scores.len() as u8);
        for (index, score) in scores.iter().enumerate() {
            if let Some(player) = roster.get_mut(index as u8 + 1) {
                player.score = *score;
            }
        }
        roster
    }

    #[test]
    fn nobody_qualifies() {
        let roster = roster_with(&[10, 49, 0]);
        assert_eq!(check_winner(roster.players(), 50), None);
    }

    #[test]
    fn highest_qualifier_wins() {
        let roster = roster_with(&[50, 62, 55]);
        assert_eq!(
            check_winner(roster.players(), 50),
            Some(GameOutcome::Winner { id: 2, score: 62 })
        );
    }

    #[test]
    fn tie_on_top_score_is_a_draw() {
        let roster = roster_with(&[60, 60, 51]);
        assert_eq!(
            check_winner(roster.players(), 50),
            Some(GameOutcome::Draw {
                ids: vec![1, 2],
                score: 60
            })
        );
    }

    #[test]
    fn tie_below_the_top_does_not_draw() {
        let roster = roster_with(&[55, 55, 70]);
        assert_eq!(
            check_winner(roster.players(), 50),
            Some(GameOutcome::Winner { id: 3, score: 70 })
        );
    }

    #[test]
    fn award_split_rules() {
        let mut roster = roster_with(&[0, 0, 0]);
        assert_eq!(award_minigame(&mut roster, &[], 10), MinigameAward::Nobody);

        assert_eq!(
            award_minigame(&mut roster, &[2], 10),
            MinigameAward::Single { id: 2, points: 10 }
        );
        assert_eq!(roster.get(2).map(|p| p.score), Some(10));

        assert_eq!(
            award_minigame(&mut roster, &[1, 3, 2], 10),
            MinigameAward::Shared {
                ids: vec![1, 2, 3],
                points_each: 3
            }
        );
        let scores: Vec<u32> = roster.players().iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![3, 13, 3]);
    }

    #[test]
    fn unknown_winner_is_ignored() {
        let mut roster = roster_with(&[0, 0]);
        assert_eq!(award_minigame(&mut roster, &[9], 10), MinigameAward::Nobody);
    }
}
