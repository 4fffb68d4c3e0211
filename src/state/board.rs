use std::fmt;

use rand::Rng;

/// Effect triggered when a player stops on a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellEffect {
    /// Inert starting cell.
    Start,
    GainPoints,
    LosePoints,
    MoveForward,
    MoveBackward,
    Minigame,
    /// Lose every point.
    Death,
    SkipTurn,
    /// Delegate to one of [`CellEffect::RANDOM_CANDIDATES`].
    RandomEvent,
}

impl CellEffect {
    /// Effects a random event may delegate to, each equally likely.
    pub const RANDOM_CANDIDATES: [CellEffect; 5] = [
        CellEffect::MoveForward,
        CellEffect::MoveBackward,
        CellEffect::GainPoints,
        CellEffect::LosePoints,
        CellEffect::SkipTurn,
    ];

    /// Draw the effect a random event delegates to.
    pub fn random_event<R: Rng>(rng: &mut R) -> CellEffect {
        Self::RANDOM_CANDIDATES[rng.random_range(0..Self::RANDOM_CANDIDATES.len())]
    }

    /// Display name shown on the station screens.
    pub fn label(self) -> &'static str {
        match self {
            CellEffect::Start => "Start",
            CellEffect::GainPoints => "Gain Points",
            CellEffect::LosePoints => "Lose Points",
            CellEffect::MoveForward => "Move Forward",
            CellEffect::MoveBackward => "Move Backward",
            CellEffect::Minigame => "MiniGame",
            CellEffect::Death => "Death",
            CellEffect::SkipTurn => "Skip Turn",
            CellEffect::RandomEvent => "Random Event",
        }
    }
}

impl fmt::Display for CellEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Circular track of cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: Vec<CellEffect>,
}

impl Board {
    /// Build a board from explicit cells; an empty list yields a lone start cell.
    pub fn new(cells: Vec<CellEffect>) -> Self {
        if cells.is_empty() {
            return Self::debug();
        }
        Self { cells }
    }

    /// The sixteen-cell production layout.
    pub fn classic() -> Self {
        use CellEffect::*;
        Self::new(vec![
            Start,
            GainPoints,
            LosePoints,
            MoveForward,
            Minigame,
            RandomEvent,
            Death,
            LosePoints,
            MoveBackward,
            Minigame,
            GainPoints,
            MoveForward,
            MoveBackward,
            RandomEvent,
            SkipTurn,
            Minigame,
        ])
    }

    /// One inert cell: every move lands back on start.
    pub fn debug() -> Self {
        Self {
            cells: vec![CellEffect::Start],
        }
    }

    /// Number of cells.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Effect at a position, wrapping out-of-range positions.
    pub fn cell(&self, position: usize) -> CellEffect {
        self.cells[position % self.cells.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_layout() {
        let board = Board::classic();
        assert_eq!(board.size(), 16);
        assert_eq!(board.cell(0), CellEffect::Start);
        assert_eq!(board.cell(6), CellEffect::Death);
        assert_eq!(board.cell(16), CellEffect::Start);
    }

    #[test]
    fn random_candidates_exclude_terminal_and_recursive_effects() {
        assert!(!CellEffect::RANDOM_CANDIDATES.contains(&CellEffect::RandomEvent));
        assert!(!CellEffect::RANDOM_CANDIDATES.contains(&CellEffect::Death));
        assert!(!CellEffect::RANDOM_CANDIDATES.contains(&CellEffect::Minigame));
        assert!(!CellEffect::RANDOM_CANDIDATES.contains(&CellEffect::Start));
    }

    #[test]
    fn random_event_stays_in_the_closed_set() {
        use rand::{SeedableRng, rngs::StdRng};

        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1_000 {
            let effect = CellEffect::random_event(&mut rng);
            assert!(CellEffect::RANDOM_CANDIDATES.contains(&effect));
            seen.insert(effect);
        }
        assert_eq!(seen.len(), CellEffect::RANDOM_CANDIDATES.len());
    }

    #[test]
    fn empty_board_falls_back_to_start() {
        let board = Board::new(Vec::new());
        assert_eq!(board.size(), 1);
        assert_eq!(board.cell(5), CellEffect::Start);
    }
}
