use crate::bus::PlayerId;

/// Runtime state of one station's player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Station id, stable for the whole session.
    pub id: PlayerId,
    /// Current score, never negative.
    pub score: u32,
    /// Board cell index.
    pub position: usize,
    /// Whether the station has announced itself.
    pub connected: bool,
    /// Whether the next turn is forfeited.
    pub skip_next_turn: bool,
}

impl Player {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            score: 0,
            position: 0,
            connected: false,
            skip_next_turn: false,
        }
    }

    pub fn gain_points(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    /// Remove points, flooring the score at zero.
    pub fn lose_points(&mut self, points: u32) {
        self.score = self.score.saturating_sub(points);
    }

    /// Move forward with wrap-around.
    pub fn move_forward(&mut self, steps: usize, board_size: usize) {
        self.position = (self.position + steps % board_size) % board_size;
    }

    /// Move backward with wrap-around.
    pub fn move_backward(&mut self, steps: usize, board_size: usize) {
        let steps = steps % board_size;
        self.position = (self.position + board_size - steps) % board_size;
    }
}

/// Result of a station connection announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// The id is outside `1..=N`.
    OutOfRange,
    /// The station had already announced itself.
    AlreadyConnected,
    /// First announcement; `all_connected` is true only for the last missing station.
    Connected { all_connected: bool },
}

/// Ordered set of players keyed by station id `1..=N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    players: Vec<Player>,
}

impl Roster {
    /// Players `1..=count`, all disconnected.
    pub fn new(count: u8) -> Self {
        Self {
            players: (1..=count).map(Player::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|player| player.id).collect()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.index_of(id).map(|index| &self.players[index])
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.index_of(id).map(move |index| &mut self.players[index])
    }

    /// Player at a turn index.
    pub fn at(&self, turn: usize) -> Option<&Player> {
        self.players.get(turn)
    }

    /// Record a connection announcement.
    pub fn connect(&mut self, id: PlayerId) -> Connection {
        let Some(player) = self.get_mut(id) else {
            return Connection::OutOfRange;
        };
        if player.connected {
            return Connection::AlreadyConnected;
        }
        player.connected = true;
        Connection::Connected {
            all_connected: self.all_connected(),
        }
    }

    pub fn all_connected(&self) -> bool {
        self.players.iter().all(|player| player.connected)
    }

    fn index_of(&self, id: PlayerId) -> Option<usize> {
        let index = usize::from(id).checked_sub(1)?;
        (index < self.players.len()).then_some(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn losing_more_than_score_floors_at_zero() {
        let mut player = Player::new(1);
        player.gain_points(3);
        player.lose_points(10);
        assert_eq!(player.score, 0);
    }

    #[test]
    fn movement_wraps_both_ways() {
        let mut player = Player::new(1);
        player.move_backward(2, 16);
        assert_eq!(player.position, 14);
        player.move_forward(5, 16);
        assert_eq!(player.position, 3);
        player.move_forward(33, 16);
        assert_eq!(player.position, 4);
        player.move_backward(3, 1);
        assert_eq!(player.position, 0);
    }

    #[test]
    fn all_connected_fires_once() {
        let mut roster = Roster::new(2);
        assert_eq!(roster.connect(0), Connection::OutOfRange);
        assert_eq!(roster.connect(3), Connection::OutOfRange);
        assert_eq!(
            roster.connect(2),
            Connection::Connected {
                all_connected: false
            }
        );
        assert_eq!(roster.connect(2), Connection::AlreadyConnected);
        assert_eq!(
            roster.connect(1),
            Connection::Connected {
                all_connected: true
            }
        );
        assert_eq!(roster.connect(1), Connection::AlreadyConnected);
    }

    #[test]
    fn lookup_by_station_id() {
        let roster = Roster::new(3);
        assert_eq!(roster.get(3).map(|p| p.id), Some(3));
        assert!(roster.get(4).is_none());
        assert_eq!(roster.at(0).map(|p| p.id), Some(1));
        assert_eq!(roster.ids(), vec![1, 2, 3]);
    }
}
