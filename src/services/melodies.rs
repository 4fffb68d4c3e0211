//! Tunes played on the station buzzers.

use crate::dto::peripheral::BuzzerMessage;

/// Static tone sequence; a zero tone is a rest.
///
/// `tones` and `duration` are parallel: every tone, including the closing
/// rest, has its own duration.
#[derive(Debug, Clone, Copy)]
pub struct Tune {
    pub tones: &'static [u32],
    pub duration: &'static [u32],
}

impl From<Tune> for BuzzerMessage {
    fn from(value: Tune) -> Self {
        BuzzerMessage::new(value.tones, value.duration)
    }
}

pub const GAME_TUNE: Tune = Tune {
    tones: &[262, 330, 392, 523, 392, 330, 262, 392, 0],
    duration: &[150, 150, 150, 300, 150, 150, 150, 300, 0],
};

pub const WINNING_SOUND: Tune = Tune {
    tones: &[262, 294, 330, 349, 392, 0],
    duration: &[150, 150, 150, 150, 150, 0],
};

pub const LOSING_SOUND: Tune = Tune {
    tones: &[392, 349, 330, 294, 262, 0],
    duration: &[200, 200, 200, 200, 400, 0],
};

pub const GAME_OVER_TUNE: Tune = Tune {
    tones: &[523, 392, 330, 262, 0],
    duration: &[300, 300, 300, 600, 0],
};

pub const YOUR_TURN_SOUND: Tune = Tune {
    tones: &[660, 880, 0],
    duration: &[120, 200, 0],
};

pub const MOVE_SOUND: Tune = Tune {
    tones: &[440, 0],
    duration: &[80, 0],
};

pub const GAIN_POINTS_TUNE: Tune = Tune {
    tones: &[523, 659, 784, 0],
    duration: &[120, 120, 240, 0],
};

pub const LOSE_POINTS_TUNE: Tune = Tune {
    tones: &[784, 659, 523, 0],
    duration: &[120, 120, 240, 0],
};

pub const MOVE_FORWARD_TUNE: Tune = Tune {
    tones: &[392, 440, 494, 0],
    duration: &[100, 100, 200, 0],
};

pub const MOVE_BACKWARD_TUNE: Tune = Tune {
    tones: &[494, 440, 392, 0],
    duration: &[100, 100, 200, 0],
};

pub const SKIP_TURN_TUNE: Tune = Tune {
    tones: &[330, 0, 330, 0],
    duration: &[200, 100, 200, 0],
};

pub const DEATH_TUNE: Tune = Tune {
    tones: &[196, 185, 175, 165, 0],
    duration: &[300, 300, 300, 800, 0],
};

pub const RANDOM_EVENT_TUNE: Tune = Tune {
    tones: &[523, 392, 659, 440, 784, 0],
    duration: &[90, 90, 90, 90, 180, 0],
};

pub const MINIGAME_CELL_TUNE: Tune = Tune {
    tones: &[659, 784, 659, 784, 1047, 0],
    duration: &[100, 100, 100, 100, 300, 0],
};

pub const SELECTION_SOUND: Tune = Tune {
    tones: &[880, 0, 880, 0, 880, 0],
    duration: &[50, 150, 50, 150, 50, 0],
};

pub const COUNTDOWN_SOUND: Tune = Tune {
    tones: &[1000, 0],
    duration: &[150, 0],
};

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Tune; 16] = [
        GAME_TUNE,
        WINNING_SOUND,
        LOSING_SOUND,
        GAME_OVER_TUNE,
        YOUR_TURN_SOUND,
        MOVE_SOUND,
        GAIN_POINTS_TUNE,
        LOSE_POINTS_TUNE,
        MOVE_FORWARD_TUNE,
        MOVE_BACKWARD_TUNE,
        SKIP_TURN_TUNE,
        DEATH_TUNE,
        RANDOM_EVENT_TUNE,
        MINIGAME_CELL_TUNE,
        SELECTION_SOUND,
        COUNTDOWN_SOUND,
    ];

    #[test]
    fn every_tone_has_a_duration() {
        for tune in ALL {
            assert_eq!(tune.tones.len(), tune.duration.len(), "{tune:?}");
        }
    }

    #[test]
    fn tunes_end_in_a_rest() {
        for tune in ALL {
            assert_eq!(tune.tones.last(), Some(&0), "{tune:?}");
        }
    }
}
