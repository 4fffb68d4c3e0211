//! Topic layout shared with the player stations.
//!
//! Every station topic has the shape `game/players/{id}/...`. Filters follow
//! MQTT wildcard rules: `+` matches exactly one level, `#` matches the rest.

use std::fmt;

use super::PlayerId;

const ROOT: &str = "game/players";

/// Logical channel addressed by a station topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Station announces itself.
    Connection,
    /// Two-line display (outbound).
    Lcd,
    /// Tone player (outbound).
    Buzzer,
    /// Push button presses (inbound).
    Button,
    /// Hall sensor pulses (inbound).
    Movement,
    /// Turn indicator (outbound).
    Turn,
}

impl Channel {
    fn suffix(self) -> &'static str {
        match self {
            Channel::Connection => "connection",
            Channel::Lcd => "components/lcd",
            Channel::Buzzer => "components/buzzer",
            Channel::Button => "components/button",
            Channel::Movement => "movement",
            Channel::Turn => "turn",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "connection" => Some(Channel::Connection),
            "components/lcd" => Some(Channel::Lcd),
            "components/buzzer" => Some(Channel::Buzzer),
            "components/button" => Some(Channel::Button),
            "movement" => Some(Channel::Movement),
            "turn" => Some(Channel::Turn),
            _ => None,
        }
    }

    /// Concrete topic for one station.
    pub fn topic(self, id: PlayerId) -> String {
        format!("{ROOT}/{id}/{}", self.suffix())
    }

    /// Filter matching this channel on every station.
    pub fn any_station(self) -> String {
        format!("{ROOT}/+/{}", self.suffix())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Split a station topic into its id and channel.
pub fn parse(topic: &str) -> Option<(PlayerId, Channel)> {
    let rest = topic.strip_prefix(ROOT)?.strip_prefix('/')?;
    let (id, suffix) = rest.split_once('/')?;
    let id = id.parse::<PlayerId>().ok()?;
    let channel = Channel::from_suffix(suffix)?;
    Some((id, channel))
}

/// Extract the station id of any `game/players/{id}/...` topic.
pub fn station_of(topic: &str) -> Option<PlayerId> {
    let rest = topic.strip_prefix(ROOT)?.strip_prefix('/')?;
    rest.split('/').next()?.parse().ok()
}

/// Check a concrete topic against a subscription filter.
pub fn matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
