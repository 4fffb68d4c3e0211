use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    bus::{Channel, MessageBus, PlayerId},
    config::Pacing,
    dto::peripheral::{BuzzerMessage, LcdMessage},
    services::melodies::{self, Tune},
};

/// Frames shown per option during a selection animation.
const ANIMATION_FRAMES: usize = 15;

/// Display and sound side channel towards a group of stations.
#[derive(Clone)]
pub struct Announcer {
    bus: Arc<dyn MessageBus>,
    stations: Arc<[PlayerId]>,
}

impl Announcer {
    /// Address `stations` through `bus`.
    pub fn new(bus: Arc<dyn MessageBus>, stations: Vec<PlayerId>) -> Self {
        Self {
            bus,
            stations: stations.into(),
        }
    }

    /// Same bus, narrowed to another audience.
    pub fn with_stations(&self, stations: Vec<PlayerId>) -> Self {
        Self::new(self.bus.clone(), stations)
    }

    pub fn show(&self, id: PlayerId, message: &LcdMessage) {
        debug!(station = id, top = %message.top.trim(), down = %message.down.trim(), "lcd");
        self.send(&Channel::Lcd.topic(id), message);
    }

    pub fn show_others(&self, except: PlayerId, message: &LcdMessage) {
        for &id in self.stations.iter().filter(|&&id| id != except) {
            self.show(id, message);
        }
    }

    pub fn show_all(&self, message: &LcdMessage) {
        for &id in self.stations.iter() {
            self.show(id, message);
        }
    }

    /// Personal message for `id`, shared message for everyone else.
    pub fn show_split(&self, id: PlayerId, own: &LcdMessage, others: &LcdMessage) {
        self.show(id, own);
        self.show_others(id, others);
    }

    pub fn play(&self, id: PlayerId, message: &BuzzerMessage) {
        self.send(&Channel::Buzzer.topic(id), message);
    }

    pub fn play_others(&self, except: PlayerId, message: &BuzzerMessage) {
        for &id in self.stations.iter().filter(|&&id| id != except) {
            self.play(id, message);
        }
    }

    pub fn play_all(&self, message: &BuzzerMessage) {
        for &id in self.stations.iter() {
            self.play(id, message);
        }
    }

    pub fn tune(&self, id: PlayerId, tune: Tune) {
        self.play(id, &tune.into());
    }

    pub fn tune_all(&self, tune: Tune) {
        self.play_all(&tune.into());
    }

    pub fn beep(&self, id: PlayerId, frequency: u32, duration_ms: u32) {
        self.play(id, &BuzzerMessage::beep(frequency, duration_ms));
    }

    pub fn beep_all(&self, frequency: u32, duration_ms: u32) {
        self.play_all(&BuzzerMessage::beep(frequency, duration_ms));
    }

    /// Light (`true`) or clear the station's turn indicator.
    pub fn turn_indicator(&self, id: PlayerId, active: bool) {
        let payload = if active { "1" } else { "0" };
        if let Err(err) = self.bus.publish(&Channel::Turn.topic(id), payload.into()) {
            warn!(station = id, error = %err, "failed to publish turn indicator");
        }
    }

    /// "3, 2, 1, Go!" on every station.
    pub async fn countdown(&self, pacing: Pacing) {
        for count in ["3", "2", "1"] {
            self.show_all(&LcdMessage::line(count));
            self.tune_all(melodies::COUNTDOWN_SOUND);
            pacing.pause(1).await;
        }
        self.show_all(&LcdMessage::line("Go!"));
    }

    /// Cycle through `options` on every display, then clear it.
    pub async fn animate_options(&self, options: &[&str], pacing: Pacing) {
        if options.is_empty() {
            return;
        }
        self.tune_all(melodies::SELECTION_SOUND);
        let frame = pacing.beat() / 5;
        for index in 0..ANIMATION_FRAMES {
            self.show_all(&LcdMessage::line(options[index % options.len()]));
            if !frame.is_zero() {
                tokio::time::sleep(frame).await;
            }
        }
        self.show_all(&LcdMessage::line(" "));
    }

    fn send<T: Serialize>(&self, topic: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(topic, error = %err, "failed to serialize station payload");
                return;
            }
        };
        if let Err(err) = self.bus.publish(topic, payload) {
            warn!(topic, error = %err, "failed to publish station payload");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::RecordingBus;

    #[test]
    fn split_message_reaches_everyone_once() {
        let bus = Arc::new(RecordingBus::new());
        let announcer = Announcer::new(bus.clone(), vec![1, 2, 3]);
        announcer.show_split(2, &LcdMessage::line("mine"), &LcdMessage::line("theirs"));

        let published = bus.published();
        assert_eq!(published.len(), 3);
        assert!(bus.published_to(&Channel::Lcd.topic(2))[0].contains("mine"));
        assert!(bus.published_to(&Channel::Lcd.topic(1))[0].contains("theirs"));
        assert!(bus.published_to(&Channel::Lcd.topic(3))[0].contains("theirs"));
    }

    #[test]
    fn turn_indicator_payloads() {
        let bus = Arc::new(RecordingBus::new());
        let announcer = Announcer::new(bus.clone(), vec![1]);
        announcer.turn_indicator(1, true);
        announcer.turn_indicator(1, false);
        assert_eq!(bus.published_to(&Channel::Turn.topic(1)), vec!["1", "0"]);
    }

    #[test]
    fn beep_is_tone_then_rest() {
        let bus = Arc::new(RecordingBus::new());
        let announcer = Announcer::new(bus.clone(), vec![1, 2]);
        announcer.beep_all(500, 100);
        let payload = &bus.published_to(&Channel::Buzzer.topic(2))[0];
        let message: BuzzerMessage = serde_json::from_str(payload).unwrap();
        assert_eq!(message, BuzzerMessage::new(&[500, 0], &[100, 0]));
    }
}
