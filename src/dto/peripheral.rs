//! Payloads understood by the station firmware.

use serde::{Deserialize, Serialize};

/// Width of a station display line.
pub const LCD_WIDTH: usize = 16;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
/// Two-line display record with an optional hold time (0 keeps it until replaced).
pub struct LcdMessage {
    pub top: String,
    pub down: String,
    pub time: u32,
}

impl LcdMessage {
    /// Single centred line.
    pub fn line(top: &str) -> Self {
        Self {
            top: center(top),
            ..Self::default()
        }
    }

    /// Two centred lines.
    pub fn lines(top: &str, down: &str) -> Self {
        Self {
            top: center(top),
            down: center(down),
            time: 0,
        }
    }

    /// Two lines written as given.
    pub fn raw(top: impl Into<String>, down: impl Into<String>) -> Self {
        Self {
            top: top.into(),
            down: down.into(),
            time: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Parallel tone/duration sequences; a zero frequency is a rest.
pub struct BuzzerMessage {
    pub tones: Vec<u32>,
    pub duration: Vec<u32>,
}

impl BuzzerMessage {
    pub fn new(tones: &[u32], duration: &[u32]) -> Self {
        Self {
            tones: tones.to_vec(),
            duration: duration.to_vec(),
        }
    }

    /// One tone followed by a rest.
    pub fn beep(frequency: u32, duration_ms: u32) -> Self {
        Self::new(&[frequency, 0], &[duration_ms, 0])
    }
}

/// How long a station button was held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PressKind {
    Short,
    Long,
}

#[derive(Debug, Deserialize)]
/// Button payload: `{"type": "short" | "long"}`.
pub struct ButtonPayload {
    #[serde(rename = "type")]
    pub kind: PressKind,
}

impl ButtonPayload {
    /// Parse a press kind, `None` for malformed payloads.
    pub fn press_kind(payload: &str) -> Option<PressKind> {
        serde_json::from_str::<ButtonPayload>(payload)
            .ok()
            .map(|parsed| parsed.kind)
    }
}

/// Centre text on a display line, truncating overlong input.
pub fn center(text: &str) -> String {
    let text: String = text.chars().take(LCD_WIDTH).collect();
    format!("{text:^width$}", width = LCD_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcd_serializes_firmware_fields() {
        let json = serde_json::to_value(LcdMessage::raw("a", "b")).unwrap();
        assert_eq!(json, serde_json::json!({"top": "a", "down": "b", "time": 0}));
    }

    #[test]
    fn center_pads_and_truncates() {
        assert_eq!(center("Hi"), "       Hi       ");
        assert_eq!(center("abcdefghijklmnopqrst").len(), LCD_WIDTH);
    }

    #[test]
    fn press_kind_parsing() {
        assert_eq!(
            ButtonPayload::press_kind(r#"{"type":"short"}"#),
            Some(PressKind::Short)
        );
        assert_eq!(
            ButtonPayload::press_kind(r#"{"type":"long"}"#),
            Some(PressKind::Long)
        );
        assert_eq!(ButtonPayload::press_kind(r#"{"type":"double"}"#), None);
        assert_eq!(ButtonPayload::press_kind("not json"), None);
    }
}
