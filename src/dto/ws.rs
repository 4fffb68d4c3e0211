use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::InboundEvent;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
/// Frame exchanged with station WebSocket clients in both directions.
pub struct Envelope {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Wrap an outbound payload; JSON text is embedded as structured data.
    pub fn outbound(topic: &str, payload: String) -> Self {
        let payload = serde_json::from_str(&payload).unwrap_or(Value::String(payload));
        Self {
            topic: topic.to_string(),
            payload,
        }
    }
}

impl From<Envelope> for InboundEvent {
    fn from(value: Envelope) -> Self {
        let payload = match value.payload {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        InboundEvent::new(value.topic, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_payload_becomes_json_text() {
        let envelope = Envelope::from_json_str(
            r#"{"topic":"game/players/1/components/button","payload":{"type":"long"}}"#,
        )
        .unwrap();
        let event: InboundEvent = envelope.into();
        assert_eq!(event.payload, r#"{"type":"long"}"#);
    }

    #[test]
    fn missing_payload_is_empty() {
        let envelope = Envelope::from_json_str(r#"{"topic":"game/players/1/movement"}"#).unwrap();
        let event: InboundEvent = envelope.into();
        assert_eq!(event.payload, "");
    }

    #[test]
    fn outbound_keeps_plain_text() {
        let envelope = Envelope::outbound("game/players/1/turn", "1".into());
        assert_eq!(envelope.payload, Value::from(1));
        let envelope = Envelope::outbound("game/players/1/turn", "on".into());
        assert_eq!(envelope.payload, Value::String("on".into()));
    }
}
