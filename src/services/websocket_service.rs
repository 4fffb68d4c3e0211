use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    bus::{Channel, InboundEvent, PlayerId, hub::StationConnection},
    dto::ws::Envelope,
    state::SharedState,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons a frame from a station is not handed to the hub.
#[derive(Debug, Error, PartialEq, Eq)]
enum FrameError {
    /// Not a JSON envelope.
    #[error("malformed envelope: {0}")]
    Malformed(String),
    /// Envelope topic names another station.
    #[error("frame ignored: topic `{topic}` does not belong to station {expected}")]
    ForeignTopic { expected: PlayerId, topic: String },
}

/// Handle the full lifecycle of one station WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("station identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let Some((station_id, announcement)) = identify(initial_message.as_str()) else {
        warn!(payload = %initial_message.as_str(), "first frame was not a connection announcement");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let hub = state.hub();
    hub.attach(StationConnection {
        id: station_id,
        tx: outbound_tx.clone(),
    });
    info!(station = station_id, "station attached");
    if let Err(err) = hub.acknowledge(station_id) {
        warn!(station = station_id, error = %err, "failed to acknowledge station");
    }
    hub.deliver(announcement).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match parse_frame(station_id, text.as_str()) {
                Ok(event) => hub.deliver(event).await,
                Err(err) => debug!(station = station_id, error = %err, "dropping frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(station = station_id, error = %err, "websocket error");
                break;
            }
        }
    }

    hub.detach(station_id, &outbound_tx);
    info!(station = station_id, "station detached");
    finalize(writer_task, outbound_tx).await;
}

/// Station id and announcement event of a valid first frame.
fn identify(text: &str) -> Option<(PlayerId, InboundEvent)> {
    let event: InboundEvent = Envelope::from_json_str(text).ok()?.into();
    match event.station()? {
        (id, Channel::Connection) => Some((id, event)),
        _ => None,
    }
}

/// Decode a frame from an identified station.
fn parse_frame(station_id: PlayerId, text: &str) -> Result<InboundEvent, FrameError> {
    let envelope =
        Envelope::from_json_str(text).map_err(|err| FrameError::Malformed(err.to_string()))?;
    let event: InboundEvent = envelope.into();
    match event.station() {
        Some((id, _)) if id == station_id => Ok(event),
        _ => Err(FrameError::ForeignTopic {
            expected: station_id,
            topic: event.topic,
        }),
    }
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identification_requires_the_connection_topic() {
        let (id, event) =
            identify(r#"{"topic":"game/players/3/connection","payload":"hello"}"#).unwrap();
        assert_eq!(id, 3);
        assert_eq!(event.payload, "hello");

        assert!(identify(r#"{"topic":"game/players/3/movement"}"#).is_none());
        assert!(identify(r#"{"topic":"lobby"}"#).is_none());
        assert!(identify("not json").is_none());
    }

    #[test]
    fn frames_for_another_station_are_rejected() {
        let event = parse_frame(
            2,
            r#"{"topic":"game/players/2/components/button","payload":{"type":"short"}}"#,
        )
        .unwrap();
        assert_eq!(event.station(), Some((2, Channel::Button)));

        assert_eq!(
            parse_frame(2, r#"{"topic":"game/players/1/movement"}"#),
            Err(FrameError::ForeignTopic {
                expected: 2,
                topic: "game/players/1/movement".into()
            })
        );
        assert!(matches!(
            parse_frame(2, "{"),
            Err(FrameError::Malformed(_))
        ));
    }
}
