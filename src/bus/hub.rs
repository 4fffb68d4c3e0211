//! Bus adapter serving station WebSocket connections.

use std::sync::{Arc, OnceLock};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Channel, Dispatcher, InboundEvent, MessageBus, PlayerId, Subscriptions, topics};
use crate::{dto::ws::Envelope, error::BusError};

#[derive(Clone)]
/// Handle used to push frames to a connected station.
pub struct StationConnection {
    pub id: PlayerId,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Topic router between station sockets and the registered dispatcher.
pub struct PeripheralHub {
    client_id: String,
    stations: DashMap<PlayerId, StationConnection>,
    subscriptions: Subscriptions,
    dispatcher: OnceLock<Arc<dyn Dispatcher>>,
}

impl PeripheralHub {
    /// Create an empty hub announcing itself as `client_id`.
    pub fn new(client_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            client_id: client_id.into(),
            stations: DashMap::new(),
            subscriptions: Subscriptions::default(),
            dispatcher: OnceLock::new(),
        })
    }

    /// Identity announced by the controller.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Answer a station's announcement with the controller identity on its
    /// connection topic.
    pub fn acknowledge(&self, id: PlayerId) -> Result<(), BusError> {
        self.publish(&Channel::Connection.topic(id), self.client_id.clone())
    }

    /// Install the single dispatcher. Returns `false` when one is already set.
    pub fn register_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) -> bool {
        self.dispatcher.set(dispatcher).is_ok()
    }

    /// Bind a socket writer to a station id, replacing any stale connection.
    pub fn attach(&self, connection: StationConnection) {
        self.stations.insert(connection.id, connection);
    }

    /// Forget the station, unless it already reconnected on another socket.
    pub fn detach(&self, id: PlayerId, tx: &mpsc::UnboundedSender<Message>) {
        self.stations
            .remove_if(&id, |_, connection| connection.tx.same_channel(tx));
    }

    /// Ids of the stations currently attached.
    pub fn stations(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.stations.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Active subscription filters.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.snapshot()
    }

    /// Hand an inbound event to the dispatcher if a subscription accepts it.
    pub async fn deliver(&self, event: InboundEvent) {
        if !self.subscriptions.accepts(&event.topic) {
            debug!(topic = %event.topic, "dropping event without subscription");
            return;
        }
        let Some(dispatcher) = self.dispatcher.get() else {
            debug!(topic = %event.topic, "dropping event: no dispatcher registered");
            return;
        };
        dispatcher.dispatch(event).await;
    }
}

impl MessageBus for PeripheralHub {
    fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        let id =
            topics::station_of(topic).ok_or_else(|| BusError::UnroutableTopic(topic.into()))?;
        let tx = self
            .stations
            .get(&id)
            .map(|connection| connection.tx.clone())
            .ok_or(BusError::StationOffline(id))?;
        let text = serde_json::to_string(&Envelope::outbound(topic, payload))?;
        tx.send(Message::Text(text.into()))
            .map_err(|_| BusError::ConnectionClosed(id))
    }

    fn subscribe(&self, filter: &str) {
        if self.subscriptions.add(filter) {
            debug!(filter, "subscribed");
        }
    }

    fn unsubscribe(&self, filter: &str) {
        if self.subscriptions.remove(filter) {
            debug!(filter, "unsubscribed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, PoisonError};

    use futures::future::BoxFuture;

    use super::*;

    #[derive(Default)]
    struct CollectingDispatcher {
        events: Mutex<Vec<InboundEvent>>,
    }

    impl Dispatcher for CollectingDispatcher {
        fn dispatch(&self, event: InboundEvent) -> BoxFuture<'_, ()> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
            Box::pin(async {})
        }
    }

    #[tokio::test]
    async fn only_subscribed_topics_reach_the_dispatcher() {
        let hub = PeripheralHub::new("game-controller");
        let dispatcher = Arc::new(CollectingDispatcher::default());
        assert!(hub.register_dispatcher(dispatcher.clone()));
        assert!(!hub.register_dispatcher(dispatcher.clone()));

        hub.deliver(InboundEvent::new(Channel::Movement.topic(1), ""))
            .await;
        hub.subscribe(&Channel::Movement.topic(1));
        hub.deliver(InboundEvent::new(Channel::Movement.topic(2), ""))
            .await;
        hub.deliver(InboundEvent::new(Channel::Movement.topic(1), ""))
            .await;
        hub.unsubscribe(&Channel::Movement.topic(1));
        hub.deliver(InboundEvent::new(Channel::Movement.topic(1), ""))
            .await;

        let events = dispatcher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, "game/players/1/movement");
    }

    #[tokio::test]
    async fn publish_routes_to_the_addressed_station() {
        let hub = PeripheralHub::new("game-controller");
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.attach(StationConnection { id: 2, tx });

        hub.publish(&Channel::Turn.topic(2), "1".into()).unwrap();
        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let envelope = Envelope::from_json_str(text.as_str()).unwrap();
        assert_eq!(envelope.topic, "game/players/2/turn");
        assert_eq!(envelope.payload, serde_json::Value::from(1));

        assert!(matches!(
            hub.publish(&Channel::Turn.topic(3), "1".into()),
            Err(BusError::StationOffline(3))
        ));
        assert!(matches!(
            hub.publish("game/broadcast", "1".into()),
            Err(BusError::UnroutableTopic(_))
        ));
    }

    #[tokio::test]
    async fn acknowledgement_carries_the_client_id() {
        let hub = PeripheralHub::new("board-7");
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.attach(StationConnection { id: 1, tx });

        hub.acknowledge(1).unwrap();
        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        let envelope = Envelope::from_json_str(text.as_str()).unwrap();
        assert_eq!(envelope.topic, Channel::Connection.topic(1));
        assert_eq!(envelope.payload, serde_json::Value::from(hub.client_id()));

        assert!(matches!(
            hub.acknowledge(2),
            Err(BusError::StationOffline(2))
        ));
    }

    #[tokio::test]
    async fn detach_ignores_replaced_connections() {
        let hub = PeripheralHub::new("game-controller");
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, _new_rx) = mpsc::unbounded_channel();
        hub.attach(StationConnection {
            id: 1,
            tx: old_tx.clone(),
        });
        hub.attach(StationConnection {
            id: 1,
            tx: new_tx.clone(),
        });

        hub.detach(1, &old_tx);
        assert_eq!(hub.stations(), vec![1]);
        hub.detach(1, &new_tx);
        assert!(hub.stations().is_empty());
    }
}
