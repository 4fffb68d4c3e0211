//! Message bus abstraction between the controller and the player stations.

pub mod hub;
#[cfg(test)]
pub mod testing;
pub mod topics;

use std::{
    collections::BTreeSet,
    sync::{Mutex, PoisonError},
};

use futures::future::BoxFuture;

use crate::error::BusError;

pub use self::topics::Channel;

/// Numeric station identity (1..=N).
pub type PlayerId = u8;

/// Raw peripheral message as delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Concrete topic the message was published on.
    pub topic: String,
    /// Payload text (usually JSON).
    pub payload: String,
}

impl InboundEvent {
    /// Build an event from its parts.
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Station id and channel, when the topic is a station topic.
    pub fn station(&self) -> Option<(PlayerId, Channel)> {
        topics::parse(&self.topic)
    }
}

/// Outbound half of the bus plus dynamic subscription control.
///
/// Implementations must never block: every method is called from the game
/// loop, from bus delivery, and from minigame timers.
pub trait MessageBus: Send + Sync {
    /// Publish a payload on a concrete topic.
    fn publish(&self, topic: &str, payload: String) -> Result<(), BusError>;
    /// Start delivering inbound events matching `filter`.
    fn subscribe(&self, filter: &str);
    /// Stop delivering inbound events matching `filter`.
    fn unsubscribe(&self, filter: &str);
}

/// Single receiver of every inbound event the bus accepts.
pub trait Dispatcher: Send + Sync {
    /// Route one event. Must return quickly.
    fn dispatch(&self, event: InboundEvent) -> BoxFuture<'_, ()>;
}

/// Set of active subscription filters.
#[derive(Debug, Default)]
pub struct Subscriptions {
    filters: Mutex<BTreeSet<String>>,
}

impl Subscriptions {
    /// Add a filter; returns `false` when it was already present.
    pub fn add(&self, filter: &str) -> bool {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(filter.to_string())
    }

    /// Remove a filter; returns `false` when it was not present.
    pub fn remove(&self, filter: &str) -> bool {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(filter)
    }

    /// Whether any active filter accepts `topic`.
    pub fn accepts(&self, topic: &str) -> bool {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|filter| topics::matches(filter, topic))
    }

    /// Current filters in lexical order.
    pub fn snapshot(&self) -> Vec<String> {
        self.filters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriptions_filter_topics() {
        let subs = Subscriptions::default();
        assert!(!subs.accepts("game/players/1/movement"));

        assert!(subs.add("game/players/1/movement"));
        assert!(!subs.add("game/players/1/movement"));
        assert!(subs.accepts("game/players/1/movement"));
        assert!(!subs.accepts("game/players/2/movement"));

        assert!(subs.remove("game/players/1/movement"));
        assert!(!subs.remove("game/players/1/movement"));
        assert!(subs.snapshot().is_empty());
    }

    #[test]
    fn inbound_event_exposes_station() {
        let event = InboundEvent::new("game/players/2/movement", "");
        assert_eq!(event.station(), Some((2, Channel::Movement)));
        assert_eq!(InboundEvent::new("noise", "").station(), None);
    }
}
