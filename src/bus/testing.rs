//! In-memory bus double used by unit tests.

use std::sync::{Mutex, PoisonError};

use super::{MessageBus, Subscriptions};
use crate::error::BusError;

/// Records every publish and subscription change.
#[derive(Debug, Default)]
pub struct RecordingBus {
    published: Mutex<Vec<(String, String)>>,
    subscriptions: Subscriptions,
    history: Mutex<Vec<String>>,
}

impl RecordingBus {
    /// Fresh recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(topic, payload)` published so far.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payloads published on one topic.
    pub fn published_to(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload)
            .collect()
    }

    /// Active subscription filters.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.snapshot()
    }

    /// Ordered log of `+filter` / `-filter` entries.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MessageBus for RecordingBus {
    fn publish(&self, topic: &str, payload: String) -> Result<(), BusError> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((topic.to_string(), payload));
        Ok(())
    }

    fn subscribe(&self, filter: &str) {
        self.subscriptions.add(filter);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("+{filter}"));
    }

    fn unsubscribe(&self, filter: &str) {
        self.subscriptions.remove(filter);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("-{filter}"));
    }
}
