//! Change-feed events and listener handles.

use crate::types::RecordId;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a listener wants its events delivered.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Events queued before the listener is disconnected.
    pub capacity: usize,

    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            filter: SubscriptionFilter::default(),
        }
    }
}

/// Storage keys a listener cares about. No list means every key.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    pub keys: Option<Vec<String>>,
}

impl SubscriptionFilter {
    pub fn keys(keys: &[&str]) -> Self {
        Self {
            keys: Some(keys.iter().map(|k| k.to_string()).collect()),
        }
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        self.keys
            .as_ref()
            .map_or(true, |keys| keys.iter().any(|k| k == key))
    }
}

/// A mutation observed on the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    Appended { key: String, id: RecordId },

    Updated { key: String, id: RecordId },

    Removed { key: String, id: RecordId },

    /// The whole collection document was rewritten or cleared.
    Replaced { key: String },

    /// The current principal, session or preferences changed.
    SingletonChanged { key: String },

    /// Last event a listener receives.
    Dropped { reason: DropReason },
}

impl StoreEvent {
    pub fn key(&self) -> Option<&str> {
        match self {
            StoreEvent::Appended { key, .. }
            | StoreEvent::Updated { key, .. }
            | StoreEvent::Removed { key, .. }
            | StoreEvent::Replaced { key }
            | StoreEvent::SingletonChanged { key } => Some(key),
            StoreEvent::Dropped { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    BufferOverflow,
    Unsubscribed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub(crate) inbox: Receiver<StoreEvent>,
}

impl SubscriptionHandle {
    /// Wait up to `timeout` for the next event.
    pub fn next_within(&self, timeout: Duration) -> Option<StoreEvent> {
        match self.inbox.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take every queued event. The flag is true once the store has let
    /// go of this listener, after which mutations are no longer seen.
    pub fn drain(&self) -> (Vec<StoreEvent>, bool) {
        let mut events = Vec::new();
        loop {
            match self.inbox.try_recv() {
                Ok(event @ StoreEvent::Dropped { .. }) => {
                    events.push(event);
                    return (events, true);
                }
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return (events, false),
                Err(TryRecvError::Disconnected) => return (events, true),
            }
        }
    }
}
