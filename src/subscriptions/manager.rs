//! Fan-out of store mutations to in-process listeners.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle, SubscriptionId,
};

struct Listener {
    filter: SubscriptionFilter,
    outbox: Sender<StoreEvent>,
}

enum Delivery {
    Sent,
    Skipped,
    Overflowed,
}

impl Listener {
    fn deliver(&self, event: &StoreEvent) -> Delivery {
        let wanted = event.key().map_or(true, |key| self.filter.matches(key));
        if !wanted {
            return Delivery::Skipped;
        }
        match self.outbox.try_send(event.clone()) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => Delivery::Overflowed,
        }
    }
}

/// Registry of change-feed listeners.
///
/// Delivery never blocks a writer: a listener whose queue is full is
/// disconnected and must resubscribe, reloading whatever it projects.
pub struct SubscriptionManager {
    listeners: RwLock<HashMap<SubscriptionId, Listener>>,
    issued: AtomicU64,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            issued: AtomicU64::new(0),
        }
    }

    /// Register a listener. Only mutations made after this call are seen.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.issued.fetch_add(1, Ordering::SeqCst) + 1);
        let (outbox, inbox) = bounded(config.capacity.max(1));

        let listener = Listener {
            filter: config.filter,
            outbox,
        };
        self.listeners.write().insert(id, listener);
        tracing::debug!(subscription = id.0, "listener registered");

        SubscriptionHandle { id, inbox }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.listeners.write().remove(&id);
        if let Some(listener) = removed {
            let _ = listener.outbox.try_send(StoreEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Hand `event` to every interested listener.
    pub fn broadcast(&self, event: StoreEvent) {
        let overflowed: Vec<SubscriptionId> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, listener)| matches!(listener.deliver(&event), Delivery::Overflowed))
            .map(|(id, _)| *id)
            .collect();

        if overflowed.is_empty() {
            return;
        }

        let mut listeners = self.listeners.write();
        for id in overflowed {
            // The queue is full, so the listener learns of the drop by
            // the channel disconnecting once its sender is gone.
            if listeners.remove(&id).is_some() {
                tracing::warn!(subscription = id.0, reason = ?DropReason::BufferOverflow, "listener disconnected");
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}
