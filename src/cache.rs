//! In-memory projection of the store for the presentation layer.
//!
//! The store stays the single source of truth. The projection is read-only
//! to the presentation layer apart from the theme; it catches up from the
//! store's change feed in [`SharedState::sync`]. Only the dark-mode
//! preference is persisted by the cache itself.

use crate::error::Result;
use crate::stats::{self, AdminStats};
use crate::store::{keys, Preferences, RecordStore};
use crate::subscriptions::{StoreEvent, SubscriptionConfig, SubscriptionHandle};
use crate::types::{
    Booking, Feedback, FeedbackData, Notification, PaymentRecord, Principal, RecordId, Slot, WaitlistData,
    WaitlistEntry,
};
use chrono::FixedOffset;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Everything the presentation layer renders from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StateView {
    pub dark_mode: bool,
    pub principal: Option<Principal>,
    pub slots: Vec<Slot>,
    pub bookings: Vec<Booking>,
    pub waitlist: Vec<WaitlistEntry>,
    pub feedback: Vec<Feedback>,
    pub payments: Vec<PaymentRecord>,
    pub notifications: Vec<Notification>,
    pub stats: AdminStats,
}

/// Keys whose changes invalidate the statistics.
const STATS_INPUTS: [&str; 3] = [keys::USERS, keys::BOOKINGS, keys::SLOTS];

pub struct SharedState {
    store: Arc<RecordStore>,
    offset: FixedOffset,
    view: RwLock<StateView>,
    feed: Mutex<SubscriptionHandle>,
}

impl SharedState {
    /// Build the projection from the store's current contents.
    pub fn hydrate(store: Arc<RecordStore>, offset: FixedOffset) -> Self {
        let feed = store.subscribe(SubscriptionConfig::default());
        let state = Self {
            store,
            offset,
            view: RwLock::new(StateView::default()),
            feed: Mutex::new(feed),
        };
        state.reload_all();
        state
    }

    pub fn snapshot(&self) -> StateView {
        self.view.read().clone()
    }

    pub fn dark_mode(&self) -> bool {
        self.view.read().dark_mode
    }

    pub fn principal(&self) -> Option<Principal> {
        self.view.read().principal.clone()
    }

    pub fn bookings(&self) -> Vec<Booking> {
        self.view.read().bookings.clone()
    }

    pub fn stats(&self) -> AdminStats {
        self.view.read().stats.clone()
    }

    /// Apply pending store changes. Returns the number of events consumed.
    ///
    /// If the feed was dropped (slow consumer) the projection resubscribes
    /// and reloads everything.
    pub fn sync(&self) -> usize {
        let mut feed = self.feed.lock();
        let (events, disconnected) = feed.drain();

        let lost = disconnected || events.iter().any(|e| matches!(e, StoreEvent::Dropped { .. }));
        if lost {
            tracing::warn!("change feed lost, reloading projection");
            self.store.unsubscribe(feed.id);
            *feed = self.store.subscribe(SubscriptionConfig::default());
            drop(feed);
            self.reload_all();
            return events.len();
        }
        drop(feed);

        let changed: BTreeSet<&str> = events.iter().filter_map(|e| e.key()).collect();
        for key in &changed {
            self.reload(key);
        }
        if changed.iter().any(|k| STATS_INPUTS.contains(k)) {
            self.recompute_stats();
        }
        events.len()
    }

    // --- Preferences ---

    pub fn set_dark_mode(&self, enabled: bool) -> Result<()> {
        self.store.preferences().set(&Preferences { dark_mode: enabled })?;
        self.sync();
        Ok(())
    }

    /// Flip dark mode, returning the new value.
    pub fn toggle_theme(&self) -> Result<bool> {
        let enabled = !self.dark_mode();
        self.set_dark_mode(enabled)?;
        Ok(enabled)
    }

    // --- Write-through mutations ---
    //
    // Callers in the facade check identity and ownership first. Bookings,
    // slots and the rest of the catalog change only through the ledger and
    // the catalog.

    pub(crate) fn add_waitlist(&self, entry: WaitlistData) -> Result<WaitlistEntry> {
        let entry = self.store.waitlist().append(entry)?;
        self.sync();
        Ok(entry)
    }

    pub(crate) fn remove_waitlist(&self, id: RecordId) -> Result<bool> {
        let removed = self.store.waitlist().remove(id)?;
        self.sync();
        Ok(removed)
    }

    pub(crate) fn add_feedback(&self, feedback: FeedbackData) -> Result<Feedback> {
        feedback.validate().into_result()?;
        let feedback = self.store.feedback().append(feedback)?;
        self.sync();
        Ok(feedback)
    }

    pub(crate) fn mark_notification_read(&self, id: RecordId) -> Result<Notification> {
        let notification = self.store.notifications().update(id, |n| n.read = true)?;
        self.sync();
        Ok(notification)
    }

    fn reload_all(&self) {
        for key in [
            keys::PREFERENCES,
            keys::CURRENT_USER,
            keys::SLOTS,
            keys::BOOKINGS,
            keys::WAITLIST,
            keys::FEEDBACK,
            keys::PAYMENTS,
            keys::NOTIFICATIONS,
        ] {
            self.reload(key);
        }
        self.recompute_stats();
    }

    /// Refresh the field backed by `key`. Keys the view doesn't mirror are ignored.
    fn reload(&self, key: &str) {
        let store = &self.store;
        match key {
            keys::PREFERENCES => {
                let dark_mode = store.preferences().get().unwrap_or_default().dark_mode;
                self.view.write().dark_mode = dark_mode;
            }
            keys::CURRENT_USER => {
                let principal = store.current_user().get();
                self.view.write().principal = principal;
            }
            keys::SLOTS => {
                let slots = store.slots().list();
                self.view.write().slots = slots;
            }
            keys::BOOKINGS => {
                let bookings = store.bookings().list();
                self.view.write().bookings = bookings;
            }
            keys::WAITLIST => {
                let waitlist = store.waitlist().list();
                self.view.write().waitlist = waitlist;
            }
            keys::FEEDBACK => {
                let feedback = store.feedback().list();
                self.view.write().feedback = feedback;
            }
            keys::PAYMENTS => {
                let payments = store.payments().list();
                self.view.write().payments = payments;
            }
            keys::NOTIFICATIONS => {
                let notifications = store.notifications().list();
                self.view.write().notifications = notifications;
            }
            _ => {}
        }
    }

    /// Recompute statistics against the current time.
    pub fn refresh_stats(&self) {
        self.recompute_stats();
    }

    fn recompute_stats(&self) {
        let principals = self.store.users().list();
        let now = self.store.clock().local_now(self.offset);
        let mut view = self.view.write();
        view.stats = stats::recompute(&view.bookings, &principals, &view.slots, now);
    }
}

impl Drop for SharedState {
    fn drop(&mut self) {
        let id = self.feed.get_mut().id;
        self.store.unsubscribe(id);
    }
}
