//! The record store tying storage, clock and change feed together.

use crate::clock::Clock;
use crate::config::ClinicConfig;
use crate::error::Result;
use crate::storage::{Collection, FileBackend, MemoryBackend, Singleton, StorageBackend};
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle, SubscriptionId, SubscriptionManager};
use crate::types::{
    BookingData, ClinicData, FeedbackData, NotificationData, PaymentRecordData, Principal,
    PractitionerData, PrincipalData, Session, SlotData, TherapyTypeData, WaitlistData,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Storage keys, one document each.
pub mod keys {
    pub const CURRENT_USER: &str = "ayursutra_user";
    pub const CURRENT_SESSION: &str = "ayursutra_session";
    pub const USERS: &str = "ayursutra_users";
    pub const BOOKINGS: &str = "ayursutra_therapies";
    pub const THERAPY_TYPES: &str = "ayursutra_therapy_types";
    pub const CLINICS: &str = "ayursutra_clinics";
    pub const PRACTITIONERS: &str = "ayursutra_doctors";
    pub const SLOTS: &str = "ayursutra_slots";
    pub const FEEDBACK: &str = "ayursutra_feedbacks";
    pub const PAYMENTS: &str = "ayursutra_payments";
    pub const WAITLIST: &str = "ayursutra_waitlist";
    pub const NOTIFICATIONS: &str = "ayursutra_notifications";
    pub const PREFERENCES: &str = "ayursutra-storage";
}

/// UI preferences persisted alongside the collections.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub dark_mode: bool,
}

/// The persistent record store.
///
/// Exclusively owns the persisted form of every collection. Provides:
/// - Typed collections with list/append/update/remove
/// - Singletons for the current principal, session and preferences
/// - A change feed for projections
pub struct RecordStore {
    pub(crate) backend: Box<dyn StorageBackend>,

    pub(crate) clock: Arc<dyn Clock>,

    pub(crate) events: SubscriptionManager,

    /// Serializes read-modify-write cycles on collection documents.
    pub(crate) write_lock: Mutex<()>,
}

impl RecordStore {
    /// Open (or create) the directory-backed store named by `config`.
    pub fn open_or_create(config: &ClinicConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let backend = FileBackend::open_or_create(&config.path, config.create_if_missing)?;
        Ok(Self::with_backend(Box::new(backend), clock))
    }

    /// A store that lives only as long as this value.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::with_backend(Box::new(MemoryBackend::new()), clock)
    }

    pub fn with_backend(backend: Box<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            events: SubscriptionManager::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // --- Collections ---

    pub fn users(&self) -> Collection<'_, PrincipalData> {
        Collection::new(self, keys::USERS, "users")
    }

    pub fn bookings(&self) -> Collection<'_, BookingData> {
        Collection::new(self, keys::BOOKINGS, "bookings")
    }

    pub fn therapy_types(&self) -> Collection<'_, TherapyTypeData> {
        Collection::new(self, keys::THERAPY_TYPES, "therapy_types")
    }

    pub fn clinics(&self) -> Collection<'_, ClinicData> {
        Collection::new(self, keys::CLINICS, "clinics")
    }

    pub fn practitioners(&self) -> Collection<'_, PractitionerData> {
        Collection::new(self, keys::PRACTITIONERS, "practitioners")
    }

    pub fn slots(&self) -> Collection<'_, SlotData> {
        Collection::new(self, keys::SLOTS, "slots")
    }

    pub fn feedback(&self) -> Collection<'_, FeedbackData> {
        Collection::new(self, keys::FEEDBACK, "feedback")
    }

    pub fn payments(&self) -> Collection<'_, PaymentRecordData> {
        Collection::new(self, keys::PAYMENTS, "payments")
    }

    pub fn waitlist(&self) -> Collection<'_, WaitlistData> {
        Collection::new(self, keys::WAITLIST, "waitlist")
    }

    pub fn notifications(&self) -> Collection<'_, NotificationData> {
        Collection::new(self, keys::NOTIFICATIONS, "notifications")
    }

    // --- Singletons ---

    pub fn current_user(&self) -> Singleton<'_, Principal> {
        Singleton::new(self, keys::CURRENT_USER)
    }

    pub fn current_session(&self) -> Singleton<'_, Session> {
        Singleton::new(self, keys::CURRENT_SESSION)
    }

    pub fn preferences(&self) -> Singleton<'_, Preferences> {
        Singleton::new(self, keys::PREFERENCES)
    }

    // --- Change feed ---

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.events.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id)
    }

    /// Forget the signed-in principal, the session and all bookings.
    pub fn clear_all(&self) -> Result<()> {
        self.current_user().clear()?;
        self.current_session().clear()?;
        self.bookings().clear()?;
        tracing::info!("cleared session and booking data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ClinicConfig;
    use crate::error::ClinicError;
    use crate::types::{FeedbackData, RecordId};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        ))
    }

    fn feedback(rating: u8) -> FeedbackData {
        FeedbackData {
            patient_name: Some("Asha".into()),
            rating,
            comment: "Very restful session".into(),
        }
    }

    fn test_config(dir: &TempDir) -> ClinicConfig {
        ClinicConfig {
            path: dir.path().join("profile"),
            ..Default::default()
        }
    }

    #[test]
    fn test_list_never_written_is_empty() {
        let store = RecordStore::in_memory(clock());
        assert!(store.feedback().list().is_empty());
        assert!(store.feedback().list().is_empty());
        assert!(store.current_session().get().is_none());
    }

    #[test]
    fn test_append_assigns_id_and_timestamp() {
        let clock = clock();
        let store = RecordStore::in_memory(clock.clone());

        let first = store.feedback().append(feedback(5)).unwrap();
        let second = store.feedback().append(feedback(4)).unwrap();

        assert_eq!(first.id, RecordId(1));
        assert_eq!(second.id, RecordId(2));
        assert!(first.created_at <= clock.now());

        let listed = store.feedback().list();
        assert_eq!(listed, vec![first, second]);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let store = RecordStore::in_memory(clock());
        let first = store.feedback().append(feedback(5)).unwrap();
        assert!(store.feedback().remove(first.id).unwrap());

        let next = store.feedback().append(feedback(3)).unwrap();
        assert_eq!(next.id, RecordId(2));
    }

    #[test]
    fn test_update_and_remove_missing() {
        let store = RecordStore::in_memory(clock());

        let result = store.feedback().update(RecordId(9), |f| f.rating = 1);
        assert!(matches!(
            result,
            Err(ClinicError::NotFound { collection: "feedback", .. })
        ));
        assert!(!store.feedback().remove(RecordId(9)).unwrap());
    }

    #[test]
    fn test_update_merges_fields() {
        let store = RecordStore::in_memory(clock());
        let record = store.feedback().append(feedback(2)).unwrap();

        let updated = store.feedback().update(record.id, |f| f.rating = 4).unwrap();
        assert_eq!(updated.rating, 4);
        assert_eq!(updated.comment, record.comment);
        assert_eq!(updated.created_at, record.created_at);
        assert_eq!(store.feedback().get(record.id).unwrap().rating, 4);
    }

    #[test]
    fn test_malformed_document_reads_empty() {
        let store = RecordStore::in_memory(clock());
        store.backend.write(keys::FEEDBACK, "{not json").unwrap();
        store.backend.write(keys::CURRENT_SESSION, "42").unwrap();

        assert!(store.feedback().list().is_empty());
        assert!(store.current_session().get().is_none());

        // Writing over a corrupt document recovers it.
        store.feedback().append(feedback(5)).unwrap();
        assert_eq!(store.feedback().len(), 1);
    }

    #[test]
    fn test_replace_keeps_counter_ahead() {
        let store = RecordStore::in_memory(clock());
        let a = store.feedback().append(feedback(1)).unwrap();
        let mut b = a.clone();
        b.id = RecordId(10);

        store.feedback().replace(vec![b]).unwrap();
        let next = store.feedback().append(feedback(2)).unwrap();
        assert_eq!(next.id, RecordId(11));
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();

        let id = {
            let store = RecordStore::open_or_create(&test_config(&dir), clock()).unwrap();
            store.preferences().set(&Preferences { dark_mode: true }).unwrap();
            store.feedback().append(feedback(5)).unwrap().id
        };

        let store = RecordStore::open_or_create(&test_config(&dir), clock()).unwrap();
        assert_eq!(store.feedback().get(id).unwrap().rating, 5);
        assert!(store.preferences().get().unwrap().dark_mode);
    }

    #[test]
    fn test_mutations_are_broadcast() {
        let store = RecordStore::in_memory(clock());
        let handle = store.subscribe(SubscriptionConfig::default());

        let record = store.feedback().append(feedback(5)).unwrap();
        store.feedback().remove(record.id).unwrap();
        store.preferences().set(&Preferences::default()).unwrap();

        let (events, disconnected) = handle.drain();
        assert!(!disconnected);
        let seen: Vec<_> = events.iter().filter_map(|e| e.key()).collect();
        assert_eq!(seen, vec![keys::FEEDBACK, keys::FEEDBACK, keys::PREFERENCES]);
    }

    /// Serves nothing and refuses every read.
    struct UnreadableBackend;

    impl StorageBackend for UnreadableBackend {
        fn read(&self, _key: &str) -> Result<Option<String>> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "unreadable").into())
        }

        fn write(&self, _key: &str, _document: &str) -> Result<()> {
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_clear_keeps_id_counter() {
        let store = RecordStore::in_memory(clock());
        store.feedback().append(feedback(5)).unwrap();
        store.feedback().append(feedback(4)).unwrap();

        store.feedback().clear().unwrap();
        assert!(store.feedback().is_empty());

        let next = store.feedback().append(feedback(3)).unwrap();
        assert_eq!(next.id, RecordId(3));
    }

    #[test]
    fn test_malformed_document_keeps_readable_counter() {
        let store = RecordStore::in_memory(clock());
        store
            .backend
            .write(keys::FEEDBACK, "{\"next_id\": 7, \"records\": [{\"id\": 6,")
            .unwrap();

        assert!(store.feedback().is_empty());
        let next = store.feedback().append(feedback(5)).unwrap();
        assert_eq!(next.id, RecordId(7));
    }

    #[test]
    fn test_unreadable_storage_fails_writes_not_reads() {
        let store = RecordStore::with_backend(Box::new(UnreadableBackend), clock());

        assert!(store.feedback().list().is_empty());
        assert!(store.feedback().get(RecordId(1)).is_none());
        assert!(store.current_session().get().is_none());

        assert!(matches!(store.feedback().append(feedback(5)), Err(ClinicError::Io(_))));
        assert!(matches!(
            store.feedback().update(RecordId(1), |f| f.rating = 1),
            Err(ClinicError::Io(_))
        ));
        assert!(matches!(store.feedback().remove(RecordId(1)), Err(ClinicError::Io(_))));
        assert!(matches!(store.feedback().clear(), Err(ClinicError::Io(_))));
    }

    #[test]
    fn test_clear_all() {
        let store = RecordStore::in_memory(clock());
        store.feedback().append(feedback(5)).unwrap();
        store.clear_all().unwrap();

        assert!(store.current_user().get().is_none());
        assert!(store.bookings().is_empty());
        // Reference data survives.
        assert_eq!(store.feedback().len(), 1);
    }
}
