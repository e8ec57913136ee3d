//! Administrator-managed reference data: therapy types, clinics,
//! practitioners and bookable slots.
//!
//! Everyone may read the catalog; only administrators may change it.

mod defaults;

pub use defaults::{known_therapy, therapy_label, KnownTherapy, KNOWN_THERAPIES};

use crate::auth::SessionContext;
use crate::clock::Clock;
use crate::error::{ClinicError, Result};
use crate::storage::Collection;
use crate::store::RecordStore;
use crate::types::{
    Clinic, ClinicData, Practitioner, PractitionerData, RecordId, Slot, SlotData, Stored,
    TherapyType, TherapyTypeData,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub struct Catalog {
    store: Arc<RecordStore>,
}

impl Catalog {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Fill empty reference collections with the built-in defaults.
    /// Returns the number of records inserted.
    pub fn seed_defaults(&self) -> Result<usize> {
        let mut inserted = 0;

        let therapy_types = self.store.therapy_types();
        if therapy_types.is_empty() {
            for therapy in defaults::default_therapy_types() {
                therapy_types.append(therapy)?;
                inserted += 1;
            }
        }

        let clinics = self.store.clinics();
        let practitioners = self.store.practitioners();
        if clinics.is_empty() {
            let mut clinic_ids = Vec::new();
            for clinic in defaults::default_clinics() {
                clinic_ids.push(clinics.append(clinic)?.id);
                inserted += 1;
            }
            if practitioners.is_empty() {
                for (mut practitioner, clinic_index) in defaults::default_practitioners() {
                    practitioner.clinic_id = clinic_ids.get(clinic_index).copied();
                    practitioners.append(practitioner)?;
                    inserted += 1;
                }
            }
        }

        if inserted > 0 {
            tracing::info!(inserted, "seeded catalog defaults");
        }
        Ok(inserted)
    }

    // --- Therapy types ---

    pub fn therapy_types(&self) -> Vec<TherapyType> {
        self.store.therapy_types().list()
    }

    pub fn therapy_type(&self, id: RecordId) -> Option<TherapyType> {
        self.store.therapy_types().get(id)
    }

    pub fn therapy_type_by_key(&self, key: &str) -> Option<TherapyType> {
        self.therapy_types().into_iter().find(|t| t.key == key)
    }

    pub fn add_therapy_type(&self, ctx: &SessionContext, therapy: TherapyTypeData) -> Result<TherapyType> {
        authorize(ctx, self.store.clock().now())?;
        therapy.validate().into_result()?;
        self.store.therapy_types().append(therapy)
    }

    /// Edit a therapy type. Existing bookings keep the name and price they
    /// were admitted with.
    pub fn update_therapy_type<F>(&self, ctx: &SessionContext, id: RecordId, change: F) -> Result<TherapyType>
    where
        F: FnOnce(&mut TherapyTypeData),
    {
        authorize(ctx, self.store.clock().now())?;
        let current = self
            .therapy_type(id)
            .ok_or(ClinicError::NotFound {
                collection: "therapy_types",
                id,
            })?;
        let mut candidate = current.data;
        change(&mut candidate);
        candidate.validate().into_result()?;
        self.store.therapy_types().update(id, |t| *t = candidate)
    }

    pub fn remove_therapy_type(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        admin_remove(ctx, self.store.clock().now(), self.store.therapy_types(), id)
    }

    // --- Clinics ---

    pub fn clinics(&self) -> Vec<Clinic> {
        self.store.clinics().list()
    }

    pub fn clinic(&self, id: RecordId) -> Option<Clinic> {
        self.store.clinics().get(id)
    }

    pub fn add_clinic(&self, ctx: &SessionContext, clinic: ClinicData) -> Result<Clinic> {
        authorize(ctx, self.store.clock().now())?;
        if clinic.name.trim().is_empty() {
            return Err(ClinicError::invalid("name", "Name is required"));
        }
        self.store.clinics().append(clinic)
    }

    pub fn update_clinic<F>(&self, ctx: &SessionContext, id: RecordId, change: F) -> Result<Clinic>
    where
        F: FnOnce(&mut ClinicData),
    {
        admin_update(ctx, self.store.clock().now(), self.store.clinics(), id, change)
    }

    pub fn remove_clinic(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        admin_remove(ctx, self.store.clock().now(), self.store.clinics(), id)
    }

    // --- Practitioners ---

    pub fn practitioners(&self) -> Vec<Practitioner> {
        self.store.practitioners().list()
    }

    pub fn practitioner(&self, id: RecordId) -> Option<Practitioner> {
        self.store.practitioners().get(id)
    }

    /// Practitioners attached to a clinic.
    pub fn practitioners_at(&self, clinic_id: RecordId) -> Vec<Practitioner> {
        self.practitioners()
            .into_iter()
            .filter(|p| p.clinic_id == Some(clinic_id))
            .collect()
    }

    pub fn add_practitioner(&self, ctx: &SessionContext, practitioner: PractitionerData) -> Result<Practitioner> {
        authorize(ctx, self.store.clock().now())?;
        if practitioner.name.trim().is_empty() {
            return Err(ClinicError::invalid("name", "Name is required"));
        }
        self.store.practitioners().append(practitioner)
    }

    pub fn update_practitioner<F>(&self, ctx: &SessionContext, id: RecordId, change: F) -> Result<Practitioner>
    where
        F: FnOnce(&mut PractitionerData),
    {
        admin_update(ctx, self.store.clock().now(), self.store.practitioners(), id, change)
    }

    pub fn remove_practitioner(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        admin_remove(ctx, self.store.clock().now(), self.store.practitioners(), id)
    }

    // --- Slots ---

    pub fn slots(&self) -> Vec<Slot> {
        self.store.slots().list()
    }

    pub fn add_slot(&self, ctx: &SessionContext, slot: SlotData) -> Result<Slot> {
        authorize(ctx, self.store.clock().now())?;
        if slot.duration_minutes == 0 {
            return Err(ClinicError::invalid(
                "duration_minutes",
                "Duration must be greater than zero",
            ));
        }
        self.store.slots().append(slot)
    }

    pub fn update_slot<F>(&self, ctx: &SessionContext, id: RecordId, change: F) -> Result<Slot>
    where
        F: FnOnce(&mut SlotData),
    {
        admin_update(ctx, self.store.clock().now(), self.store.slots(), id, change)
    }

    pub fn remove_slot(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        admin_remove(ctx, self.store.clock().now(), self.store.slots(), id)
    }
}

/// Requires an unexpired administrator session.
fn authorize(ctx: &SessionContext, now: DateTime<Utc>) -> Result<()> {
    ctx.ensure_active(now)?;
    ctx.require_admin()
}

fn admin_update<T, F>(
    ctx: &SessionContext,
    now: DateTime<Utc>,
    collection: Collection<'_, T>,
    id: RecordId,
    change: F,
) -> Result<Stored<T>>
where
    T: Serialize + DeserializeOwned + Clone,
    F: FnOnce(&mut T),
{
    authorize(ctx, now)?;
    collection.update(id, change)
}

fn admin_remove<T>(ctx: &SessionContext, now: DateTime<Utc>, collection: Collection<'_, T>, id: RecordId) -> Result<bool>
where
    T: Serialize + DeserializeOwned + Clone,
{
    authorize(ctx, now)?;
    let removed = collection.remove(id)?;
    if removed {
        tracing::info!(collection = collection.key(), %id, "removed catalog entry");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthManager, Registration};
    use crate::clock::ManualClock;
    use crate::types::{CredentialCost, Role};
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    fn setup() -> (Catalog, SessionContext, SessionContext) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        ));
        let store = Arc::new(RecordStore::in_memory(clock.clone()));
        let auth = AuthManager::new(store.clone(), clock, chrono::Duration::days(7))
            .with_credential_cost(CredentialCost::minimal());
        let admin = auth
            .signup(Registration::new("Admin", "admin@gmail.com", "secret").with_role(Role::Admin))
            .unwrap();
        let patient = auth
            .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
            .unwrap();
        (Catalog::new(store), admin, patient)
    }

    #[test]
    fn test_seed_defaults_once() {
        let (catalog, _, _) = setup();
        assert_eq!(catalog.seed_defaults().unwrap(), 9);
        assert_eq!(catalog.seed_defaults().unwrap(), 0);

        assert_eq!(catalog.therapy_types().len(), 5);
        let vamana = catalog.therapy_type_by_key("vamana").unwrap();
        assert_eq!(vamana.base_price, 2500);
        assert_eq!(vamana.duration_minutes, 90);

        let clinic = &catalog.clinics()[0];
        assert_eq!(catalog.practitioners_at(clinic.id).len(), 1);
    }

    #[test]
    fn test_patients_cannot_edit_catalog() {
        let (catalog, _, patient) = setup();
        catalog.seed_defaults().unwrap();
        let id = catalog.therapy_types()[0].id;

        assert!(matches!(
            catalog.remove_therapy_type(&patient, id),
            Err(ClinicError::Forbidden(Role::Admin))
        ));
        assert!(matches!(
            catalog.update_therapy_type(&patient, id, |t| t.base_price = 1),
            Err(ClinicError::Forbidden(_))
        ));
        assert_eq!(catalog.therapy_types().len(), 5);
    }

    #[test]
    fn test_admin_therapy_crud() {
        let (catalog, admin, _) = setup();

        let added = catalog
            .add_therapy_type(
                &admin,
                TherapyTypeData {
                    key: "shirodhara".into(),
                    name: "Shirodhara".into(),
                    description: "Warm oil poured over the forehead".into(),
                    base_price: 1800,
                    duration_minutes: 60,
                    pre_instructions: String::new(),
                    post_instructions: String::new(),
                },
            )
            .unwrap();

        let updated = catalog
            .update_therapy_type(&admin, added.id, |t| t.base_price = 2200)
            .unwrap();
        assert_eq!(updated.base_price, 2200);

        let invalid = catalog.update_therapy_type(&admin, added.id, |t| t.duration_minutes = 0);
        assert!(matches!(invalid, Err(ClinicError::Validation(_))));
        assert_eq!(catalog.therapy_type(added.id).unwrap().duration_minutes, 60);

        let oversized = catalog.update_therapy_type(&admin, added.id, |t| t.base_price = u64::MAX / 10);
        assert!(matches!(oversized, Err(ClinicError::Validation(_))));
        assert_eq!(catalog.therapy_type(added.id).unwrap().base_price, 2200);

        assert!(catalog.remove_therapy_type(&admin, added.id).unwrap());
        assert!(!catalog.remove_therapy_type(&admin, added.id).unwrap());
    }

    #[test]
    fn test_slots() {
        let (catalog, admin, _) = setup();
        let slot = catalog
            .add_slot(
                &admin,
                SlotData {
                    date: NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
                    time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                    duration_minutes: 60,
                    clinic_id: None,
                    therapy_key: Some("nasya".into()),
                },
            )
            .unwrap();

        let moved = catalog
            .update_slot(&admin, slot.id, |s| s.time = NaiveTime::from_hms_opt(10, 0, 0).unwrap())
            .unwrap();
        assert_eq!(moved.time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
        assert_eq!(catalog.slots().len(), 1);
    }

    #[test]
    fn test_labels() {
        assert_eq!(therapy_label("basti"), "Basti (Medicated Enema)");
        assert_eq!(therapy_label("custom"), "custom");
        assert_eq!(known_therapy("nasya").unwrap().base_price, 1500);
    }
}
