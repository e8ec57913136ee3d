//! Error handling tests.

use ayursutra::{
    BookingPatch, BookingRequest, ClinicConfig, ClinicError, CredentialCost, FixedDecision, LogNotifier, ManualClock,
    PaymentMethod, ProfileUpdate, RecordId, RecordStore, Registration, Role, TherapyCenter,
};
use chrono::{TimeZone, Utc};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> ClinicConfig {
    ClinicConfig {
        path: dir.path().join("clinic"),
        payment_delay: std::time::Duration::ZERO,
        credential_cost: CredentialCost::minimal(),
        ..Default::default()
    }
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 10, 3, 30, 0).unwrap(),
    ))
}

fn test_center(dir: &TempDir) -> TherapyCenter {
    let config = test_config(dir);
    let store = Arc::new(RecordStore::open_or_create(&config, clock()).unwrap());
    TherapyCenter::assemble(config, store, Arc::new(LogNotifier), Arc::new(FixedDecision(true))).unwrap()
}

#[test]
fn test_corrupt_documents_read_as_empty() {
    let dir = TempDir::new().unwrap();
    {
        let center = test_center(&dir);
        center
            .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
            .unwrap();
    }

    let root = dir.path().join("clinic");
    fs::write(root.join("ayursutra_users.json"), "{\"next_id\": 3, \"records\": [").unwrap();
    fs::write(root.join("ayursutra_session.json"), "not json").unwrap();

    let center = test_center(&dir);
    assert!(center.store().users().list().is_empty());
    assert!(center.restore_session().unwrap().is_none());

    // The profile keeps working after the bad documents are overwritten.
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();
    assert_eq!(center.store().users().len(), 1);
    assert_eq!(center.restore_session().unwrap().unwrap().user_id(), ctx.user_id());
}

#[test]
fn test_open_missing_without_create() {
    let dir = TempDir::new().unwrap();
    let config = ClinicConfig {
        create_if_missing: false,
        ..test_config(&dir)
    };
    assert!(matches!(
        RecordStore::open_or_create(&config, clock()),
        Err(ClinicError::NotInitialized)
    ));
}

#[test]
fn test_foreign_directory_rejected() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("clinic");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("MANIFEST"), b"NOPE\x01").unwrap();

    let result = RecordStore::open_or_create(&test_config(&dir), clock());
    assert!(matches!(result, Err(ClinicError::InvalidFormat(_))));
}

#[test]
fn test_signup_validation_collects_every_field() {
    let dir = TempDir::new().unwrap();
    let center = test_center(&dir);

    let mut registration = Registration::new("", "someone@example.org", "123");
    registration.phone = Some("12345".into());
    let err = center.signup(registration).unwrap_err();

    let errors = err.validation().unwrap();
    for field in ["name", "email", "password", "phone"] {
        assert!(errors.contains(field), "missing error for {}", field);
    }
    assert!(center.store().users().is_empty());
}

#[test]
fn test_update_missing_booking() {
    let dir = TempDir::new().unwrap();
    let center = test_center(&dir);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    let result = center.ledger().update(&ctx, RecordId(77), BookingPatch::default());
    assert!(matches!(
        result,
        Err(ClinicError::NotFound {
            collection: "bookings",
            id: RecordId(77)
        })
    ));
    assert!(!center.cancel_booking(&ctx, RecordId(77)).unwrap());
}

#[test]
fn test_patients_are_forbidden_admin_actions() {
    let dir = TempDir::new().unwrap();
    let center = test_center(&dir);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    assert!(matches!(center.admin_stats(&ctx), Err(ClinicError::Forbidden(Role::Admin))));
    assert!(matches!(
        center.auth().all_principals(&ctx),
        Err(ClinicError::Forbidden(_))
    ));
    let therapy = center.catalog().therapy_types()[0].id;
    assert!(matches!(
        center.catalog().remove_therapy_type(&ctx, therapy),
        Err(ClinicError::Forbidden(_))
    ));
}

#[test]
fn test_cannot_touch_other_patients_bookings() {
    let dir = TempDir::new().unwrap();
    let center = test_center(&dir);
    let asha = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();
    let ravi = center
        .signup(Registration::new("Ravi", "ravi@outlook.com", "secret"))
        .unwrap();
    let booking = center
        .book(&asha, BookingRequest::free_text("nasya").at("2026-05-11", "10:00"))
        .unwrap();

    assert!(matches!(
        center.pay(&ravi, booking.id, PaymentMethod::Card),
        Err(ClinicError::Forbidden(_))
    ));
    assert!(matches!(
        center.cancel_booking(&ravi, booking.id),
        Err(ClinicError::Forbidden(_))
    ));
    assert_eq!(center.ledger().list_for(&asha).len(), 1);
}

#[test]
fn test_profile_email_taken() {
    let dir = TempDir::new().unwrap();
    let center = test_center(&dir);
    center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();
    let mut ravi = center
        .signup(Registration::new("Ravi", "ravi@outlook.com", "secret"))
        .unwrap();

    let update = ProfileUpdate {
        email: Some("ASHA@gmail.com".into()),
        ..Default::default()
    };
    assert!(matches!(
        center.update_profile(&mut ravi, update),
        Err(ClinicError::DuplicateEmail)
    ));
    assert_eq!(ravi.principal.email, "ravi@outlook.com");
}

#[test]
fn test_double_payment_rejected() {
    let dir = TempDir::new().unwrap();
    let center = test_center(&dir);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();
    let booking = center
        .book(&ctx, BookingRequest::free_text("nasya").at("2026-05-11", "10:00"))
        .unwrap();

    center.pay(&ctx, booking.id, PaymentMethod::Card).unwrap();
    let again = center.pay(&ctx, booking.id, PaymentMethod::Card);
    assert!(matches!(again, Err(ClinicError::Validation(_))));
    assert_eq!(center.store().payments().len(), 1);
}
