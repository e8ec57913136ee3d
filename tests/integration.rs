//! Integration tests for the therapy center.

use ayursutra::{
    BookingRequest, ClinicConfig, ClinicError, CredentialCost, FixedDecision, LogNotifier, ManualClock, PaymentMethod,
    PaymentStatus, RecordStore, Registration, Role, StatusFilter, TherapyCenter, TherapyTypeData,
};
use chrono::{Duration, TimeZone, Utc};
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

// 2026-05-10 03:30 UTC is 09:00 at the clinic.
fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 10, 3, 30, 0).unwrap(),
    ))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn open(dir: &TempDir, clock: Arc<ManualClock>, approve: bool) -> TherapyCenter {
    init_tracing();
    let config = test_config(dir);
    let store = Arc::new(RecordStore::open_or_create(&config, clock).unwrap());
    TherapyCenter::assemble(config, store, Arc::new(LogNotifier), Arc::new(FixedDecision(approve))).unwrap()
}

// --- Scenarios ---

#[test]
fn test_signup_then_login() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);

    let registration = Registration::new("A", "a@gmail.com", "secret").with_role(Role::Patient);
    let signed_up = center.signup(registration).unwrap();

    let logged_in = center.login("a@gmail.com", "secret", Role::Patient).unwrap();
    assert_eq!(logged_in.user_id(), signed_up.user_id());

    let wrong_role = center.login("a@gmail.com", "secret", Role::Admin);
    assert!(matches!(wrong_role, Err(ClinicError::InvalidCredentials)));
    let wrong_password = center.login("a@gmail.com", "Secret", Role::Patient);
    assert!(matches!(wrong_password, Err(ClinicError::InvalidCredentials)));
}

#[test]
fn test_booking_with_yesterday_rejected() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    let err = center
        .book(&ctx, BookingRequest::free_text("vamana").at("2026-05-09", "10:00"))
        .unwrap_err();
    assert!(err.validation().unwrap().contains("date"));
    assert!(center.ledger().list_for(&ctx).is_empty());
}

#[test]
fn test_delete_then_list() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    let booking = center
        .book(&ctx, BookingRequest::free_text("nasya").at("2026-05-11", "10:00"))
        .unwrap();
    assert!(center.ledger().delete(&ctx, booking.id).unwrap());
    assert!(center.ledger().list_for(&ctx).iter().all(|b| b.id != booking.id));
    assert!(!center.ledger().delete(&ctx, booking.id).unwrap());
}

#[test]
fn test_payment_failure_path() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), false);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();
    let booking = center
        .book(&ctx, BookingRequest::free_text("basti").at("2026-05-11", "10:00"))
        .unwrap();

    let result = center.pay(&ctx, booking.id, PaymentMethod::Card);
    assert!(matches!(result, Err(ClinicError::PaymentFailed { .. })));

    let stored = center.ledger().get(&ctx, booking.id).unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert!(center.store().payments().is_empty());
    assert!(center.notifications(&ctx).is_empty());
}

// --- Realistic Workflow Tests ---

#[test]
fn test_session_survives_restart_until_expiry() {
    let dir = TempDir::new().unwrap();
    let clock = clock();

    let user_id = {
        let center = open(&dir, clock.clone(), true);
        center
            .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
            .unwrap()
            .user_id()
    };

    // Lock released on drop; reopen.
    {
        let center = open(&dir, clock.clone(), true);
        let restored = center.restore_session().unwrap().unwrap();
        assert_eq!(restored.user_id(), user_id);
        assert_eq!(center.state().principal().unwrap().id, user_id);
    }

    clock.advance(Duration::hours(168));
    let center = open(&dir, clock, true);
    assert!(center.restore_session().unwrap().is_none());
    assert!(center.state().principal().is_none());
    assert!(center.store().current_session().get().is_none());
}

#[test]
fn test_catalog_booking_pay_and_report() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    let admin = center
        .signup(Registration::new("Admin", "admin@gmail.com", "secret").with_role(Role::Admin))
        .unwrap();
    let patient = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    let therapy = center.catalog().therapy_type_by_key("basti").unwrap();
    let site = center.catalog().clinics()[0].clone();
    let booking = center
        .book(
            &patient,
            BookingRequest::catalog(therapy.id, site.id)
                .at("2026-05-12", "11:00")
                .with_notes("Lower back stiffness for weeks"),
        )
        .unwrap();
    assert_eq!(booking.duration_minutes, 120);

    let receipt = center
        .pay(&patient, booking.id, PaymentMethod::Upi)
        .unwrap()
        .receipt()
        .unwrap();
    assert_eq!(receipt.record.amount, 3540);
    assert_eq!(receipt.record.booking_id, booking.id);

    let stats = center.admin_stats(&admin).unwrap();
    assert_eq!(stats.total_bookings, 1);
    assert_eq!(stats.total_patients, 1);
    assert_eq!(stats.total_revenue, 3540);
    let basti = stats.distribution.iter().find(|d| d.key == "basti").unwrap();
    assert_eq!(basti.count, 1);

    let hits = center.ledger().view(&admin, "BACK", StatusFilter::Upcoming);
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_data_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let clock = clock();

    let booking_id = {
        let center = open(&dir, clock.clone(), true);
        let ctx = center
            .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
            .unwrap();
        center.state().set_dark_mode(true).unwrap();
        center
            .book(&ctx, BookingRequest::free_text("vamana").at("2026-05-11", "10:00"))
            .unwrap()
            .id
    };

    let center = open(&dir, clock, true);
    let ctx = center.login("ASHA@gmail.com", "secret", Role::Patient).unwrap();
    assert_eq!(center.ledger().list_for(&ctx)[0].id, booking_id);
    assert!(center.state().dark_mode());
    // Seeding is skipped when the catalog already exists.
    assert_eq!(center.catalog().therapy_types().len(), 5);
}

#[test]
fn test_second_open_is_locked() {
    let dir = TempDir::new().unwrap();
    let _first = open(&dir, clock(), true);

    let config = test_config(&dir);
    let second = RecordStore::open_or_create(&config, clock());
    assert!(matches!(second, Err(ClinicError::Locked)));
}

#[test]
fn test_duplicate_email_ignores_case() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    let again = center.signup(Registration::new("Asha Two", "Asha@Gmail.com", "secret2"));
    assert!(matches!(again, Err(ClinicError::DuplicateEmail)));
    assert_eq!(center.store().users().len(), 1);
}

// --- Regressions ---

#[test]
fn test_cleared_booking_ids_are_not_reused() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();

    let paid = center
        .book(&ctx, BookingRequest::free_text("vamana").at("2026-05-11", "10:00"))
        .unwrap();
    center.pay(&ctx, paid.id, PaymentMethod::Card).unwrap();
    let stale = center
        .book(&ctx, BookingRequest::free_text("nasya").at("2026-05-11", "12:00"))
        .unwrap();
    let ticket = center.begin_payment(&ctx, stale.id, PaymentMethod::Upi).unwrap();

    center.store().clear_all().unwrap();
    let fresh = center
        .book(&ctx, BookingRequest::free_text("basti").at("2026-05-12", "10:00"))
        .unwrap();
    assert!(fresh.id > stale.id);

    // A ticket started before the clear cannot land on the new booking.
    assert!(matches!(center.settle(ticket), Err(ClinicError::NotFound { .. })));
    let payments = center.store().payments().list();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].booking_id, paid.id);
    assert_ne!(payments[0].booking_id, fresh.id);
    assert_eq!(center.state().bookings()[0].payment_status, PaymentStatus::Pending);
}

#[test]
fn test_racing_tickets_charge_once() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    let ctx = center
        .signup(Registration::new("Asha", "asha@gmail.com", "secret"))
        .unwrap();
    let booking = center
        .book(&ctx, BookingRequest::free_text("virechana").at("2026-05-11", "10:00"))
        .unwrap();

    let first = center.begin_payment(&ctx, booking.id, PaymentMethod::Card).unwrap();
    let second = center.begin_payment(&ctx, booking.id, PaymentMethod::Upi).unwrap();
    center.settle(first).unwrap();
    assert!(center.settle(second).is_err());

    assert_eq!(center.store().payments().len(), 1);
    let stored = center.store().bookings().get(booking.id).unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Confirmed);
    assert_eq!(stored.amount, Some(center.store().payments().list()[0].amount));
}

#[test]
fn test_oversized_price_is_refused_without_panic() {
    let dir = TempDir::new().unwrap();
    let center = open(&dir, clock(), true);
    let admin = center
        .signup(Registration::new("Admin", "admin@gmail.com", "secret").with_role(Role::Admin))
        .unwrap();

    let oversized = center.catalog().add_therapy_type(
        &admin,
        TherapyTypeData {
            key: "gold".into(),
            name: "Gold leaf".into(),
            description: String::new(),
            base_price: u64::MAX / 10,
            duration_minutes: 60,
            pre_instructions: String::new(),
            post_instructions: String::new(),
        },
    );
    let errors = oversized.unwrap_err();
    assert!(errors.validation().unwrap().contains("base_price"));
    assert!(center.payments().prices().quote_base(u64::MAX / 10).is_err());
}
