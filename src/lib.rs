//! # AyurSutra
//!
//! Local-first booking core for a Panchakarma therapy center: principals
//! and sessions, a therapy catalog, the booking ledger, simulated payments,
//! notifications and administrative statistics over one persistent store.
//!
//! ## Core Concepts
//!
//! - **Record store**: Named JSON collections and singletons with
//!   store-assigned ids; unreadable documents read as empty
//! - **Sessions**: Absolute 7-day expiry, passed around as an explicit
//!   [`SessionContext`]
//! - **Ledger**: Bookings admitted only when scheduled in the future,
//!   partitioned into upcoming and past
//! - **Projection**: [`SharedState`] mirrors the store for rendering and
//!   recomputes [`AdminStats`] when its inputs change
//!
//! ## Example
//!
//! ```ignore
//! use ayursutra::{BookingRequest, ClinicConfig, PaymentMethod, Registration, TherapyCenter};
//!
//! let center = TherapyCenter::open(ClinicConfig {
//!     path: "./clinic-data".into(),
//!     ..Default::default()
//! })?;
//!
//! let ctx = center.signup(Registration::new("Asha", "asha@gmail.com", "secret"))?;
//! let booking = center.book(&ctx, BookingRequest::free_text("basti").at("2026-05-12", "10:00"))?;
//! let receipt = center.pay(&ctx, booking.id, PaymentMethod::Upi)?.receipt();
//! ```

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod center;
pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notify;
pub mod payment;
pub mod stats;
pub mod storage;
pub mod store;
pub mod subscriptions;
pub mod types;
pub mod validation;

// Re-exports
pub use auth::{AuthManager, ProfileUpdate, Registration, SessionContext};
pub use cache::{SharedState, StateView};
pub use catalog::{Catalog, KnownTherapy, KNOWN_THERAPIES};
pub use center::TherapyCenter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClinicConfig;
pub use error::{ClinicError, Result, ValidationErrors};
pub use ledger::{BookingLedger, BookingPatch, BookingRequest, Partition, StatusFilter, TherapySelection};
pub use notify::{Dispatcher, LogNotifier, NotificationRequest, NotificationTemplate, Notifier};
pub use payment::{
    CancelHandle, FixedDecision, PaymentDecision, PaymentProcessor, PaymentProgress, PaymentTicket, PriceTable, Quote,
    RandomDecision, Receipt,
};
pub use stats::{AdminStats, TherapyCount};
pub use storage::{FileBackend, MemoryBackend, StorageBackend};
pub use store::{Preferences, RecordStore};
pub use subscriptions::{
    DropReason, StoreEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle, SubscriptionId,
    SubscriptionManager,
};
pub use types::*;
