//! The booking ledger.
//!
//! Admission checks run once, at creation: a booking must be scheduled
//! strictly after the clinic's current wall-clock time. Bookings that later
//! fall into the past stay valid history.

mod manager;
pub mod query;

pub use manager::{
    BookingLedger, BookingPatch, BookingRequest, TherapySelection, DEFAULT_DURATION_MINUTES,
    MIN_NOTES_LEN,
};
pub use query::{Partition, StatusFilter};
