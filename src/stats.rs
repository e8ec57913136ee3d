//! Administrative statistics, derived from bookings, principals and slots.
//!
//! Never stored on its own: [`recompute`] is called whenever one of its
//! inputs changes.

use crate::catalog::KNOWN_THERAPIES;
use crate::types::{Booking, Principal, Role, Slot};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Bookings per known therapy, for chart rendering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TherapyCount {
    pub key: String,
    pub label: String,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_slots: usize,
    /// Bookings scheduled strictly after the computation time.
    pub occupied_slots: usize,
    /// `total_slots - occupied_slots`. Negative when bookings outnumber slots.
    pub free_slots: i64,
    pub total_bookings: usize,
    pub total_patients: usize,
    /// Sum of recorded amounts; bookings without one count as zero.
    pub total_revenue: u64,
    /// One entry per known therapy, in catalog order.
    pub distribution: Vec<TherapyCount>,
}

pub fn recompute(bookings: &[Booking], principals: &[Principal], slots: &[Slot], now: NaiveDateTime) -> AdminStats {
    let total_slots = slots.len();
    let occupied_slots = bookings.iter().filter(|b| b.scheduled_at() > now).count();

    let distribution = KNOWN_THERAPIES
        .iter()
        .map(|therapy| TherapyCount {
            key: therapy.key.to_string(),
            label: therapy.label.to_string(),
            count: bookings.iter().filter(|b| b.therapy_key == therapy.key).count(),
        })
        .collect();

    AdminStats {
        total_slots,
        occupied_slots,
        free_slots: total_slots as i64 - occupied_slots as i64,
        total_bookings: bookings.len(),
        total_patients: principals.iter().filter(|p| p.role == Role::Patient).count(),
        total_revenue: bookings.iter().map(|b| b.amount.unwrap_or(0)).sum(),
        distribution,
    }
}
