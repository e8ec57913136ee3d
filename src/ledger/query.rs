//! Read-side views over bookings. All functions are pure.

use crate::types::Booking;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Which side of `now` a view shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Upcoming,
    Past,
}

/// Bookings split around a reference time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Partition {
    /// Strictly after `now`, ascending by date+time.
    pub upcoming: Vec<Booking>,
    /// At or before `now`, descending by date+time.
    pub past: Vec<Booking>,
}

pub fn is_upcoming(booking: &Booking, now: NaiveDateTime) -> bool {
    booking.scheduled_at() > now
}

pub fn partition(bookings: Vec<Booking>, now: NaiveDateTime) -> Partition {
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) =
        bookings.into_iter().partition(|b| is_upcoming(b, now));
    sort_ascending(&mut upcoming);
    sort_descending(&mut past);
    Partition { upcoming, past }
}

/// Case-insensitive substring match over therapy label, notes and
/// practitioner name. A blank term matches everything.
pub fn matches_term(booking: &Booking, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return true;
    }
    booking.therapy_label.to_lowercase().contains(&term)
        || booking.notes.to_lowercase().contains(&term)
        || booking
            .practitioner_name
            .as_deref()
            .is_some_and(|p| p.to_lowercase().contains(&term))
}

pub fn search(bookings: Vec<Booking>, term: &str) -> Vec<Booking> {
    bookings.into_iter().filter(|b| matches_term(b, term)).collect()
}

pub fn filter_by_status(bookings: Vec<Booking>, status: StatusFilter, now: NaiveDateTime) -> Vec<Booking> {
    match status {
        StatusFilter::All => bookings,
        StatusFilter::Upcoming => bookings.into_iter().filter(|b| is_upcoming(b, now)).collect(),
        StatusFilter::Past => bookings.into_iter().filter(|b| !is_upcoming(b, now)).collect(),
    }
}

/// Bookings starting within `window` after `now`, soonest first.
pub fn upcoming_within(bookings: &[Booking], now: NaiveDateTime, window: Duration) -> Vec<Booking> {
    let horizon = now + window;
    let mut due: Vec<Booking> = bookings
        .iter()
        .filter(|b| is_upcoming(b, now) && b.scheduled_at() <= horizon)
        .cloned()
        .collect();
    sort_ascending(&mut due);
    due
}

// Ties fall back to id so orderings are total.
pub fn sort_ascending(bookings: &mut [Booking]) {
    bookings.sort_by_key(|b| (b.scheduled_at(), b.id));
}

pub fn sort_descending(bookings: &mut [Booking]) {
    bookings.sort_by(|a, b| (b.scheduled_at(), b.id).cmp(&(a.scheduled_at(), a.id)));
}
