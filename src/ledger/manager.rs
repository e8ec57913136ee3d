//! Booking admission, edits and per-principal views.

use super::query::{self, Partition, StatusFilter};
use crate::auth::SessionContext;
use crate::catalog::{known_therapy, therapy_label};
use crate::clock::Clock;
use crate::error::{ClinicError, Result, ValidationErrors};
use crate::store::RecordStore;
use crate::types::{Booking, BookingData, PaymentStatus, RecordId, Role};
use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;

/// Minimum length of non-empty booking notes.
pub const MIN_NOTES_LEN: usize = 10;

/// Duration used by free-text bookings that don't name one.
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// How the therapy of a booking is chosen.
#[derive(Clone, Debug, PartialEq)]
pub enum TherapySelection {
    /// A catalog therapy type at a clinic, optionally with a practitioner.
    Catalog {
        therapy_type_id: RecordId,
        clinic_id: Option<RecordId>,
        practitioner_id: Option<RecordId>,
    },
    /// A therapy named by key, without catalog references.
    FreeText {
        therapy_key: String,
        duration_minutes: Option<u32>,
        practitioner: Option<String>,
    },
}

/// Booking form as submitted. Date and time are the raw form values
/// (`YYYY-MM-DD`, `HH:MM`).
#[derive(Clone, Debug, PartialEq)]
pub struct BookingRequest {
    pub therapy: TherapySelection,
    pub date: String,
    pub time: String,
    pub notes: String,
}

impl BookingRequest {
    pub fn catalog(therapy_type_id: RecordId, clinic_id: RecordId) -> Self {
        Self {
            therapy: TherapySelection::Catalog {
                therapy_type_id,
                clinic_id: Some(clinic_id),
                practitioner_id: None,
            },
            date: String::new(),
            time: String::new(),
            notes: String::new(),
        }
    }

    pub fn free_text(therapy_key: impl Into<String>) -> Self {
        Self {
            therapy: TherapySelection::FreeText {
                therapy_key: therapy_key.into(),
                duration_minutes: None,
                practitioner: None,
            },
            date: String::new(),
            time: String::new(),
            notes: String::new(),
        }
    }

    pub fn at(mut self, date: impl Into<String>, time: impl Into<String>) -> Self {
        self.date = date.into();
        self.time = time.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_practitioner(mut self, id: RecordId) -> Self {
        if let TherapySelection::Catalog { practitioner_id, .. } = &mut self.therapy {
            *practitioner_id = Some(id);
        }
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        if let TherapySelection::FreeText { duration_minutes, .. } = &mut self.therapy {
            *duration_minutes = Some(minutes);
        }
        self
    }
}

/// Editable booking fields. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BookingPatch {
    pub date: Option<String>,
    pub time: Option<String>,
    pub notes: Option<String>,
    pub duration_minutes: Option<u32>,
}

/// The booking collection, guarded by ownership and admission rules.
pub struct BookingLedger {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl BookingLedger {
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>, offset: FixedOffset) -> Self {
        Self { store, clock, offset }
    }

    /// Current wall-clock time at the clinic.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.local_now(self.offset)
    }

    /// Validate and admit a booking for the signed-in principal.
    ///
    /// Catalog names and prices are copied onto the record so later catalog
    /// edits leave it untouched.
    pub fn create(&self, ctx: &SessionContext, request: BookingRequest) -> Result<Booking> {
        ctx.ensure_active(self.clock.now())?;
        let mut errors = ValidationErrors::new();
        let schedule = self.check_schedule(&request.date, &request.time, &mut errors);
        check_notes(&request.notes, &mut errors);
        let therapy = self.resolve_therapy(&request.therapy, &mut errors);

        let (Some((date, time)), Some(therapy)) = (schedule, therapy) else {
            tracing::info!(user = %ctx.user_id(), fields = errors.len(), "booking rejected");
            return Err(ClinicError::Validation(errors));
        };
        if !errors.is_empty() {
            tracing::info!(user = %ctx.user_id(), fields = errors.len(), "booking rejected");
            return Err(ClinicError::Validation(errors));
        }

        let booking = self.store.bookings().append(BookingData {
            user_id: ctx.user_id(),
            therapy_type_id: therapy.therapy_type_id,
            therapy_key: therapy.key,
            therapy_label: therapy.label,
            base_price: therapy.base_price,
            duration_minutes: therapy.duration_minutes,
            clinic_id: therapy.clinic_id,
            clinic_name: therapy.clinic_name,
            practitioner_id: therapy.practitioner_id,
            practitioner_name: therapy.practitioner_name,
            date,
            time,
            notes: request.notes.trim().to_string(),
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            amount: None,
        })?;

        tracing::info!(
            booking = %booking.id,
            user = %ctx.user_id(),
            therapy = %booking.therapy_key,
            "booking admitted"
        );
        Ok(booking)
    }

    /// A booking visible to `ctx`.
    pub fn get(&self, ctx: &SessionContext, id: RecordId) -> Result<Booking> {
        let booking = self.store.bookings().get(id).ok_or(ClinicError::NotFound {
            collection: "bookings",
            id,
        })?;
        check_owner(ctx, &booking)?;
        Ok(booking)
    }

    /// Apply `patch`. A changed date or time must still lie in the future.
    pub fn update(&self, ctx: &SessionContext, id: RecordId, patch: BookingPatch) -> Result<Booking> {
        ctx.ensure_active(self.clock.now())?;
        let current = self.get(ctx, id)?;

        let mut errors = ValidationErrors::new();
        let rescheduled = if patch.date.is_some() || patch.time.is_some() {
            let date = patch
                .date
                .clone()
                .unwrap_or_else(|| current.date.format("%Y-%m-%d").to_string());
            let time = patch
                .time
                .clone()
                .unwrap_or_else(|| current.time.format("%H:%M").to_string());
            self.check_schedule(&date, &time, &mut errors)
        } else {
            None
        };
        if let Some(notes) = &patch.notes {
            check_notes(notes, &mut errors);
        }
        if patch.duration_minutes == Some(0) {
            errors.add("duration_minutes", "Duration must be greater than zero");
        }
        errors.into_result()?;

        let updated = self.store.bookings().update(id, |b| {
            if let Some((date, time)) = rescheduled {
                b.date = date;
                b.time = time;
            }
            if let Some(notes) = patch.notes {
                b.notes = notes.trim().to_string();
            }
            if let Some(minutes) = patch.duration_minutes {
                b.duration_minutes = minutes;
            }
        })?;

        tracing::info!(booking = %id, "booking updated");
        Ok(updated)
    }

    /// Delete a booking. Returns `false` when no such booking exists.
    pub fn delete(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        Ok(self.take(ctx, id)?.is_some())
    }

    /// Delete a booking, returning what was removed.
    pub fn take(&self, ctx: &SessionContext, id: RecordId) -> Result<Option<Booking>> {
        ctx.ensure_active(self.clock.now())?;
        let bookings = self.store.bookings();
        let Some(booking) = bookings.get(id) else {
            return Ok(None);
        };
        check_owner(ctx, &booking)?;

        if !bookings.remove(id)? {
            return Ok(None);
        }
        tracing::info!(booking = %id, user = %ctx.user_id(), "booking deleted");
        Ok(Some(booking))
    }

    /// Bookings owned by the signed-in principal, in store order.
    pub fn list_for(&self, ctx: &SessionContext) -> Vec<Booking> {
        let user = ctx.user_id();
        self.store
            .bookings()
            .list()
            .into_iter()
            .filter(|b| b.user_id == user)
            .collect()
    }

    /// Every booking (admin only).
    pub fn list_all(&self, ctx: &SessionContext) -> Result<Vec<Booking>> {
        ctx.ensure_active(self.clock.now())?;
        ctx.require_admin()?;
        Ok(self.store.bookings().list())
    }

    /// Bookings `ctx` may see: all of them for admins, own ones otherwise.
    pub fn visible(&self, ctx: &SessionContext) -> Vec<Booking> {
        if ctx.is_admin() {
            self.store.bookings().list()
        } else {
            self.list_for(ctx)
        }
    }

    pub fn partition(&self, ctx: &SessionContext) -> Partition {
        query::partition(self.visible(ctx), self.now())
    }

    /// Search and status filter combined, ascending by date+time.
    pub fn view(&self, ctx: &SessionContext, term: &str, status: StatusFilter) -> Vec<Booking> {
        let mut hits = query::filter_by_status(query::search(self.visible(ctx), term), status, self.now());
        query::sort_ascending(&mut hits);
        hits
    }

    /// The `limit` most recent bookings, descending by date+time.
    pub fn recent(&self, ctx: &SessionContext, limit: usize) -> Vec<Booking> {
        let mut all = self.visible(ctx);
        query::sort_descending(&mut all);
        all.truncate(limit);
        all
    }

    fn check_schedule(&self, date: &str, time: &str, errors: &mut ValidationErrors) -> Option<(NaiveDate, NaiveTime)> {
        let date = match date.trim() {
            "" => {
                errors.add("date", "Date is required");
                None
            }
            raw => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
                errors.add("date", "Invalid date");
                None
            }),
        };
        let time = match time.trim() {
            "" => {
                errors.add("time", "Time is required");
                None
            }
            raw => parse_time(raw).or_else(|| {
                errors.add("time", "Invalid time");
                None
            }),
        };

        let (date, time) = (date?, time?);
        let now = self.now();
        if date < now.date() {
            errors.add("date", "Date cannot be in the past");
            return None;
        }
        if date.and_time(time) <= now {
            errors.add("time", "Time must be in the future");
            return None;
        }
        Some((date, time))
    }

    fn resolve_therapy(&self, selection: &TherapySelection, errors: &mut ValidationErrors) -> Option<ResolvedTherapy> {
        match selection {
            TherapySelection::Catalog {
                therapy_type_id,
                clinic_id,
                practitioner_id,
            } => {
                let therapy = self.store.therapy_types().get(*therapy_type_id);
                if therapy.is_none() {
                    errors.add("therapy_type", "Please select a therapy type");
                }

                let clinic = match clinic_id {
                    None => {
                        errors.add("clinic", "Please select a clinic");
                        None
                    }
                    Some(id) => {
                        let clinic = self.store.clinics().get(*id);
                        if clinic.is_none() {
                            errors.add("clinic", "Unknown clinic");
                        }
                        clinic
                    }
                };

                let practitioner = match practitioner_id {
                    None => None,
                    Some(id) => {
                        let practitioner = self.store.practitioners().get(*id);
                        if practitioner.is_none() {
                            errors.add("practitioner", "Unknown practitioner");
                        }
                        practitioner
                    }
                };

                let (therapy, clinic) = (therapy?, clinic?);
                Some(ResolvedTherapy {
                    therapy_type_id: Some(therapy.id),
                    key: therapy.key.clone(),
                    label: therapy.name.clone(),
                    base_price: Some(therapy.base_price),
                    duration_minutes: therapy.duration_minutes,
                    clinic_id: Some(clinic.id),
                    clinic_name: Some(clinic.data.name),
                    practitioner_id: practitioner.as_ref().map(|p| p.id),
                    practitioner_name: practitioner.map(|p| p.data.name),
                })
            }
            TherapySelection::FreeText {
                therapy_key,
                duration_minutes,
                practitioner,
            } => {
                let key = therapy_key.trim();
                if key.is_empty() {
                    errors.add("therapy_type", "Please select a therapy type");
                }
                if *duration_minutes == Some(0) {
                    errors.add("duration_minutes", "Duration must be greater than zero");
                }
                if key.is_empty() {
                    return None;
                }
                Some(ResolvedTherapy {
                    therapy_type_id: None,
                    key: key.to_string(),
                    label: therapy_label(key),
                    base_price: known_therapy(key).map(|t| t.base_price),
                    duration_minutes: duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
                    clinic_id: None,
                    clinic_name: None,
                    practitioner_id: None,
                    practitioner_name: practitioner
                        .as_deref()
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string),
                })
            }
        }
    }
}

/// Therapy, clinic and practitioner fields copied onto a booking at admission.
struct ResolvedTherapy {
    therapy_type_id: Option<RecordId>,
    key: String,
    label: String,
    base_price: Option<u64>,
    duration_minutes: u32,
    clinic_id: Option<RecordId>,
    clinic_name: Option<String>,
    practitioner_id: Option<RecordId>,
    practitioner_name: Option<String>,
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

fn check_notes(notes: &str, errors: &mut ValidationErrors) {
    let notes = notes.trim();
    if !notes.is_empty() && notes.chars().count() < MIN_NOTES_LEN {
        errors.add(
            "notes",
            format!("Notes must be at least {} characters", MIN_NOTES_LEN),
        );
    }
}

fn check_owner(ctx: &SessionContext, booking: &Booking) -> Result<()> {
    if ctx.is_admin() || booking.user_id == ctx.user_id() {
        Ok(())
    } else {
        Err(ClinicError::Forbidden(Role::Admin))
    }
}
