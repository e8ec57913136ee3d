//! Simulated payment processing.
//!
//! There is no gateway: once a fixed delay has passed a [`PaymentDecision`]
//! approves or declines the charge. Only an approved charge leaves a
//! payment record. Nothing here waits; callers poll a [`PaymentTicket`]
//! until it resolves.

use crate::auth::SessionContext;
use crate::catalog::KNOWN_THERAPIES;
use crate::clock::Clock;
use crate::error::{ClinicError, Result};
use crate::store::RecordStore;
use crate::types::{
    Booking, PaymentMethod, PaymentRecord, PaymentRecordData, PaymentRecordStatus, PaymentStatus, RecordId,
    Role,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Price charged for therapies missing from the table.
pub const FALLBACK_PRICE: u64 = 2000;

/// Base price, tax and total for one booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub base: u64,
    pub tax: u64,
    pub total: u64,
}

/// Base prices per therapy key plus a flat tax.
#[derive(Clone, Debug)]
pub struct PriceTable {
    prices: BTreeMap<String, u64>,
    tax_percent: u64,
}

impl PriceTable {
    /// The five known therapies at their standard prices.
    pub fn standard(tax_percent: u64) -> Self {
        Self {
            prices: KNOWN_THERAPIES
                .iter()
                .map(|t| (t.key.to_string(), t.base_price))
                .collect(),
            tax_percent,
        }
    }

    pub fn with_price(mut self, key: impl Into<String>, price: u64) -> Self {
        self.prices.insert(key.into(), price);
        self
    }

    pub fn base_price(&self, therapy_key: &str) -> u64 {
        self.prices.get(therapy_key).copied().unwrap_or(FALLBACK_PRICE)
    }

    /// Tax is rounded half up to a whole unit. Prices whose total does not
    /// fit in a `u64` are rejected.
    pub fn quote_base(&self, base: u64) -> Result<Quote> {
        let tax = base
            .checked_mul(self.tax_percent)
            .and_then(|t| t.checked_add(50))
            .map(|t| t / 100);
        let total = tax.and_then(|t| base.checked_add(t));
        match (tax, total) {
            (Some(tax), Some(total)) => Ok(Quote { base, tax, total }),
            _ => Err(ClinicError::invalid("amount", "Price is too large")),
        }
    }

    pub fn quote(&self, therapy_key: &str) -> Result<Quote> {
        self.quote_base(self.base_price(therapy_key))
    }

    /// Quote for a booking: the price copied at admission wins over the table.
    pub fn quote_booking(&self, booking: &Booking) -> Result<Quote> {
        self.quote_base(
            booking
                .base_price
                .unwrap_or_else(|| self.base_price(&booking.therapy_key)),
        )
    }
}

/// Decides whether a simulated charge goes through.
pub trait PaymentDecision: Send + Sync {
    fn approve(&self, booking: &Booking, quote: &Quote) -> bool;
}

/// Approves with a fixed probability.
#[derive(Clone, Copy, Debug)]
pub struct RandomDecision {
    success_rate: f64,
}

impl RandomDecision {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: if success_rate.is_nan() {
                0.0
            } else {
                success_rate.clamp(0.0, 1.0)
            },
        }
    }
}

impl PaymentDecision for RandomDecision {
    fn approve(&self, _booking: &Booking, _quote: &Quote) -> bool {
        rand::thread_rng().gen_bool(self.success_rate)
    }
}

/// Always approves, or always declines.
#[derive(Clone, Copy, Debug)]
pub struct FixedDecision(pub bool);

impl PaymentDecision for FixedDecision {
    fn approve(&self, _booking: &Booking, _quote: &Quote) -> bool {
        self.0
    }
}

/// Cancels an in-flight payment from anywhere.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A started payment. [`PaymentProcessor::poll`] applies its result once
/// `ready_at` has passed, unless it was cancelled first.
#[derive(Debug)]
pub struct PaymentTicket {
    pub booking_id: RecordId,
    pub quote: Quote,
    pub method: PaymentMethod,
    ready_at: DateTime<Utc>,
    cancel: CancelHandle,
}

impl PaymentTicket {
    pub fn ready_at(&self) -> DateTime<Utc> {
        self.ready_at
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// An approved payment.
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt {
    pub booking: Booking,
    pub record: PaymentRecord,
}

/// Outcome of polling a ticket that neither failed nor was cancelled.
#[derive(Debug)]
pub enum PaymentProgress {
    /// Still processing. Poll the ticket again later.
    Pending(PaymentTicket),
    Settled(Receipt),
}

impl PaymentProgress {
    pub fn is_pending(&self) -> bool {
        matches!(self, PaymentProgress::Pending(_))
    }

    pub fn receipt(self) -> Option<Receipt> {
        match self {
            PaymentProgress::Settled(receipt) => Some(receipt),
            PaymentProgress::Pending(_) => None,
        }
    }
}

pub struct PaymentProcessor {
    store: Arc<RecordStore>,
    prices: PriceTable,
    decision: Arc<dyn PaymentDecision>,
    delay: Duration,
}

impl PaymentProcessor {
    pub fn new(store: Arc<RecordStore>, prices: PriceTable, decision: Arc<dyn PaymentDecision>, delay: Duration) -> Self {
        Self {
            store,
            prices,
            decision,
            delay,
        }
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Start paying for an existing booking. Failed bookings may be retried;
    /// confirmed ones are rejected.
    pub fn begin(&self, ctx: &SessionContext, booking_id: RecordId, method: PaymentMethod) -> Result<PaymentTicket> {
        let now = self.store.clock().now();
        ctx.ensure_active(now)?;
        let booking = self.store.bookings().get(booking_id).ok_or(ClinicError::NotFound {
            collection: "bookings",
            id: booking_id,
        })?;
        if !ctx.is_admin() && booking.user_id != ctx.user_id() {
            return Err(ClinicError::Forbidden(Role::Admin));
        }
        if booking.payment_status == PaymentStatus::Confirmed {
            return Err(already_paid());
        }

        let quote = self.prices.quote_booking(&booking)?;
        let ready_at = chrono::Duration::from_std(self.delay)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        tracing::debug!(booking = %booking_id, total = quote.total, %ready_at, "payment started");
        Ok(PaymentTicket {
            booking_id,
            quote,
            method,
            ready_at,
            cancel: CancelHandle::default(),
        })
    }

    /// Resolve `ticket` if its processing delay has passed.
    ///
    /// A cancelled ticket changes nothing and yields `PaymentCancelled`. A
    /// declined charge marks the booking failed and yields `PaymentFailed`;
    /// the booking stays in place for a retry. A ticket for a booking that
    /// another ticket already paid yields a validation error.
    pub fn poll(&self, ticket: PaymentTicket) -> Result<PaymentProgress> {
        if ticket.is_cancelled() {
            tracing::info!(booking = %ticket.booking_id, "payment cancelled before completion");
            return Err(ClinicError::PaymentCancelled);
        }
        if self.store.clock().now() < ticket.ready_at {
            return Ok(PaymentProgress::Pending(ticket));
        }
        self.resolve(ticket).map(PaymentProgress::Settled)
    }

    fn resolve(&self, ticket: PaymentTicket) -> Result<Receipt> {
        let bookings = self.store.bookings();
        let booking = bookings.get(ticket.booking_id).ok_or(ClinicError::NotFound {
            collection: "bookings",
            id: ticket.booking_id,
        })?;
        if booking.payment_status == PaymentStatus::Confirmed {
            return Err(already_paid());
        }

        if !self.decision.approve(&booking, &ticket.quote) {
            bookings.try_update(ticket.booking_id, |b| {
                if b.payment_status == PaymentStatus::Confirmed {
                    return Err(already_paid());
                }
                b.payment_status = PaymentStatus::Failed;
                Ok(())
            })?;
            tracing::warn!(booking = %ticket.booking_id, "payment declined");
            return Err(ClinicError::PaymentFailed {
                booking_id: ticket.booking_id,
            });
        }

        let payment_id = format!("PAY_{:016X}", rand::random::<u64>());
        let booking = bookings.try_update(ticket.booking_id, |b| {
            if b.payment_status == PaymentStatus::Confirmed {
                return Err(already_paid());
            }
            b.payment_status = PaymentStatus::Confirmed;
            b.payment_id = Some(payment_id.clone());
            b.amount = Some(ticket.quote.total);
            Ok(())
        })?;
        let record = self.store.payments().append(PaymentRecordData {
            payment_id,
            booking_id: ticket.booking_id,
            amount: ticket.quote.total,
            status: PaymentRecordStatus::Completed,
            method: ticket.method,
        })?;

        tracing::info!(
            booking = %ticket.booking_id,
            payment = %record.payment_id,
            amount = record.amount,
            "payment confirmed"
        );
        Ok(Receipt { booking, record })
    }
}

fn already_paid() -> ClinicError {
    ClinicError::invalid("payment", "Booking is already paid")
}
