//! The therapy center facade: every component wired together over one store.

use crate::auth::{AuthManager, ProfileUpdate, Registration, SessionContext};
use crate::cache::SharedState;
use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::ClinicConfig;
use crate::error::{ClinicError, Result};
use crate::ledger::{query, BookingLedger, BookingRequest};
use crate::notify::{Dispatcher, LogNotifier, NotificationTemplate, Notifier};
use crate::payment::{PaymentDecision, PaymentProcessor, PaymentProgress, PaymentTicket, PriceTable, RandomDecision};
use crate::stats::AdminStats;
use crate::store::RecordStore;
use crate::types::{
    Booking, Feedback, FeedbackData, Notification, PaymentMethod, PaymentStatus, Principal, RecordId, Role,
    WaitlistData, WaitlistEntry,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// A running therapy center: store, identity, catalog, ledger, payments,
/// notifications and the presentation projection.
pub struct TherapyCenter {
    config: ClinicConfig,
    store: Arc<RecordStore>,
    auth: AuthManager,
    catalog: Catalog,
    ledger: BookingLedger,
    payments: PaymentProcessor,
    dispatcher: Dispatcher,
    state: SharedState,
}

impl TherapyCenter {
    /// Open the on-disk center at `config.path` with the system clock, log
    /// notifications and randomly decided payments.
    pub fn open(config: ClinicConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(RecordStore::open_or_create(&config, clock)?);
        let decision = Arc::new(RandomDecision::new(config.payment_success_rate));
        Self::assemble(config, store, Arc::new(LogNotifier), decision)
    }

    /// Wire a center over an existing store. The store's clock is shared by
    /// every component.
    pub fn assemble(
        config: ClinicConfig,
        store: Arc<RecordStore>,
        notifier: Arc<dyn Notifier>,
        decision: Arc<dyn PaymentDecision>,
    ) -> Result<Self> {
        let clock = store.clock().clone();
        let offset = config.clinic_offset();

        let catalog = Catalog::new(store.clone());
        if config.seed_catalog {
            catalog.seed_defaults()?;
        }

        let center = Self {
            auth: AuthManager::new(store.clone(), clock.clone(), config.session_ttl)
                .with_credential_cost(config.credential_cost),
            catalog,
            ledger: BookingLedger::new(store.clone(), clock, offset),
            payments: PaymentProcessor::new(
                store.clone(),
                PriceTable::standard(config.tax_percent),
                decision,
                config.payment_delay,
            ),
            dispatcher: Dispatcher::new(store.clone(), notifier),
            state: SharedState::hydrate(store.clone(), offset),
            store,
            config,
        };
        tracing::info!(path = %center.config.path.display(), "therapy center ready");
        Ok(center)
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn ledger(&self) -> &BookingLedger {
        &self.ledger
    }

    pub fn payments(&self) -> &PaymentProcessor {
        &self.payments
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    // --- Identity ---

    /// Restore the persisted session. Must run before anything is authorized.
    pub fn restore_session(&self) -> Result<Option<SessionContext>> {
        let ctx = self.auth.restore_session()?;
        self.state.sync();
        Ok(ctx)
    }

    pub fn signup(&self, registration: Registration) -> Result<SessionContext> {
        let ctx = self.auth.signup(registration)?;
        self.state.sync();
        Ok(ctx)
    }

    pub fn login(&self, email: &str, password: &str, role: Role) -> Result<SessionContext> {
        let ctx = self.auth.login(email, password, role)?;
        self.state.sync();
        Ok(ctx)
    }

    pub fn logout(&self) -> Result<()> {
        self.auth.logout()?;
        self.state.sync();
        Ok(())
    }

    pub fn update_profile(&self, ctx: &mut SessionContext, update: ProfileUpdate) -> Result<Principal> {
        let principal = self.auth.update_profile(ctx, update)?;
        self.state.sync();
        Ok(principal)
    }

    // --- Bookings ---

    pub fn book(&self, ctx: &SessionContext, request: BookingRequest) -> Result<Booking> {
        let booking = self.ledger.create(ctx, request)?;
        self.state.sync();
        Ok(booking)
    }

    /// Start a payment that can be cancelled before [`TherapyCenter::settle`]
    /// resolves it.
    pub fn begin_payment(&self, ctx: &SessionContext, booking_id: RecordId, method: PaymentMethod) -> Result<PaymentTicket> {
        self.payments.begin(ctx, booking_id, method)
    }

    /// Poll a payment. Until the processing delay has passed the ticket
    /// comes back pending. An approved charge sends the confirmation and
    /// pre-therapy instructions to the booking's owner.
    pub fn settle(&self, ticket: PaymentTicket) -> Result<PaymentProgress> {
        let result = self.payments.poll(ticket);
        self.state.sync();

        let receipt = match result? {
            PaymentProgress::Settled(receipt) => receipt,
            pending => return Ok(pending),
        };
        if let Some(owner) = self.owner_of(&receipt.booking) {
            self.dispatcher
                .dispatch(NotificationTemplate::BookingConfirmation, &owner, &receipt.booking);
            self.dispatcher
                .dispatch(NotificationTemplate::PreTherapyInstructions, &owner, &receipt.booking);
            self.state.sync();
        }
        Ok(PaymentProgress::Settled(receipt))
    }

    /// Begin a payment and poll it once. With no processing delay this
    /// settles immediately.
    pub fn pay(&self, ctx: &SessionContext, booking_id: RecordId, method: PaymentMethod) -> Result<PaymentProgress> {
        let ticket = self.begin_payment(ctx, booking_id, method)?;
        self.settle(ticket)
    }

    /// Delete a booking and tell its owner. Returns `false` if it was
    /// already gone.
    pub fn cancel_booking(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        let Some(booking) = self.ledger.take(ctx, id)? else {
            return Ok(false);
        };
        if let Some(owner) = self.owner_of(&booking) {
            self.dispatcher
                .dispatch(NotificationTemplate::Cancellation, &owner, &booking);
        }
        self.state.sync();
        Ok(true)
    }

    /// Remind owners of confirmed bookings starting within `window`.
    /// Returns the number of reminders sent.
    pub fn send_reminders(&self, window: chrono::Duration) -> usize {
        let confirmed: Vec<Booking> = self
            .store
            .bookings()
            .list()
            .into_iter()
            .filter(|b| b.payment_status == PaymentStatus::Confirmed)
            .collect();

        let mut sent = 0;
        for booking in query::upcoming_within(&confirmed, self.ledger.now(), window) {
            if let Some(owner) = self.owner_of(&booking) {
                self.dispatcher
                    .dispatch(NotificationTemplate::TherapyReminder, &owner, &booking);
                sent += 1;
            }
        }
        if sent > 0 {
            tracing::info!(sent, "sent therapy reminders");
            self.state.sync();
        }
        sent
    }

    /// Send post-therapy care instructions for a booking (admin only).
    pub fn send_aftercare(&self, ctx: &SessionContext, booking_id: RecordId) -> Result<bool> {
        self.ensure_active(ctx)?;
        ctx.require_admin()?;
        let booking = self.ledger.get(ctx, booking_id)?;
        let Some(owner) = self.owner_of(&booking) else {
            return Ok(false);
        };
        let delivered = self
            .dispatcher
            .dispatch(NotificationTemplate::PostTherapyInstructions, &owner, &booking);
        self.state.sync();
        Ok(delivered)
    }

    // --- Statistics ---

    pub fn admin_stats(&self, ctx: &SessionContext) -> Result<AdminStats> {
        self.ensure_active(ctx)?;
        ctx.require_admin()?;
        self.state.sync();
        // Occupancy is relative to the current time.
        self.state.refresh_stats();
        Ok(self.state.stats())
    }

    // --- Notifications ---

    /// In-app notifications for the signed-in principal, newest first.
    pub fn notifications(&self, ctx: &SessionContext) -> Vec<Notification> {
        let mut mine: Vec<Notification> = self
            .store
            .notifications()
            .list()
            .into_iter()
            .filter(|n| n.user_id == Some(ctx.user_id()))
            .collect();
        mine.reverse();
        mine
    }

    pub fn mark_notification_read(&self, ctx: &SessionContext, id: RecordId) -> Result<Notification> {
        self.ensure_active(ctx)?;
        let notification = self.store.notifications().get(id).ok_or(ClinicError::NotFound {
            collection: "notifications",
            id,
        })?;
        if notification.user_id != Some(ctx.user_id()) && !ctx.is_admin() {
            return Err(ClinicError::Forbidden(Role::Admin));
        }
        self.state.mark_notification_read(id)
    }

    // --- Feedback ---

    /// Record feedback, attributed to the signed-in principal when there is one.
    pub fn submit_feedback(&self, ctx: Option<&SessionContext>, rating: u8, comment: &str) -> Result<Feedback> {
        if let Some(ctx) = ctx {
            self.ensure_active(ctx)?;
        }
        self.state.add_feedback(FeedbackData {
            patient_name: ctx.map(|c| c.principal.name.clone()),
            rating,
            comment: comment.trim().to_string(),
        })
    }

    /// The `limit` newest feedback entries.
    pub fn recent_feedback(&self, limit: usize) -> Vec<Feedback> {
        let mut all = self.store.feedback().list();
        all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        all.truncate(limit);
        all
    }

    // --- Waitlist ---

    pub fn join_waitlist(
        &self,
        ctx: &SessionContext,
        therapy_key: &str,
        preferred_date: Option<NaiveDate>,
        note: Option<String>,
    ) -> Result<WaitlistEntry> {
        self.ensure_active(ctx)?;
        let therapy_key = therapy_key.trim();
        if therapy_key.is_empty() {
            return Err(ClinicError::invalid("therapy_type", "Please select a therapy type"));
        }
        self.state.add_waitlist(WaitlistData {
            user_id: ctx.user_id(),
            therapy_key: therapy_key.to_string(),
            preferred_date,
            note: note.filter(|n| !n.trim().is_empty()),
        })
    }

    pub fn leave_waitlist(&self, ctx: &SessionContext, id: RecordId) -> Result<bool> {
        self.ensure_active(ctx)?;
        let Some(entry) = self.store.waitlist().get(id) else {
            return Ok(false);
        };
        if entry.user_id != ctx.user_id() && !ctx.is_admin() {
            return Err(ClinicError::Forbidden(Role::Admin));
        }
        self.state.remove_waitlist(id)
    }

    fn ensure_active(&self, ctx: &SessionContext) -> Result<()> {
        ctx.ensure_active(self.store.clock().now())
    }

    fn owner_of(&self, booking: &Booking) -> Option<Principal> {
        let owner = self.store.users().get(booking.user_id);
        if owner.is_none() {
            tracing::warn!(booking = %booking.id, user = %booking.user_id, "booking owner not found");
        }
        owner
    }
}
