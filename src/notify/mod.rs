//! Outbound patient notifications.
//!
//! Delivery is fire-and-forget: a failed send is logged and never fails the
//! booking or payment flow that triggered it. Every request is also kept as
//! an in-app notification.

mod instructions;

pub use instructions::{post_therapy, pre_therapy};

use crate::error::Result;
use crate::store::RecordStore;
use crate::types::{Booking, NotificationData, Principal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Named message template understood by the delivery service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    BookingConfirmation,
    TherapyReminder,
    PreTherapyInstructions,
    PostTherapyInstructions,
    #[serde(rename = "therapy_cancellation")]
    Cancellation,
}

impl NotificationTemplate {
    /// Template key as registered with the delivery service.
    pub fn key(self) -> &'static str {
        match self {
            NotificationTemplate::BookingConfirmation => "booking_confirmation",
            NotificationTemplate::TherapyReminder => "therapy_reminder",
            NotificationTemplate::PreTherapyInstructions => "pre_therapy_instructions",
            NotificationTemplate::PostTherapyInstructions => "post_therapy_instructions",
            NotificationTemplate::Cancellation => "therapy_cancellation",
        }
    }

    fn title(self) -> &'static str {
        match self {
            NotificationTemplate::BookingConfirmation => "Booking confirmed",
            NotificationTemplate::TherapyReminder => "Therapy reminder",
            NotificationTemplate::PreTherapyInstructions => "Pre-therapy instructions",
            NotificationTemplate::PostTherapyInstructions => "Post-therapy care",
            NotificationTemplate::Cancellation => "Booking cancelled",
        }
    }
}

impl fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Values interpolated into a template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateFields {
    pub therapy_type: String,
    pub date: String,
    pub time: String,
    pub duration_minutes: u32,
    pub practitioner: String,
    pub instructions: Vec<String>,
    pub message: String,
}

/// A fully-formed notification for the delivery service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub to_email: String,
    pub to_name: String,
    pub template: NotificationTemplate,
    pub fields: TemplateFields,
}

const DEFAULT_PRACTITIONER: &str = "Dr. Ayurveda Specialist";

impl NotificationRequest {
    /// Build the request for `template` about `booking`, addressed to `recipient`.
    pub fn for_booking(template: NotificationTemplate, recipient: &Principal, booking: &Booking) -> Self {
        let therapy = booking.therapy_label.clone();
        let date = booking.date.format("%Y-%m-%d").to_string();
        let time = booking.time.format("%H:%M").to_string();
        let name = recipient.name.clone();

        let (message, instructions) = match template {
            NotificationTemplate::BookingConfirmation => (
                format!(
                    "Dear {}, your {} therapy has been confirmed for {} at {}.",
                    name, therapy, date, time
                ),
                Vec::new(),
            ),
            NotificationTemplate::TherapyReminder => (
                format!(
                    "Reminder: Your {} therapy is scheduled for {} at {}. Please arrive 15 minutes early.",
                    therapy, date, time
                ),
                Vec::new(),
            ),
            NotificationTemplate::PreTherapyInstructions => (
                format!("Pre-therapy instructions for your {} session on {}.", therapy, date),
                pre_therapy(&booking.therapy_key).iter().map(|s| s.to_string()).collect(),
            ),
            NotificationTemplate::PostTherapyInstructions => (
                format!("Post-therapy care instructions for your {} session.", therapy),
                post_therapy(&booking.therapy_key).iter().map(|s| s.to_string()).collect(),
            ),
            NotificationTemplate::Cancellation => (
                format!(
                    "Your {} therapy scheduled for {} at {} has been cancelled.",
                    therapy, date, time
                ),
                Vec::new(),
            ),
        };

        Self {
            to_email: recipient.email.clone(),
            to_name: name,
            template,
            fields: TemplateFields {
                therapy_type: therapy,
                date,
                time,
                duration_minutes: booking.duration_minutes,
                practitioner: booking
                    .practitioner_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_PRACTITIONER.to_string()),
                instructions,
                message,
            },
        }
    }
}

/// Error reported by a delivery service.
#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// The external delivery service (email, SMS, ...).
pub trait Notifier: Send + Sync {
    fn send(&self, request: &NotificationRequest) -> std::result::Result<(), DeliveryError>;
}

/// Delivers by writing to the log. Used when no service is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, request: &NotificationRequest) -> std::result::Result<(), DeliveryError> {
        tracing::info!(
            template = %request.template,
            to = %request.to_email,
            "notification: {}",
            request.fields.message
        );
        Ok(())
    }
}

/// Sends notifications and records them in-app.
pub struct Dispatcher {
    store: Arc<RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(store: Arc<RecordStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Send `template` about `booking` to `recipient`. Returns whether the
    /// delivery service accepted it; failures are only logged.
    pub fn dispatch(&self, template: NotificationTemplate, recipient: &Principal, booking: &Booking) -> bool {
        let request = NotificationRequest::for_booking(template, recipient, booking);

        let delivered = match self.notifier.send(&request) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%template, booking = %booking.id, error = %e, "notification not delivered");
                false
            }
        };

        let in_app = NotificationData {
            user_id: Some(recipient.id),
            template,
            title: template.title().to_string(),
            message: request.fields.message,
            read: false,
        };
        if let Err(e) = self.store.notifications().append(in_app) {
            tracing::warn!(%template, error = %e, "could not record in-app notification");
        }

        delivered
    }

    /// Mark an in-app notification as read.
    pub fn mark_read(&self, id: crate::types::RecordId) -> Result<()> {
        self.store.notifications().update(id, |n| n.read = true)?;
        Ok(())
    }
}
