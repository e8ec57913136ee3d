//! Error types for the booking core.

use crate::types::{RecordId, Role};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Field-level validation failures.
///
/// Every rule is checked and all failures are reported together so the
/// presentation layer can render them inline next to each field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for `field`. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Message recorded for a field, if any.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when nothing failed, otherwise [`ClinicError::Validation`].
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClinicError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field, message)?;
            first = false;
        }
        Ok(())
    }
}

/// Main error type for clinic operations.
#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage is locked by another process")]
    Locked,

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Invalid storage format: {0}")]
    InvalidFormat(String),

    #[error("User already exists with this email")]
    DuplicateEmail,

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Operation requires the {0} role")]
    Forbidden(Role),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{collection} record not found: {id}")]
    NotFound {
        collection: &'static str,
        id: RecordId,
    },

    #[error("Payment failed for booking {booking_id}")]
    PaymentFailed { booking_id: RecordId },

    #[error("Payment was cancelled before it resolved")]
    PaymentCancelled,
}

impl ClinicError {
    /// Validation failure for a single field.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        ClinicError::Validation(errors)
    }

    /// Field errors, when this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationErrors> {
        match self {
            ClinicError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClinicError {
    fn from(e: serde_json::Error) -> Self {
        ClinicError::Serialization(e.to_string())
    }
}

/// Result type for clinic operations.
pub type Result<T> = std::result::Result<T, ClinicError>;
