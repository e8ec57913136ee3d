//! Core types for the booking core.

use crate::error::{ClinicError, Result, ValidationErrors};
use crate::notify::NotificationTemplate;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Unique identifier for a record within its collection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted record: store-assigned identity plus the application payload.
///
/// Derefs to the payload, so `booking.notes` reads through to the data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    /// Unique identifier (assigned by store).
    pub id: RecordId,

    /// When the record was appended (assigned by store).
    pub created_at: DateTime<Utc>,

    #[serde(flatten)]
    pub data: T,
}

impl<T> Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for Stored<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

// --- Principals ---

/// Access role of a principal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Patient,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Patient => f.write_str("patient"),
            Role::Admin => f.write_str("admin"),
        }
    }
}

/// Argon2id work factors for password hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CredentialCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl CredentialCost {
    /// The cheapest parameters Argon2 accepts. For tests and fixtures.
    pub fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for CredentialCost {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Argon2id hash of a password in PHC string form. The plain password is
/// never stored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub hash: String,
}

impl Credential {
    /// Hash `password` under a fresh random salt.
    pub fn derive(password: &str, cost: &CredentialCost) -> Result<Self> {
        let params = Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
            .map_err(|e| ClinicError::Credential(format!("invalid Argon2id parameters: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt_bytes: [u8; 16] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| ClinicError::Credential(e.to_string()))?;
        let hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ClinicError::Credential(format!("Argon2id hashing failed: {e}")))?;

        Ok(Self {
            hash: hash.to_string(),
        })
    }

    /// Check a candidate password. The work factors come from the stored hash.
    pub fn verify(&self, password: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable credential");
                false
            }
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(..)")
    }
}

/// Principal payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PrincipalData {
    pub name: String,
    pub email: String,
    pub credential: Credential,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

pub type Principal = Stored<PrincipalData>;

/// A time-bounded proof of sign-in. Expiry is absolute, fixed at issuance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: RecordId,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn issue(user_id: RecordId, now: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            user_id,
            expires_at: now + ttl,
        }
    }

    /// Valid iff expiry is strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// --- Bookings ---

/// Payment state of a booking.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Confirmed,
    Failed,
}

/// Booking payload.
///
/// Catalog-path bookings carry `therapy_type_id`/`clinic_id`; free-text
/// bookings carry only the therapy key. Names and prices are copied at
/// admission so later catalog edits leave history untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingData {
    pub user_id: RecordId,
    #[serde(default)]
    pub therapy_type_id: Option<RecordId>,
    pub therapy_key: String,
    pub therapy_label: String,
    #[serde(default)]
    pub base_price: Option<u64>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub clinic_id: Option<RecordId>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default)]
    pub practitioner_id: Option<RecordId>,
    #[serde(default)]
    pub practitioner_name: Option<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
}

impl BookingData {
    /// Combined scheduled date and time (clinic wall clock).
    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

pub type Booking = Stored<BookingData>;

// --- Catalog ---

/// Highest base price, in rupees, a catalog entry may carry.
pub const MAX_BASE_PRICE: u64 = 10_000_000;

/// Therapy catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TherapyTypeData {
    /// Short stable key, e.g. `vamana`.
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_price: u64,
    pub duration_minutes: u32,
    #[serde(default)]
    pub pre_instructions: String,
    #[serde(default)]
    pub post_instructions: String,
}

impl TherapyTypeData {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.key.trim().is_empty() {
            errors.add("key", "Key is required");
        }
        if self.name.trim().is_empty() {
            errors.add("name", "Name is required");
        }
        if self.base_price > MAX_BASE_PRICE {
            errors.add("base_price", "Price is too large");
        }
        if self.duration_minutes == 0 {
            errors.add("duration_minutes", "Duration must be greater than zero");
        }
        errors
    }
}

pub type TherapyType = Stored<TherapyTypeData>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClinicData {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub timings: Option<String>,
}

pub type Clinic = Stored<ClinicData>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PractitionerData {
    pub name: String,
    pub specialization: String,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub clinic_id: Option<RecordId>,
}

pub type Practitioner = Stored<PractitionerData>;

/// A bookable slot defined by an administrator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    #[serde(default)]
    pub clinic_id: Option<RecordId>,
    #[serde(default)]
    pub therapy_key: Option<String>,
}

pub type Slot = Stored<SlotData>;

// --- Payments, feedback, waitlist, notifications ---

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Completed,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecordData {
    pub payment_id: String,
    pub booking_id: RecordId,
    pub amount: u64,
    pub status: PaymentRecordStatus,
    pub method: PaymentMethod,
}

pub type PaymentRecord = Stored<PaymentRecordData>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackData {
    #[serde(default)]
    pub patient_name: Option<String>,
    pub rating: u8,
    pub comment: String,
}

impl FeedbackData {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if !(1..=5).contains(&self.rating) {
            errors.add("rating", "Rating must be between 1 and 5");
        }
        if self.comment.trim().is_empty() {
            errors.add("comment", "Comment is required");
        }
        errors
    }
}

pub type Feedback = Stored<FeedbackData>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitlistData {
    pub user_id: RecordId,
    pub therapy_key: String,
    #[serde(default)]
    pub preferred_date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
}

pub type WaitlistEntry = Stored<WaitlistData>;

/// In-app notification, mirrored from every dispatched request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(default)]
    pub user_id: Option<RecordId>,
    pub template: NotificationTemplate,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
}

pub type Notification = Stored<NotificationData>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_credential_verify() {
        let credential = Credential::derive("secret", &CredentialCost::minimal()).unwrap();
        assert!(credential.verify("secret"));
        assert!(!credential.verify("Secret"));
        assert!(!credential.verify(""));
        assert!(credential.hash.starts_with("$argon2id$"));
        assert!(!credential.hash.contains("secret"));
    }

    #[test]
    fn test_credential_salts_differ() {
        let a = Credential::derive("secret", &CredentialCost::minimal()).unwrap();
        let b = Credential::derive("secret", &CredentialCost::minimal()).unwrap();
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_credential_rejects_bad_cost_and_bad_hash() {
        let cost = CredentialCost {
            memory_kib: 1,
            ..CredentialCost::minimal()
        };
        assert!(matches!(Credential::derive("secret", &cost), Err(ClinicError::Credential(_))));

        let broken = Credential {
            hash: "not a phc string".into(),
        };
        assert!(!broken.verify("secret"));
    }

    #[test]
    fn test_therapy_price_cap() {
        let mut therapy = TherapyTypeData {
            key: "vamana".into(),
            name: "Vamana".into(),
            description: String::new(),
            base_price: MAX_BASE_PRICE,
            duration_minutes: 60,
            pre_instructions: String::new(),
            post_instructions: String::new(),
        };
        assert!(therapy.validate().is_empty());

        therapy.base_price = u64::MAX / 10;
        let errors = therapy.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors.get("base_price").is_some());
    }

    #[test]
    fn test_session_expiry_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let session = Session::issue(RecordId(1), now, chrono::Duration::days(7));

        assert!(session.is_valid_at(now));
        assert!(session.is_valid_at(session.expires_at - chrono::Duration::seconds(1)));
        assert!(!session.is_valid_at(session.expires_at));
        assert_eq!(session.expires_at - now, chrono::Duration::hours(168));
    }

    #[test]
    fn test_stored_flattens_payload() {
        let feedback = Stored {
            id: RecordId(3),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            data: FeedbackData {
                patient_name: None,
                rating: 5,
                comment: "Calming".into(),
            },
        };

        let value = serde_json::to_value(&feedback).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["rating"], 5);

        let parsed: Feedback = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, feedback);
        assert_eq!(parsed.comment, "Calming");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(Role::default(), Role::Patient);
    }
}
