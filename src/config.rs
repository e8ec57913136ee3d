//! Clinic configuration.

use crate::types::CredentialCost;
use chrono::{FixedOffset, Offset, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Clinic configuration.
#[derive(Clone, Debug)]
pub struct ClinicConfig {
    /// Directory holding the persisted collections.
    pub path: PathBuf,

    /// Whether to create the storage directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Lifetime of a session, fixed at issuance.
    pub session_ttl: chrono::Duration,

    /// Offset of the clinic's wall clock from UTC, in minutes.
    pub utc_offset_minutes: i32,

    /// Tax added on top of the base therapy price, in percent.
    pub tax_percent: u64,

    /// Probability that a simulated payment succeeds.
    pub payment_success_rate: f64,

    /// Simulated payment processing delay.
    pub payment_delay: Duration,

    /// Insert default therapies, clinics and practitioners into empty collections.
    pub seed_catalog: bool,

    /// Argon2id work factors for password hashing.
    pub credential_cost: CredentialCost,
}

impl ClinicConfig {
    /// The clinic's wall-clock offset. Out-of-range values fall back to UTC.
    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./ayursutra"),
            create_if_missing: true,
            session_ttl: chrono::Duration::days(7),
            utc_offset_minutes: 5 * 60 + 30,
            tax_percent: 18,
            payment_success_rate: 0.8,
            payment_delay: Duration::from_secs(2),
            seed_catalog: true,
            credential_cost: CredentialCost::default(),
        }
    }
}
