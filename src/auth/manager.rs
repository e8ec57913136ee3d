//! Registration, sign-in and session lifecycle.

use crate::clock::Clock;
use crate::error::{ClinicError, Result, ValidationErrors};
use crate::store::RecordStore;
use crate::types::{Credential, CredentialCost, Principal, PrincipalData, RecordId, Role, Session};
use crate::validation::{emails_match, validate_email, validate_name, validate_password, validate_phone};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

/// The signed-in principal and its session.
///
/// Passed explicitly to every operation that needs identity.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionContext {
    pub principal: Principal,
    pub session: Session,
}

impl SessionContext {
    pub fn user_id(&self) -> RecordId {
        self.principal.id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn is_admin(&self) -> bool {
        self.principal.role == Role::Admin
    }

    /// Fails with `NotAuthenticated` once the session has expired.
    pub fn ensure_active(&self, now: DateTime<Utc>) -> Result<()> {
        if self.session.is_valid_at(now) {
            Ok(())
        } else {
            Err(ClinicError::NotAuthenticated)
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ClinicError::Forbidden(Role::Admin))
        }
    }
}

/// Sign-up form.
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Defaults to [`Role::Patient`].
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
}

impl Registration {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "Name is required");
        }

        if self.email.trim().is_empty() {
            errors.add("email", "Email is required");
        } else if !validate_email(self.email.trim()) {
            errors.add("email", "Please enter a valid email");
        }

        if self.password.is_empty() {
            errors.add("password", "Password is required");
        } else if !validate_password(&self.password) {
            errors.add("password", "Password must be at least 6 characters");
        }

        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            if !validate_phone(phone) {
                errors.add("phone", "Please enter a valid phone number");
            }
        }

        errors
    }
}

/// Partial profile edit. `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
}

impl ProfileUpdate {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            if !validate_name(name) {
                errors.add("name", "Name must be at least 2 characters");
            }
        }
        if let Some(email) = &self.email {
            if !validate_email(email.trim()) {
                errors.add("email", "Please enter a valid email");
            }
        }
        if let Some(phone) = &self.phone {
            if !validate_phone(phone) {
                errors.add("phone", "Please enter a valid phone number");
            }
        }
        errors
    }

    fn apply(self, principal: &mut PrincipalData) {
        if let Some(name) = self.name {
            principal.name = name.trim().to_string();
        }
        if let Some(email) = self.email {
            principal.email = email.trim().to_string();
        }
        if let Some(phone) = self.phone {
            principal.phone = Some(phone);
        }
        if let Some(date_of_birth) = self.date_of_birth {
            principal.date_of_birth = Some(date_of_birth);
        }
        if let Some(address) = self.address {
            principal.address = Some(address);
        }
        if let Some(medical_history) = self.medical_history {
            principal.medical_history = Some(medical_history);
        }
    }
}

/// Registers and authenticates principals and tracks the single current
/// session of this profile.
pub struct AuthManager {
    store: Arc<RecordStore>,
    clock: Arc<dyn Clock>,
    session_ttl: chrono::Duration,
    credential_cost: CredentialCost,
}

impl AuthManager {
    pub fn new(store: Arc<RecordStore>, clock: Arc<dyn Clock>, session_ttl: chrono::Duration) -> Self {
        Self {
            store,
            clock,
            session_ttl,
            credential_cost: CredentialCost::default(),
        }
    }

    /// Argon2id work factors for newly hashed passwords.
    pub fn with_credential_cost(mut self, cost: CredentialCost) -> Self {
        self.credential_cost = cost;
        self
    }

    /// Create a principal and sign it in.
    pub fn signup(&self, registration: Registration) -> Result<SessionContext> {
        registration.validate().into_result()?;

        let users = self.store.users();
        if users
            .list()
            .iter()
            .any(|u| emails_match(&u.email, &registration.email))
        {
            tracing::info!("signup rejected: email already registered");
            return Err(ClinicError::DuplicateEmail);
        }

        let principal = users.append(PrincipalData {
            name: registration.name.trim().to_string(),
            email: registration.email.trim().to_string(),
            credential: Credential::derive(&registration.password, &self.credential_cost)?,
            role: registration.role.unwrap_or_default(),
            phone: registration.phone.filter(|p| !p.trim().is_empty()),
            date_of_birth: registration.date_of_birth,
            address: registration.address,
            medical_history: registration.medical_history,
        })?;

        tracing::info!(user = %principal.id, role = %principal.role, "registered principal");
        self.establish(principal)
    }

    /// Sign in with email, password and role. All three must match; a wrong
    /// role is reported exactly like a wrong password.
    pub fn login(&self, email: &str, password: &str, role: Role) -> Result<SessionContext> {
        let principal = self
            .store
            .users()
            .list()
            .into_iter()
            .find(|u| emails_match(&u.email, email) && u.role == role)
            .filter(|u| u.credential.verify(password))
            .ok_or_else(|| {
                tracing::info!(%role, "login rejected");
                ClinicError::InvalidCredentials
            })?;

        tracing::info!(user = %principal.id, %role, "signed in");
        self.establish(principal)
    }

    /// Restore the persisted session if it is still valid. An expired or
    /// incomplete session is cleared.
    pub fn restore_session(&self) -> Result<Option<SessionContext>> {
        let session = self.store.current_session().get();
        let principal = self.store.current_user().get();
        let now = self.clock.now();

        match (session, principal) {
            (Some(session), Some(principal))
                if session.is_valid_at(now) && session.user_id == principal.id =>
            {
                tracing::debug!(user = %principal.id, "restored session");
                Ok(Some(SessionContext { principal, session }))
            }
            (session, principal) => {
                if session.is_some() || principal.is_some() {
                    tracing::info!("discarding expired session");
                }
                self.clear_current()?;
                Ok(None)
            }
        }
    }

    pub fn logout(&self) -> Result<()> {
        self.clear_current()?;
        tracing::info!("signed out");
        Ok(())
    }

    /// Merge `update` into the signed-in principal, both in the principal
    /// collection and in the current-principal slot.
    pub fn update_profile(&self, ctx: &mut SessionContext, update: ProfileUpdate) -> Result<Principal> {
        ctx.ensure_active(self.clock.now())?;
        update.validate().into_result()?;

        let users = self.store.users();
        if let Some(email) = &update.email {
            if users
                .list()
                .iter()
                .any(|u| u.id != ctx.user_id() && emails_match(&u.email, email))
            {
                return Err(ClinicError::DuplicateEmail);
            }
        }

        let updated = users.update(ctx.user_id(), |p| update.apply(p))?;
        self.store.current_user().set(&updated)?;
        ctx.principal = updated.clone();

        tracing::info!(user = %updated.id, "updated profile");
        Ok(updated)
    }

    /// Every registered principal (admin only).
    pub fn all_principals(&self, ctx: &SessionContext) -> Result<Vec<Principal>> {
        ctx.ensure_active(self.clock.now())?;
        ctx.require_admin()?;
        Ok(self.store.users().list())
    }

    /// Patients whose name or email contains `term`, ignoring case (admin only).
    pub fn patients(&self, ctx: &SessionContext, term: &str) -> Result<Vec<Principal>> {
        ctx.ensure_active(self.clock.now())?;
        ctx.require_admin()?;
        let term = term.trim().to_lowercase();
        Ok(self
            .store
            .users()
            .list()
            .into_iter()
            .filter(|u| u.role == Role::Patient)
            .filter(|u| {
                term.is_empty()
                    || u.name.to_lowercase().contains(&term)
                    || u.email.to_lowercase().contains(&term)
            })
            .collect())
    }

    fn establish(&self, principal: Principal) -> Result<SessionContext> {
        let session = Session::issue(principal.id, self.clock.now(), self.session_ttl);
        self.store.current_session().set(&session)?;
        self.store.current_user().set(&principal)?;
        Ok(SessionContext { principal, session })
    }

    fn clear_current(&self) -> Result<()> {
        self.store.current_session().clear()?;
        self.store.current_user().clear()
    }
}
