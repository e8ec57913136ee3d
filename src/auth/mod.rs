//! Identity and session management.

mod manager;

pub use manager::{AuthManager, ProfileUpdate, Registration, SessionContext};
