//! Form field rules shared by registration and profile editing.

use regex::Regex;
use std::sync::OnceLock;

/// Mail providers accepted at registration.
pub const ALLOWED_EMAIL_DOMAINS: [&str; 8] = [
    "gmail.com",
    "yahoo.com",
    "outlook.com",
    "hotmail.com",
    "rediffmail.com",
    "protonmail.com",
    "icloud.com",
    "aol.com",
];

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

fn email_shape() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"))
}

/// Well-formed address at one of the allowed providers.
pub fn validate_email(email: &str) -> bool {
    if !email_shape().is_match(email) {
        return false;
    }
    email
        .rsplit_once('@')
        .map(|(_, domain)| {
            let domain = domain.to_ascii_lowercase();
            ALLOWED_EMAIL_DOMAINS.contains(&domain.as_str())
        })
        .unwrap_or(false)
}

pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

pub fn validate_name(name: &str) -> bool {
    name.trim().chars().count() >= MIN_NAME_LEN
}

/// Ten-digit Indian mobile number starting with 6-9, ignoring separators.
pub fn validate_phone(phone: &str) -> bool {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    digits.len() == 10 && matches!(digits.as_bytes()[0], b'6'..=b'9')
}

/// Case-insensitive email equality.
pub fn emails_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
