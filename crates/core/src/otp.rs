//! One-time passcode rules for password reset.

use chrono::{DateTime, Duration, Utc};

/// How long a code stays valid after it is issued.
pub const OTP_VALIDITY_MINUTES: i64 = 10;

/// Number of digits in a code.
pub const OTP_LENGTH: usize = 6;

/// Instant after which a code issued at `created_at` is rejected.
#[must_use]
pub fn expires_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::minutes(OTP_VALIDITY_MINUTES)
}

/// A code is expired strictly after its validity window; the boundary
/// instant itself is still accepted.
#[must_use]
pub fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > expires_at(created_at)
}

/// Whether `code` has the shape of an issued code (six ASCII digits).
#[must_use]
pub fn is_well_formed(code: &str) -> bool {
    code.len() == OTP_LENGTH && code.bytes().all(|b| b.is_ascii_digit())
}
