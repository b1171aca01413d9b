//! Password-reset passcodes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kec_core::{PasswordResetId, UserId, otp};

/// A one-time passcode issued for a password reset.
///
/// `code` is what the customer types; `token` is handed back after the code
/// is verified and authorizes the final password change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetOtp {
    pub id: PasswordResetId,
    pub user_id: UserId,
    pub code: String,
    pub token: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
}

impl PasswordResetOtp {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        otp::is_expired(self.created_at, now)
    }
}
