//! One-time passcode password reset.
//!
//! Three steps, each with its own credential:
//!
//! 1. `request_reset(email)` issues a 6-digit code by email
//! 2. `verify(email, code)` trades the newest matching unverified code for a
//!    token, as long as the code is at most 10 minutes old
//! 3. `consume(token, password)` sets the password and deletes the row, so a
//!    token works exactly once
//!
//! Expiry is enforced in step 2 only. A verified token is not re-checked
//! against the clock when it is consumed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::instrument;
use uuid::Uuid;

use kec_core::{Email, PasswordResetId, UserId, otp};

use crate::db::RepositoryError;
use crate::models::{PasswordResetOtp, User};
use crate::services::auth::{AuthError, hash_password, validate_password};
use crate::services::email::{Mailer, generate_verification_code};

/// Storage for passcodes and the password change they authorize.
#[async_trait]
pub trait PasswordResetStore: Send + Sync {
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    async fn create_code(
        &self,
        user_id: UserId,
        code: &str,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetOtp, RepositoryError>;

    /// Most recent unverified passcode for `user_id` with this code.
    async fn latest_unverified(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Option<PasswordResetOtp>, RepositoryError>;

    async fn mark_verified(&self, id: PasswordResetId) -> Result<(), RepositoryError>;

    async fn verified_by_token(&self, token: Uuid)
    -> Result<Option<PasswordResetOtp>, RepositoryError>;

    /// Delete the verified passcode and store the new hash as one unit.
    ///
    /// Returns `false` if the passcode was already gone.
    async fn replace_password(
        &self,
        reset: &PasswordResetOtp,
        password_hash: &str,
    ) -> Result<bool, RepositoryError>;
}

/// Password reset operations.
pub struct PasswordResetService<'a> {
    store: &'a dyn PasswordResetStore,
    mailer: &'a dyn Mailer,
}

impl<'a> PasswordResetService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn PasswordResetStore, mailer: &'a dyn Mailer) -> Self {
        Self { store, mailer }
    }

    /// Issue and email a new passcode.
    ///
    /// # Errors
    ///
    /// `InvalidEmail` for malformed input, `UserNotFound` when no account
    /// uses the address, `Mail` if delivery fails.
    #[instrument(skip(self))]
    pub async fn request_reset(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        let user = self
            .store
            .user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let code = generate_verification_code();
        let reset = self
            .store
            .create_code(user.id, &code, Uuid::new_v4(), now)
            .await?;

        self.mailer
            .send_password_reset_code(&user.email, &reset.code)
            .await?;

        tracing::info!(user_id = %user.id, "Password reset code issued");
        Ok(())
    }

    /// Check a passcode and return the token for [`Self::consume`].
    ///
    /// # Errors
    ///
    /// `InvalidCode` if the account or code is unknown, `CodeExpired` if the
    /// newest matching code is older than ten minutes.
    #[instrument(skip(self, code))]
    pub async fn verify(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Uuid, AuthError> {
        let code = code.trim();
        if !otp::is_well_formed(code) {
            return Err(AuthError::InvalidCode);
        }
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCode)?;
        let user = self
            .store
            .user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        let reset = self
            .store
            .latest_unverified(user.id, code)
            .await?
            .ok_or(AuthError::InvalidCode)?;

        if reset.is_expired(now) {
            tracing::debug!(user_id = %user.id, created_at = %reset.created_at, "Reset code expired");
            return Err(AuthError::CodeExpired);
        }

        self.store.mark_verified(reset.id).await?;
        Ok(reset.token)
    }

    /// Set a new password with a verified token. The token is spent.
    ///
    /// # Errors
    ///
    /// `InvalidToken` if no verified passcode carries the token,
    /// `WeakPassword` if the password is too short.
    #[instrument(skip(self, new_password))]
    pub async fn consume(&self, token: Uuid, new_password: &str) -> Result<(), AuthError> {
        let reset = self
            .store
            .verified_by_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        validate_password(new_password)?;
        let password_hash = hash_password(new_password)?;

        if !self.store.replace_password(&reset, &password_hash).await? {
            return Err(AuthError::InvalidToken);
        }

        tracing::info!(user_id = %reset.user_id, "Password reset completed");
        Ok(())
    }
}
