//! Password-reset passcode storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use kec_core::{Email, PasswordResetId, UserId};

use super::{RepositoryError, UserRepository};
use crate::models::{PasswordResetOtp, User};
use crate::services::password_reset::PasswordResetStore;

const OTP_COLUMNS: &str = "id, user_id, code, token, created_at, is_verified";

#[derive(sqlx::FromRow)]
struct OtpRow {
    id: PasswordResetId,
    user_id: UserId,
    code: String,
    token: Uuid,
    created_at: DateTime<Utc>,
    is_verified: bool,
}

impl From<OtpRow> for PasswordResetOtp {
    fn from(row: OtpRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            // CHAR(6) pads; codes are always six digits but trim anyway.
            code: row.code.trim_end().to_owned(),
            token: row.token,
            created_at: row.created_at,
            is_verified: row.is_verified,
        }
    }
}

/// Repository for password-reset passcodes.
pub struct PasswordResetRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PasswordResetRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PasswordResetStore for PasswordResetRepository<'_> {
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(self.pool).get_by_email(email).await
    }

    async fn create_code(
        &self,
        user_id: UserId,
        code: &str,
        token: Uuid,
        now: DateTime<Utc>,
    ) -> Result<PasswordResetOtp, RepositoryError> {
        let sql = format!(
            "INSERT INTO store.password_reset_otp (user_id, code, token, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING {OTP_COLUMNS}"
        );
        let row: OtpRow = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(code)
            .bind(token)
            .bind(now)
            .fetch_one(self.pool)
            .await?;

        Ok(row.into())
    }

    async fn latest_unverified(
        &self,
        user_id: UserId,
        code: &str,
    ) -> Result<Option<PasswordResetOtp>, RepositoryError> {
        let sql = format!(
            "SELECT {OTP_COLUMNS} FROM store.password_reset_otp \
             WHERE user_id = $1 AND code = $2 AND NOT is_verified \
             ORDER BY id DESC LIMIT 1"
        );
        let row: Option<OtpRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(code)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_verified(&self, id: PasswordResetId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE store.password_reset_otp SET is_verified = TRUE WHERE id = $1")
                .bind(id)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn verified_by_token(
        &self,
        token: Uuid,
    ) -> Result<Option<PasswordResetOtp>, RepositoryError> {
        let sql = format!(
            "SELECT {OTP_COLUMNS} FROM store.password_reset_otp WHERE token = $1 AND is_verified"
        );
        let row: Option<OtpRow> = sqlx::query_as(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn replace_password(
        &self,
        reset: &PasswordResetOtp,
        password_hash: &str,
    ) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Deleting first means a concurrent second use finds nothing to delete.
        let deleted = sqlx::query(
            "DELETE FROM store.password_reset_otp WHERE id = $1 AND user_id = $2 AND is_verified",
        )
        .bind(reset.id)
        .bind(reset.user_id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            return Ok(false);
        }

        let updated = sqlx::query(
            "UPDATE store.user SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(reset.user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(true)
    }
}
