//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::email::EmailError;

/// Errors from login and password reset.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] kec_core::EmailError),

    /// Invalid credentials (wrong password or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No account for this email.
    #[error("email not registered")]
    UserNotFound,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// No unverified passcode matches.
    #[error("invalid code")]
    InvalidCode,

    /// The passcode matched but its validity window has passed.
    #[error("code expired")]
    CodeExpired,

    /// No verified passcode carries this token, or it was already used.
    #[error("invalid token")]
    InvalidToken,

    /// The passcode email could not be sent.
    #[error("email delivery failed: {0}")]
    Mail(#[from] EmailError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
