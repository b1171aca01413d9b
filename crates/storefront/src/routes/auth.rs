//! Authentication route handlers.
//!
//! Session login and logout with argon2-verified passwords, plus the
//! one-time-passcode password reset.

use axum::{Form, Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::db::PasswordResetRepository;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::services::password_reset::PasswordResetService;
use crate::state::AppState;

// =============================================================================
// Request and Response Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Password reset request body.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Passcode verification body.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub otp: String,
}

/// New password body.
///
/// The token stays text here so a malformed one is answered like an unknown
/// one.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
    pub password: String,
}

impl ConfirmRequest {
    fn token(&self) -> std::result::Result<Uuid, AuthError> {
        Uuid::parse_str(self.token.trim()).map_err(|_| AuthError::InvalidToken)
    }
}

/// Plain success response with an optional message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl MessageResponse {
    const fn ok(message: Option<&'static str>) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

/// Response to a verified passcode.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: Uuid,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Handle login form submission.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Json<MessageResponse>> {
    let user = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await?;

    let current = CurrentUser {
        id: user.id,
        email: user.email,
    };
    set_current_user(&session, &current).await?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    tracing::info!(user_id = %current.id, "User logged in");
    Ok(MessageResponse::ok(None))
}

/// Log out and forget the session user.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Json<MessageResponse>> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(MessageResponse::ok(None))
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Email a reset passcode.
#[instrument(skip(state, body))]
pub async fn request_reset(
    State(state): State<AppState>,
    Json(body): Json<ResetRequest>,
) -> Result<Json<MessageResponse>> {
    let store = PasswordResetRepository::new(state.pool());
    PasswordResetService::new(&store, state.mailer())
        .request_reset(&body.email, Utc::now())
        .await?;
    Ok(MessageResponse::ok(Some("OTP sent to your email")))
}

/// Trade a passcode for a reset token.
#[instrument(skip(state, body))]
pub async fn verify_reset(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<TokenResponse>> {
    let store = PasswordResetRepository::new(state.pool());
    let token = PasswordResetService::new(&store, state.mailer())
        .verify(&body.email, &body.otp, Utc::now())
        .await?;
    Ok(Json(TokenResponse {
        success: true,
        token,
    }))
}

/// Set the new password.
#[instrument(skip(state, body))]
pub async fn confirm_reset(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<MessageResponse>> {
    let token = body.token()?;
    let store = PasswordResetRepository::new(state.pool());
    PasswordResetService::new(&store, state.mailer())
        .consume(token, &body.password)
        .await?;
    Ok(MessageResponse::ok(Some("Password updated")))
}
