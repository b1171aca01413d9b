//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Error bodies are JSON: `{"success": false, "error": "..."}`, with a
//! `fields` object added for validation failures.

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartServiceError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::GatewayError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication or password reset failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartServiceError),

    /// Checkout or payment reconciliation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Session store read or write failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<BTreeMap<&'static str, &'a str>>,
}

const INTERNAL: &str = "Internal server error";

impl AppError {
    /// Status code and client-safe message.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(_) | Self::Session(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
            }
            Self::Auth(err) => auth_status(err),
            Self::Cart(err) => match err {
                CartServiceError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                CartServiceError::OutOfStock(_) => (StatusCode::CONFLICT, err.to_string()),
                CartServiceError::Store(_) | CartServiceError::Repository(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
                }
            },
            Self::Checkout(err) => checkout_status(err),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        }
    }
}

fn auth_status(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials".into()),
        AuthError::UserNotFound => (StatusCode::BAD_REQUEST, "Email not registered".into()),
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            "An account with this email already exists".into(),
        ),
        AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".into()),
        AuthError::InvalidCode => (StatusCode::BAD_REQUEST, "Invalid OTP".into()),
        AuthError::CodeExpired => (StatusCode::BAD_REQUEST, "OTP expired".into()),
        AuthError::InvalidToken => (StatusCode::BAD_REQUEST, "Invalid token".into()),
        AuthError::Mail(_) | AuthError::Repository(_) | AuthError::PasswordHash => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.into())
        }
    }
}

fn checkout_status(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart | CheckoutError::SessionExpired => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CheckoutError::ProductNotFound(_) | CheckoutError::AddressNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::Gateway(gateway) => match gateway {
            GatewayError::InvalidSignature => (
                StatusCode::BAD_REQUEST,
                "Payment verification failed".into(),
            ),
            GatewayError::Timeout => (
                StatusCode::BAD_REQUEST,
                "The payment service did not respond, please try again".into(),
            ),
            GatewayError::InvalidAmount(_) => {
                (StatusCode::BAD_REQUEST, "This order cannot be paid online".into())
            }
            GatewayError::Http(_) | GatewayError::Api { .. } => {
                (StatusCode::BAD_GATEWAY, "Payment service error".into())
            }
        },
        CheckoutError::Transition(_) => (
            StatusCode::CONFLICT,
            "Checkout is not in a state that allows this".into(),
        ),
        CheckoutError::Store(_) | CheckoutError::Repository(_) | CheckoutError::Money(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.into())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let fields = match &self {
            Self::Checkout(CheckoutError::Validation(errors)) => Some(
                errors
                    .fields()
                    .filter_map(|f| errors.get(f).map(|m| (f, m)))
                    .collect(),
            ),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            error: &message,
            fields,
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    use kec_core::{AddressId, ContactForm, ProductId};

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            status(AppError::NotFound("order 9".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(CartServiceError::OutOfStock(ProductId::new(1)).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(CheckoutError::AddressNotFound(AddressId::new(3)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(CheckoutError::SessionExpired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(CheckoutError::Gateway(GatewayError::Timeout).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthError::CodeExpired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthError::InvalidCredentials.into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_validation_lists_fields() {
        let errors = ContactForm::default().validate().unwrap_err();
        let response = AppError::from(CheckoutError::Validation(errors)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["fields"]["city"].is_string());
        assert!(body["fields"]["email"].is_string());
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption(
            "invalid email in database: select * from store.user".into(),
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Internal server error");
        assert!(body.get("fields").is_none());
    }

    #[tokio::test]
    async fn test_signature_failure_body() {
        let response =
            AppError::from(CheckoutError::Gateway(GatewayError::InvalidSignature)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Payment verification failed");
    }
}
