//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                   - Health check
//! GET  /health/ready             - Database readiness
//!
//! # Cart
//! GET  /cart                     - Materialized cart
//! POST /cart/add/{product_id}    - Add units (form `quantity`)
//! POST /cart/update/{product_id} - Set quantity (form `quantity`)
//! POST /cart/remove/{product_id} - Remove line
//! POST /cart/clear               - Empty cart
//!
//! # Checkout (requires auth)
//! POST /checkout                 - Place COD order or start online payment
//! POST /payments/verify          - Confirm gateway callback
//! GET  /orders/{id}              - Order confirmation (owner only)
//!
//! # Auth
//! POST /auth/login               - Login action
//! POST /auth/logout              - Logout action
//!
//! # Password reset
//! POST /password-reset/request   - Email a passcode
//! POST /password-reset/verify    - Passcode to token
//! POST /password-reset/confirm   - Token and new password
//!
//! # Recommendations
//! GET  /recommendations          - Rule-based pump suggestions
//! ```

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod recommendations;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add/{product_id}", post(cart::add))
        .route("/update/{product_id}", post(cart::update))
        .route("/remove/{product_id}", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
}

/// Create the password reset routes router.
pub fn password_reset_routes() -> Router<AppState> {
    Router::new()
        .route("/request", post(auth::request_reset))
        .route("/verify", post(auth::verify_reset))
        .route("/confirm", post(auth::confirm_reset))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::submit))
        .route("/payments/verify", post(checkout::verify_payment))
        .route("/orders/{id}", get(checkout::show_order))
        .nest("/auth", auth_routes())
        .nest("/password-reset", password_reset_routes())
        .route("/recommendations", get(recommendations::recommend))
}
