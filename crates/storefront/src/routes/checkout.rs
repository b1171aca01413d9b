//! Checkout and payment confirmation handlers.

use axum::{
    Form, Json,
    extract::{Path, State},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use kec_core::{AddressId, ContactForm, OrderId, PaymentMethod};

use crate::db::{AddressRepository, OrderRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::cart::SessionCartStore;
use crate::services::checkout::{CheckoutOutcome, CheckoutService};
use crate::services::orders::OrderLedger;
use crate::services::payments::{PaymentCallback, PaymentIntent};
use crate::state::AppState;

/// Checkout form data.
///
/// A non-empty `address_id` selects a saved address, which then overrides
/// the typed name, phone and address fields.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "pincode")]
    pub postal_code: Option<String>,
    pub notes: Option<String>,
    pub address_id: Option<String>,
    pub payment_method: PaymentMethod,
}

impl CheckoutForm {
    fn contact(&self) -> ContactForm {
        ContactForm {
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            postal_code: self.postal_code.clone(),
            notes: self.notes.clone(),
        }
    }

    fn address_id(&self) -> Result<Option<AddressId>> {
        match self.address_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| AppError::BadRequest("Invalid address".to_string())),
        }
    }
}

/// Checkout JSON response.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CheckoutResponse {
    /// The order was placed; the browser follows `redirect`.
    Placed {
        success: bool,
        order_id: OrderId,
        redirect: String,
    },
    /// The browser opens the payment widget with `payment`.
    AwaitingPayment {
        success: bool,
        payment: PaymentIntent,
        prefill_email: String,
    },
}

/// Payment confirmation JSON response.
#[derive(Debug, Serialize)]
pub struct PaymentVerifiedResponse {
    pub success: bool,
    pub redirect: String,
}

/// An order with its derived total.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub total: Decimal,
}

fn confirmation_path(id: OrderId) -> String {
    format!("/orders/{id}")
}

/// Submit the checkout.
#[instrument(skip(state, session, form), fields(user_id = %user.id))]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Form(form): Form<CheckoutForm>,
) -> Result<Json<CheckoutResponse>> {
    let address_id = form.address_id()?;
    let pool = state.pool();
    let (products, orders, addresses) = (
        ProductRepository::new(pool),
        OrderRepository::new(pool),
        AddressRepository::new(pool),
    );
    let carts = SessionCartStore::new(session);
    let service = CheckoutService::new(
        &products,
        &orders,
        &addresses,
        &carts,
        state.gateway(),
        state.receipts(),
        state.checkout_settings(),
    );

    let outcome = service
        .submit(&user, &form.contact(), address_id, form.payment_method, Utc::now())
        .await?;

    let response = match outcome {
        CheckoutOutcome::Placed(order) => CheckoutResponse::Placed {
            success: true,
            order_id: order.id,
            redirect: confirmation_path(order.id),
        },
        CheckoutOutcome::AwaitingPayment(intent) => CheckoutResponse::AwaitingPayment {
            success: true,
            payment: intent,
            prefill_email: user.email.to_string(),
        },
    };
    Ok(Json(response))
}

/// Verify a payment callback and place the order.
#[instrument(skip(state, session, callback), fields(user_id = %user.id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
    Json(callback): Json<PaymentCallback>,
) -> Result<Json<PaymentVerifiedResponse>> {
    let pool = state.pool();
    let (products, orders, addresses) = (
        ProductRepository::new(pool),
        OrderRepository::new(pool),
        AddressRepository::new(pool),
    );
    let carts = SessionCartStore::new(session);
    let service = CheckoutService::new(
        &products,
        &orders,
        &addresses,
        &carts,
        state.gateway(),
        state.receipts(),
        state.checkout_settings(),
    );

    let order = service
        .confirm_payment(&user, &callback, Utc::now())
        .await?;

    Ok(Json(PaymentVerifiedResponse {
        success: true,
        redirect: confirmation_path(order.id),
    }))
}

/// Show an order to its owner.
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn show_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderResponse>> {
    let order = OrderRepository::new(state.pool())
        .find_for_user(id, user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id}")))?;

    let total = order.total();
    Ok(Json(OrderResponse { order, total }))
}
